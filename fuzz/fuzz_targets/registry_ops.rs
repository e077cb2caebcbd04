#![no_main]

use std::collections::HashSet;
use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use veiltap::registry::HiddenRegistry;
use veiltap::resolver::FixedResolver;
use veiltap::sink::{LogSink, Stream};
use veiltap::Pid;

struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _stream: Stream, _line: &str) {}
}

// Each byte pair is one operation: the opcode byte selects hide, unhide,
// or a query, the operand byte picks the pid. A HashSet mirrors what the
// chain must hold after every step, and the final snapshot has to agree
// with it.
fuzz_target!(|data: &[u8]| {
    let resolver = FixedResolver::with_ids((1..=255).map(Pid));
    let registry = HiddenRegistry::new(Arc::new(resolver), Arc::new(NullSink)).unwrap();
    let mut model: HashSet<u32> = HashSet::new();

    for chunk in data.chunks_exact(2) {
        let pid = Pid(u32::from(chunk[1]));
        match chunk[0] % 4 {
            0 => {
                let accepted = registry.hide(pid).is_ok();
                assert_eq!(accepted, pid.value() != 0 && model.insert(pid.value()));
            }
            1 => {
                let removed = registry.unhide(pid).is_ok();
                assert_eq!(removed, model.remove(&pid.value()));
            }
            2 => assert_eq!(registry.is_hidden(pid), model.contains(&pid.value())),
            _ => assert_eq!(registry.len(), model.len()),
        }
    }

    let mut chain: Vec<u32> = registry
        .snapshot()
        .into_iter()
        .map(|pid| pid.value())
        .collect();
    chain.sort_unstable();
    let mut expected: Vec<u32> = model.into_iter().collect();
    expected.sort_unstable();
    assert_eq!(chain, expected);
});
