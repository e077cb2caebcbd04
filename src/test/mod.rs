use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::registry::HiddenRegistry;
use crate::resolver::FixedResolver;
use crate::sink::MemorySink;
use crate::table::{CallContext, DispatchTable, Operation};
use crate::{Interceptor, Pid};

// Helper function to create a table with one baseline handler per operation.
// Slot N returns 100 + N so tests can tell originals from replacements apart.
pub fn create_table() -> Arc<DispatchTable> {
    let mut builder = DispatchTable::builder(Operation::COUNT);
    for operation in Operation::iter() {
        let code = 100 + operation.index() as isize;
        builder = builder.handler(
            operation.index(),
            &format!("orig-{operation}"),
            move |_| code,
        );
    }
    Arc::new(builder.build().unwrap())
}

// Helper function to create a capturing sink
pub fn create_sink() -> Arc<MemorySink> {
    Arc::new(MemorySink::new())
}

// Helper function to create a registry resolving exactly the given raw ids
pub fn create_registry(live: &[u32]) -> (Arc<HiddenRegistry>, Arc<MemorySink>) {
    let sink = create_sink();
    let resolver = Arc::new(FixedResolver::with_ids(live.iter().copied().map(Pid)));
    let registry = HiddenRegistry::new(resolver, Arc::clone(&sink) as Arc<dyn crate::sink::LogSink>)
        .unwrap();
    (Arc::new(registry), sink)
}

// Helper function to create a wired interceptor over a capturing sink.
// Ids 1..1000 resolve; everything else is dead.
pub fn create_interceptor() -> (Interceptor, Arc<MemorySink>) {
    let sink = create_sink();
    let resolver = Arc::new(FixedResolver::with_ids((1..1000).map(Pid)));
    let interceptor = Interceptor::builder()
        .table(create_table())
        .resolver(resolver)
        .sink(Arc::clone(&sink) as Arc<dyn crate::sink::LogSink>)
        .build()
        .unwrap();
    (interceptor, sink)
}

// Helper function to create a call context from an operation and raw caller id
pub fn create_context(operation: Operation, caller: u32) -> CallContext {
    CallContext::new(operation, Pid(caller))
}
