//! Concurrency stress tests for the registry and the hook lifecycle.
//!
//! These drive many threads through the same registry, manager, and table at
//! once and assert the invariants that must hold under any interleaving: no
//! lost or duplicated chain entries, one winner per contended transition, and
//! dispatch results that always belong to a handler the slot legitimately
//! held.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use rayon::prelude::*;

use veiltap::hooks::HookManager;
use veiltap::registry::HiddenRegistry;
use veiltap::resolver::OpenResolver;
use veiltap::sink::{LogSink, MemorySink};
use veiltap::table::{CallContext, DispatchTable, Operation};
use veiltap::{Error, Pid};

fn open_registry() -> Arc<HiddenRegistry> {
    Arc::new(
        HiddenRegistry::new(Arc::new(OpenResolver::new()), Arc::new(MemorySink::new())).unwrap(),
    )
}

fn recv_ctx() -> CallContext {
    CallContext::new(Operation::RecvMessage, Pid(7))
}

/// N parallel hides of distinct ids must all land, exactly once each.
#[test]
fn test_parallel_hides_all_land() {
    let registry = open_registry();

    (1u32..=256).into_par_iter().for_each(|id| {
        registry.hide(Pid(id)).unwrap();
    });

    assert_eq!(registry.len(), 256);
    let mut ids: Vec<u32> = registry.snapshot().iter().map(|pid| pid.value()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1u32..=256).collect::<Vec<_>>());
}

/// Contended hides of the same id: exactly one caller wins.
#[test]
fn test_contended_hide_single_winner() {
    let registry = open_registry();
    let winners = AtomicUsize::new(0);

    (0..64).into_par_iter().for_each(|_| match registry.hide(Pid(42)) {
        Ok(()) => {
            winners.fetch_add(1, Ordering::Relaxed);
        }
        Err(Error::AlreadyHidden(Pid(42))) => {}
        Err(e) => panic!("unexpected hide outcome: {e}"),
    });

    assert_eq!(winners.load(Ordering::Relaxed), 1);
    assert_eq!(registry.snapshot(), vec![Pid(42)]);
}

/// Parallel unhides of the same id: exactly one caller wins there too.
#[test]
fn test_contended_unhide_single_winner() {
    let registry = open_registry();
    registry.hide(Pid(9)).unwrap();
    let winners = AtomicUsize::new(0);

    (0..64).into_par_iter().for_each(|_| match registry.unhide(Pid(9)) {
        Ok(()) => {
            winners.fetch_add(1, Ordering::Relaxed);
        }
        Err(Error::NotHidden(Pid(9))) => {}
        Err(e) => panic!("unexpected unhide outcome: {e}"),
    });

    assert_eq!(winners.load(Ordering::Relaxed), 1);
    assert!(registry.is_empty());
}

/// Racing removal through the silent cleanup path: one caller drops the
/// entry and logs, every loser sees `false` and writes nothing.
#[test]
fn test_contended_try_unhide_single_logger() {
    let sink = Arc::new(MemorySink::new());
    let registry = Arc::new(
        HiddenRegistry::new(
            Arc::new(OpenResolver::new()),
            Arc::clone(&sink) as Arc<dyn LogSink>,
        )
        .unwrap(),
    );
    registry.hide(Pid(9)).unwrap();
    let winners = AtomicUsize::new(0);

    (0..64).into_par_iter().for_each(|_| {
        if registry.try_unhide(Pid(9)).unwrap() {
            winners.fetch_add(1, Ordering::Relaxed);
        }
    });

    assert_eq!(winners.load(Ordering::Relaxed), 1);
    assert!(registry.is_empty());

    // One hide confirmation, one unhide confirmation, zero refusals.
    assert_eq!(sink.messages(), vec!["PID 9 is hidden.", "PID 9 unhidden."]);
}

/// Threads hammering a small id space with mixed admin calls must leave the
/// chain structurally sound: consistent length, no duplicates, no sentinel.
#[test]
fn test_mixed_admin_hammering() {
    let registry = open_registry();
    let threads = 8;
    let rounds = 400u32;
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::new();
    for t in 0..threads {
        let registry = Arc::clone(&registry);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            start.wait();
            for round in 0..rounds {
                let id = Pid(1 + (t as u32 + round) % 16);
                match round % 4 {
                    0 => {
                        let _ = registry.hide(id);
                    }
                    1 => {
                        let _ = registry.is_hidden(id);
                    }
                    2 => {
                        let _ = registry.unhide(id);
                    }
                    _ => {
                        let _ = registry.snapshot();
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), registry.len());
    assert!(snapshot.iter().all(|pid| !pid.is_sentinel()));

    let mut unique = snapshot.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), snapshot.len());

    // Whatever survived drains exactly once per listed id.
    for pid in snapshot {
        registry.unhide(pid).unwrap();
    }
    assert!(registry.is_empty());
}

/// Contended install/restore cycles on one slot: transitions serialize, and
/// the slot ends up exactly where it started.
#[test]
fn test_install_restore_contention() {
    let table = DispatchTable::builder(1)
        .handler(0, "orig", |_| 10)
        .build()
        .unwrap();
    let manager = Arc::new(HookManager::new(Arc::new(table)));
    let threads = 8;
    let rounds = 100;
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::new();
    for _ in 0..threads {
        let manager = Arc::clone(&manager);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            start.wait();
            for _ in 0..rounds {
                let replacement = manager.table().register("contender", |_| -1);
                match manager.install(0, replacement) {
                    Ok(()) => manager.restore(0).unwrap(),
                    Err(Error::AlreadyInstalled(0)) => {}
                    Err(e) => panic!("unexpected install outcome: {e}"),
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(manager.installed_count(), 0);
    assert_eq!(manager.table().dispatch(0, &recv_ctx()).unwrap(), 10);
}

/// Dispatch never observes anything but a handler the slot legitimately
/// held, even while installs and restores churn underneath it.
#[test]
fn test_dispatch_during_transitions() {
    let table = Arc::new(
        DispatchTable::builder(1)
            .handler(0, "orig", |_| 10)
            .build()
            .unwrap(),
    );
    let manager = Arc::new(HookManager::new(Arc::clone(&table)));
    let finished = Arc::new(AtomicUsize::new(0));
    let dispatcher_count = 4;

    let mut dispatchers = Vec::new();
    for _ in 0..dispatcher_count {
        let table = Arc::clone(&table);
        let finished = Arc::clone(&finished);
        dispatchers.push(thread::spawn(move || {
            for _ in 0..2000 {
                let result = table.dispatch(0, &recv_ctx()).unwrap();
                assert!(result == 10 || result == -1, "foreign result {result}");
            }
            finished.fetch_add(1, Ordering::Release);
        }));
    }

    // Churn the slot for as long as any dispatcher is still running.
    while finished.load(Ordering::Acquire) < dispatcher_count {
        let replacement = manager.table().register("churn", |_| -1);
        manager.install(0, replacement).unwrap();
        manager.restore(0).unwrap();
    }

    for handle in dispatchers {
        handle.join().unwrap();
    }
    assert_eq!(table.dispatch(0, &recv_ctx()).unwrap(), 10);
}
