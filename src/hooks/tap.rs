use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};
use crate::table::{CallContext, DispatchTable, HandlerRef};

/// Shared observer function type for taps.
///
/// Observers see the call context by reference and must not mutate it;
/// their side effects go to the registry, the sink, or state of their own.
pub type ObserveFn = Arc<dyn Fn(&CallContext) + Send + Sync>;

/// What a tap's shim does after the observer ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapPolicy {
    /// Call the displaced handler with the identical, unmodified context and
    /// return its result. The default; every stock tap forwards.
    Forward,

    /// Do not call the displaced handler; return `retcode` instead.
    ///
    /// Suppression is never implicit. A tap built with this policy takes
    /// the operation over entirely, and that choice is visible in the tap's
    /// construction, not buried in its observer.
    Suppress {
        /// The result word returned in place of the original's.
        retcode: isize,
    },
}

/// A named side effect attached in front of a table handler.
///
/// Installing a tap builds a forwarding shim: a fresh handler cell that runs
/// the tap's observer, then applies its [`TapPolicy`]. Under
/// [`TapPolicy::Forward`] the shim calls the exact handler the slot held at
/// install time, captured by value when the shim is built, so the shim can
/// never re-enter its own slot and keeps working while a restore swaps the
/// slot back underneath it.
///
/// Taps follow the builder style:
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use veiltap::hooks::Tap;
///
/// let calls = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&calls);
///
/// let tap = Tap::new("call-counter").observe(move |_ctx| {
///     counter.fetch_add(1, Ordering::Relaxed);
/// });
/// assert_eq!(tap.name(), "call-counter");
/// ```
pub struct Tap {
    name: String,
    policy: TapPolicy,
    observe: ObserveFn,
}

impl Tap {
    /// Creates a tap with the given diagnostic name, no observer, and the
    /// forwarding policy.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Tap {
            name: name.to_string(),
            policy: TapPolicy::Forward,
            observe: Arc::new(|_| {}),
        }
    }

    /// Sets the observer running before the policy is applied.
    ///
    /// Observers run on the caller's thread for every intercepted call and
    /// must not block indefinitely.
    #[must_use]
    pub fn observe(mut self, observer: impl Fn(&CallContext) + Send + Sync + 'static) -> Self {
        self.observe = Arc::new(observer);
        self
    }

    /// Sets the forwarding policy
    #[must_use]
    pub fn with_policy(mut self, policy: TapPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The tap's diagnostic name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tap's forwarding policy
    #[must_use]
    pub fn policy(&self) -> TapPolicy {
        self.policy
    }

    /// Builds the shim cell for this tap, capturing the displaced handler.
    ///
    /// The returned designator is ready to be stored into the slot that
    /// `original` came from.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSlot`] if `original` does not name a cell of
    /// `table`.
    pub(crate) fn into_shim(
        self,
        table: &DispatchTable,
        original: HandlerRef,
    ) -> Result<HandlerRef> {
        let original_fn = table
            .handler_fn(original)
            .ok_or(Error::InvalidSlot(original.index()))?;

        let Tap {
            name,
            policy,
            observe,
        } = self;

        let shim = move |context: &CallContext| -> isize {
            observe(context);
            match policy {
                TapPolicy::Forward => original_fn(context),
                TapPolicy::Suppress { retcode } => retcode,
            }
        };

        Ok(table.register(&format!("tap:{name}"), shim))
    }
}

impl fmt::Debug for Tap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tap")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::Pid;
    use crate::table::Operation;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> CallContext {
        CallContext::new(Operation::RecvMessage, Pid(3))
    }

    fn one_slot_table() -> DispatchTable {
        DispatchTable::builder(1)
            .handler(0, "orig", |_| 100)
            .build()
            .unwrap()
    }

    #[test]
    fn test_forwarding_shim_runs_observer_then_original() {
        let table = one_slot_table();
        let original = table.entry(0).unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let shim = Tap::new("probe")
            .observe(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .into_shim(&table, original)
            .unwrap();

        assert_eq!(table.call(shim, &ctx()).unwrap(), 100);
        assert_eq!(seen.load(Ordering::Relaxed), 1);
        assert_eq!(table.handler_name(shim), Some("tap:probe"));
    }

    #[test]
    fn test_suppressing_shim_skips_original() {
        let table = one_slot_table();
        let original = table.entry(0).unwrap();

        let original_ran = Arc::new(AtomicUsize::new(0));
        // Rebuild the slot handler with a counter so a forward would be seen.
        let counter = Arc::clone(&original_ran);
        let counted_original = table.register("counted-orig", move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            100
        });
        {
            let guard = table.unprotect().unwrap();
            guard.write(0, counted_original).unwrap();
        }
        let _ = original;

        let shim = Tap::new("mute")
            .with_policy(TapPolicy::Suppress { retcode: -7 })
            .into_shim(&table, counted_original)
            .unwrap();

        assert_eq!(table.call(shim, &ctx()).unwrap(), -7);
        assert_eq!(original_ran.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_shim_rejects_foreign_designator() {
        let table = one_slot_table();
        let other = DispatchTable::builder(2)
            .handler(0, "a", |_| 0)
            .handler(1, "b", |_| 1)
            .build()
            .unwrap();

        let foreign = other.entry(1).unwrap();
        let err = Tap::new("bad").into_shim(&table, foreign).unwrap_err();
        assert!(matches!(err, Error::InvalidSlot(_)));
    }

    #[test]
    fn test_default_policy_is_forward() {
        let tap = Tap::new("plain");
        assert_eq!(tap.policy(), TapPolicy::Forward);
    }
}
