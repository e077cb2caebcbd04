//! Hidden-id registry: the set of identifiers currently excluded from view.
//!
//! The registry keeps hidden identifiers on a sentinel-headed singly linked
//! chain in insertion order. The sentinel never leaves, a tail index makes
//! append O(1), and unlinking is a linear walk, so the structure round-trips
//! arbitrary hide/unhide sequences back to a clean empty chain:
//!
//! ```text
//!  sentinel                            tail
//!     |                                  |
//!     v                                  v
//!   [ 0 ] --> [ 1337 ] --> [ 4242 ] --> [ 777 ] --> (end)
//! ```
//!
//! All mutation goes through one registry-wide lock; admin calls are
//! serialized against each other and `is_hidden` reads a fully linked chain
//! or nothing. Every admin call emits exactly one line to the configured
//! [`LogSink`] naming the identifier and the outcome: confirmations go to
//! [`Stream::Output`], refusals to [`Stream::Diagnostic`]. The one exception
//! is [`HiddenRegistry::try_unhide`], which stays silent when there is
//! nothing to remove.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use veiltap::registry::HiddenRegistry;
//! use veiltap::resolver::FixedResolver;
//! use veiltap::sink::MemorySink;
//! use veiltap::Pid;
//!
//! let resolver = Arc::new(FixedResolver::with_ids([Pid(1337)]));
//! let sink = Arc::new(MemorySink::new());
//! let registry = HiddenRegistry::new(resolver, sink)?;
//!
//! registry.hide(Pid(1337))?;
//! assert!(registry.is_hidden(Pid(1337)));
//!
//! registry.unhide(Pid(1337))?;
//! assert!(!registry.is_hidden(Pid(1337)));
//! # Ok::<(), veiltap::Error>(())
//! ```

mod chain;

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use crate::{Error, Result};
use crate::pid::Pid;
use crate::resolver::IdResolver;
use crate::sink::{LogSink, Stream};

use chain::Chain;

/// Concurrency-safe registry of hidden identifiers.
///
/// Holds the chain behind a reader/writer lock. [`HiddenRegistry::hide`] and
/// [`HiddenRegistry::unhide`] take the write side; [`HiddenRegistry::is_hidden`]
/// and [`HiddenRegistry::snapshot`] take the read side and never block each
/// other.
///
/// # Thread Safety
///
/// All methods take `&self` and are safe to call from any thread. Mutating
/// calls surface [`Error::LockError`] when the chain lock was poisoned by a
/// panicking writer; read-only calls recover the inner value instead, since
/// the chain is structurally sound outside a write critical section.
pub struct HiddenRegistry {
    chain: RwLock<Chain>,
    resolver: Arc<dyn IdResolver>,
    sink: Arc<dyn LogSink>,
}

impl HiddenRegistry {
    /// Creates a registry with no bound on the number of hidden entries.
    ///
    /// # Arguments
    ///
    /// * `resolver` - Host collaborator answering whether an identifier is live
    /// * `sink` - Receiver for the one-line-per-call diagnostics
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationError`] if the sentinel node cannot be
    /// allocated.
    pub fn new(resolver: Arc<dyn IdResolver>, sink: Arc<dyn LogSink>) -> Result<Self> {
        Self::build(resolver, sink, None)
    }

    /// Creates a registry that refuses to hold more than `max_entries` ids.
    ///
    /// Once the bound is reached, further [`HiddenRegistry::hide`] calls fail
    /// with [`Error::AllocationError`] until an entry is unhidden. The bound
    /// counts live entries only; the sentinel is free.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationError`] if the sentinel node cannot be
    /// allocated.
    pub fn with_capacity(
        resolver: Arc<dyn IdResolver>,
        sink: Arc<dyn LogSink>,
        max_entries: usize,
    ) -> Result<Self> {
        Self::build(resolver, sink, Some(max_entries))
    }

    fn build(
        resolver: Arc<dyn IdResolver>,
        sink: Arc<dyn LogSink>,
        max_entries: Option<usize>,
    ) -> Result<Self> {
        Ok(HiddenRegistry {
            chain: RwLock::new(Chain::new(max_entries)?),
            resolver,
            sink,
        })
    }

    /// Adds an identifier to the hidden set.
    ///
    /// The identifier must resolve through the host resolver and must not be
    /// hidden already; the reserved sentinel identifier (0) never qualifies.
    /// On success the id is appended at the chain tail, so
    /// [`HiddenRegistry::snapshot`] reports ids oldest-first.
    ///
    /// Exactly one sink line is written: `PID <id> is hidden.` on
    /// [`Stream::Output`] when the id lands, or one refusal on
    /// [`Stream::Diagnostic`] naming what went wrong (`PID <id> not found.`,
    /// `PID <id> already hidden.`, or the allocation diagnostic).
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] - the id is the sentinel or did not resolve
    /// - [`Error::AlreadyHidden`] - the id is already in the chain
    /// - [`Error::AllocationError`] - storage exhausted; chain unchanged
    /// - [`Error::LockError`] - the chain lock was poisoned
    pub fn hide(&self, pid: Pid) -> Result<()> {
        if pid.is_sentinel() || self.resolver.resolve(pid).is_none() {
            self.sink
                .log(Stream::Diagnostic, &format!("PID {pid} not found."));
            return Err(Error::NotFound(pid));
        }

        {
            let mut chain = self.write_chain()?;
            if chain.contains(pid) {
                drop(chain);
                self.sink
                    .log(Stream::Diagnostic, &format!("PID {pid} already hidden."));
                return Err(Error::AlreadyHidden(pid));
            }

            if let Err(e) = chain.push(pid) {
                drop(chain);
                self.sink.log(
                    Stream::Diagnostic,
                    &format!("Error allocating memory to hide PID {pid}."),
                );
                return Err(e);
            }
        }

        self.sink
            .log(Stream::Output, &format!("PID {pid} is hidden."));
        Ok(())
    }

    /// Removes an identifier from the hidden set.
    ///
    /// Exactly one sink line is written: `PID <id> unhidden.` on
    /// [`Stream::Output`], or `PID <id> is not hidden.` on
    /// [`Stream::Diagnostic`].
    ///
    /// # Errors
    ///
    /// - [`Error::NotHidden`] - the id occupies no chain node; the sentinel
    ///   identifier always takes this path
    /// - [`Error::LockError`] - the chain lock was poisoned
    pub fn unhide(&self, pid: Pid) -> Result<()> {
        if self.try_unhide(pid)? {
            Ok(())
        } else {
            self.sink
                .log(Stream::Diagnostic, &format!("PID {pid} is not hidden."));
            Err(Error::NotHidden(pid))
        }
    }

    /// Removes an identifier if it is currently hidden.
    ///
    /// Behaves like [`HiddenRegistry::unhide`] when the id is present,
    /// writing the same `PID <id> unhidden.` confirmation. An absent id is
    /// not an error here: the call returns `Ok(false)` and writes nothing.
    /// Cleanup paths that race other callers for the same id use this so
    /// the loser has nothing to report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the chain lock was poisoned.
    pub fn try_unhide(&self, pid: Pid) -> Result<bool> {
        let removed = {
            let mut chain = self.write_chain()?;
            chain.remove(pid)
        };

        if removed {
            self.sink
                .log(Stream::Output, &format!("PID {pid} unhidden."));
        }
        Ok(removed)
    }

    /// Returns true if the identifier is currently hidden.
    ///
    /// The sentinel identifier is never reported hidden. This read does not
    /// block other readers and writes no sink line.
    ///
    /// # Thread Safety
    ///
    /// Recovers from a poisoned lock by reading the inner chain directly; a
    /// poisoned write left the chain fully linked, so the answer is still
    /// well defined.
    #[must_use]
    pub fn is_hidden(&self, pid: Pid) -> bool {
        let chain = self
            .chain
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        chain.contains(pid)
    }

    /// Copies out the hidden identifiers in chain order, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Pid> {
        let chain = self
            .chain
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        chain.iter().collect()
    }

    /// Number of currently hidden identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        let chain = self
            .chain
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        chain.len()
    }

    /// Returns true if nothing is hidden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains the hidden set, returning how many entries were dropped.
    ///
    /// Takes the write lock like any other mutation, so it is safe against
    /// concurrent admin calls; no caller-side quiescence is required. A
    /// single summary line is written when anything was drained; clearing an
    /// empty registry is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the chain lock was poisoned.
    pub fn clear(&self) -> Result<usize> {
        let drained = {
            let mut chain = self.write_chain()?;
            chain.clear()
        };

        if drained > 0 {
            let entries = if drained == 1 { "entry" } else { "entries" };
            self.sink.log(
                Stream::Output,
                &format!("Hidden PID registry cleared ({drained} {entries})."),
            );
        }
        Ok(drained)
    }

    fn write_chain(&self) -> Result<RwLockWriteGuard<'_, Chain>> {
        self.chain.write().map_err(|_| Error::LockError)
    }
}

impl std::fmt::Debug for HiddenRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HiddenRegistry")
            .field("hidden", &self.len())
            .finish_non_exhaustive()
    }
}
