use thiserror::Error;

use crate::pid::Pid;
use crate::table::{Operation, SlotIndex};

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all possible error conditions that can occur while maintaining the
/// hidden-id registry, installing or restoring dispatch-table hooks, and routing calls
/// through the table. Each variant provides specific context about the failure mode to
/// enable appropriate error handling.
///
/// # Error Categories
///
/// ## Registry Errors
/// - [`Error::NotFound`] - Identifier does not resolve to a live entity
/// - [`Error::AlreadyHidden`] - Identifier is already present in the hidden set
/// - [`Error::NotHidden`] - Identifier is not present in the hidden set
/// - [`Error::AllocationError`] - Chain storage could not grow
///
/// ## Hook Lifecycle Errors
/// - [`Error::AlreadyInstalled`] - Slot already holds a managed replacement
/// - [`Error::NotInstalled`] - Slot has no managed replacement to restore
/// - [`Error::WriteProtected`] - Table refused to relax write protection
///
/// ## Table Errors
/// - [`Error::InvalidSlot`] - Slot or handler designator outside the live table
/// - [`Error::SlotUnresolved`] - No table slot could be resolved for an operation
///
/// ## Synchronization Errors
/// - [`Error::LockError`] - Registry lock was poisoned by a panicking writer
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use veiltap::registry::HiddenRegistry;
/// use veiltap::resolver::FixedResolver;
/// use veiltap::sink::MemorySink;
/// use veiltap::{Error, Pid};
///
/// let resolver = Arc::new(FixedResolver::default());
/// let sink = Arc::new(MemorySink::new());
/// let registry = HiddenRegistry::new(resolver, sink)?;
///
/// // No identifier was registered with the resolver, so nothing is alive.
/// match registry.hide(Pid(1337)) {
///     Err(Error::NotFound(pid)) => assert_eq!(pid, Pid(1337)),
///     Err(e) => panic!("unexpected failure: {e}"),
///     Ok(()) => panic!("1337 should not resolve"),
/// }
/// # Ok::<(), veiltap::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Registry errors
    /// The identifier does not resolve to a live entity.
    ///
    /// Returned by `hide` when the host resolver reports no live entity behind
    /// the identifier, and for the reserved sentinel identifier (0), which is
    /// never resolvable.
    #[error("PID {0} not found")]
    NotFound(Pid),

    /// The identifier is already present in the hidden set.
    ///
    /// `hide` refuses duplicates; the chain holds at most one node per
    /// identifier and a second hide leaves it untouched.
    #[error("PID {0} already hidden")]
    AlreadyHidden(Pid),

    /// The identifier is not present in the hidden set.
    ///
    /// Returned by `unhide` when no chain node carries the identifier. The
    /// sentinel identifier always takes this path since it never occupies a
    /// live node.
    #[error("PID {0} is not hidden")]
    NotHidden(Pid),

    /// Chain storage could not grow to hold another hidden entry.
    ///
    /// Raised when the node arena fails to reserve memory, or when a
    /// capacity-bounded registry is already at its configured limit. The
    /// chain is left exactly as it was; no partial node is ever linked.
    #[error("Allocation failed - {0}")]
    AllocationError(String),

    // Hook lifecycle errors
    /// The slot already holds a managed replacement.
    ///
    /// Install transitions are strictly one-deep per slot: a second install
    /// must be preceded by a restore. The saved original and the live table
    /// entry are unchanged by the rejected call.
    #[error("Slot {0} already has a hook installed")]
    AlreadyInstalled(SlotIndex),

    /// The slot has no managed replacement to restore.
    ///
    /// Returned by `restore` when the manager never installed at this slot,
    /// or the installation was already restored.
    #[error("Slot {0} has no hook installed")]
    NotInstalled(SlotIndex),

    /// The dispatch table refused to relax write protection.
    ///
    /// Sealed tables never become writable; install and restore both fail
    /// with this error and leave the slot and saved state untouched.
    #[error("Dispatch table is write protected")]
    WriteProtected,

    // Table errors
    /// A slot or handler designator did not refer to a live table entry.
    ///
    /// This is host misuse rather than a lifecycle condition: the index lies
    /// outside the table, the slot was never populated, or a handler
    /// designator came from a different table.
    #[error("Slot index {0} is not a live table entry")]
    InvalidSlot(usize),

    /// No table slot could be resolved for an operation.
    ///
    /// Raised only during construction, when the layout resolver fails to
    /// map an operation or maps it to a vacant slot. The interception layer
    /// never comes up with a partially resolved layout.
    #[error("No table slot resolved for operation {0}")]
    SlotUnresolved(Operation),

    // Synchronization errors
    /// Failed to lock the registry chain.
    ///
    /// This error occurs when the chain lock was poisoned by a panicking
    /// writer. Mutating calls surface it; read-only calls recover the inner
    /// value instead, since a reader cannot compound the damage.
    #[error("Failed to lock target")]
    LockError,

    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories, such as
    /// builder validation failures.
    #[error("{0}")]
    Error(String),
}
