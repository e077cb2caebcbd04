//! Host identifier resolution.
//!
//! Before an identifier enters the hidden set, the registry asks the host
//! whether a live entity stands behind it. That question goes through the
//! [`IdResolver`] collaborator: `resolve` answers with an opaque [`IdHandle`]
//! for live identifiers and `None` for everything else, which the registry
//! reports as [`crate::Error::NotFound`].
//!
//! Hosts embedding the crate implement [`IdResolver`] against their own
//! process table. Two implementations ship in-tree: [`FixedResolver`] backed
//! by an explicit, updatable identifier set, and [`OpenResolver`] which
//! accepts every identifier except the sentinel.

use dashmap::DashSet;

use crate::pid::Pid;

/// Opaque proof that an identifier resolved to a live entity.
///
/// Handles are produced by [`IdResolver::resolve`] and consumed immediately by
/// the registry; they carry no liveness guarantee beyond the moment of
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdHandle {
    pid: Pid,
}

impl IdHandle {
    /// Creates a handle for a resolved identifier.
    ///
    /// Resolver implementations call this for identifiers they vouch for.
    #[must_use]
    pub fn new(pid: Pid) -> Self {
        IdHandle { pid }
    }

    /// The identifier this handle resolves
    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }
}

/// Maps identifiers to live entities.
///
/// `resolve` returns `None` for identifiers with no live entity behind them.
/// The sentinel identifier (0) must never resolve. Implementations are called
/// with the registry lock not held and may block briefly, but must be safe to
/// call from any thread.
pub trait IdResolver: Send + Sync {
    /// Resolves an identifier to a handle, or `None` if nothing live carries it
    fn resolve(&self, pid: Pid) -> Option<IdHandle>;
}

/// Resolver backed by an explicit identifier set.
///
/// The set is updatable at any time, so tests and embedders can script
/// identifiers appearing and disappearing. An identifier resolves exactly
/// while it is in the set.
///
/// # Examples
///
/// ```rust
/// use veiltap::resolver::{FixedResolver, IdResolver};
/// use veiltap::Pid;
///
/// let resolver = FixedResolver::default();
/// resolver.insert(Pid(42));
///
/// assert!(resolver.resolve(Pid(42)).is_some());
/// assert!(resolver.resolve(Pid(43)).is_none());
///
/// resolver.remove(Pid(42));
/// assert!(resolver.resolve(Pid(42)).is_none());
/// ```
#[derive(Debug, Default)]
pub struct FixedResolver {
    live: DashSet<Pid>,
}

impl FixedResolver {
    /// Creates a resolver with an empty identifier set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver pre-populated with the given identifiers
    #[must_use]
    pub fn with_ids(ids: impl IntoIterator<Item = Pid>) -> Self {
        let resolver = Self::new();
        for pid in ids {
            resolver.live.insert(pid);
        }
        resolver
    }

    /// Adds an identifier to the live set; returns false if already present
    pub fn insert(&self, pid: Pid) -> bool {
        self.live.insert(pid)
    }

    /// Removes an identifier from the live set; returns false if absent
    pub fn remove(&self, pid: Pid) -> bool {
        self.live.remove(&pid).is_some()
    }

    /// Returns true if the identifier is currently in the live set
    #[must_use]
    pub fn contains(&self, pid: Pid) -> bool {
        self.live.contains(&pid)
    }

    /// Number of identifiers in the live set
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns true if the live set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

impl IdResolver for FixedResolver {
    fn resolve(&self, pid: Pid) -> Option<IdHandle> {
        if pid.is_sentinel() || !self.live.contains(&pid) {
            return None;
        }

        Some(IdHandle::new(pid))
    }
}

/// Resolver that accepts every identifier except the sentinel.
///
/// For hosts that do not track identifier liveness and want the registry to
/// take any nonzero identifier at face value.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenResolver;

impl OpenResolver {
    /// Creates an open resolver
    #[must_use]
    pub fn new() -> Self {
        OpenResolver
    }
}

impl IdResolver for OpenResolver {
    fn resolve(&self, pid: Pid) -> Option<IdHandle> {
        if pid.is_sentinel() {
            return None;
        }

        Some(IdHandle::new(pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_resolver_tracks_set() {
        let resolver = FixedResolver::new();
        assert!(resolver.is_empty());

        assert!(resolver.insert(Pid(10)));
        assert!(!resolver.insert(Pid(10)));
        assert_eq!(resolver.len(), 1);
        assert!(resolver.contains(Pid(10)));

        let handle = resolver.resolve(Pid(10)).unwrap();
        assert_eq!(handle.pid(), Pid(10));

        assert!(resolver.remove(Pid(10)));
        assert!(!resolver.remove(Pid(10)));
        assert!(resolver.resolve(Pid(10)).is_none());
    }

    #[test]
    fn test_fixed_resolver_with_ids() {
        let resolver = FixedResolver::with_ids([Pid(1), Pid(2), Pid(3)]);
        assert_eq!(resolver.len(), 3);
        assert!(resolver.resolve(Pid(2)).is_some());
        assert!(resolver.resolve(Pid(4)).is_none());
    }

    #[test]
    fn test_fixed_resolver_never_resolves_sentinel() {
        let resolver = FixedResolver::new();
        resolver.insert(Pid::SENTINEL);
        assert!(resolver.resolve(Pid::SENTINEL).is_none());
    }

    #[test]
    fn test_open_resolver() {
        let resolver = OpenResolver::new();
        assert!(resolver.resolve(Pid(1)).is_some());
        assert!(resolver.resolve(Pid(u32::MAX)).is_some());
        assert!(resolver.resolve(Pid::SENTINEL).is_none());
    }
}
