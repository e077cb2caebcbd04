use std::fmt;

/// A process identifier tracked by the interception layer.
///
/// Identifiers are plain 32-bit values handed in by the host. The value `0` is
/// reserved for the registry's sentinel node and can never be hidden, unhidden,
/// or resolved; every other value up to [`u32::MAX`] is a legal identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl Pid {
    /// The reserved sentinel identifier (value 0).
    ///
    /// The registry's chain head carries this identifier. It is never a valid
    /// hidden entry and [`crate::registry::HiddenRegistry::hide`] rejects it.
    pub const SENTINEL: Pid = Pid(0);

    /// Creates a new identifier from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Pid(value)
    }

    /// Returns the raw identifier value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns true if this is the reserved sentinel identifier (value 0)
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Pid {
    fn from(value: u32) -> Self {
        Pid(value)
    }
}

impl From<Pid> for u32 {
    fn from(pid: Pid) -> Self {
        pid.0
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_sentinel() {
            write!(f, "Pid(0, sentinel)")
        } else {
            write!(f, "Pid({})", self.0)
        }
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
