use bitflags::bitflags;

use crate::pid::Pid;

use super::operation::Operation;

/// Number of raw argument words carried by a [`CallContext`].
pub const CALL_ARGS: usize = 4;

bitflags! {
    /// Modifier bits accompanying an intercepted call.
    ///
    /// Mirrors the flag word the host passes alongside message operations.
    /// Handlers and taps receive the word untouched; nothing in the crate
    /// interprets individual bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CallFlags: u32 {
        /// The caller asked the operation not to block.
        const NONBLOCKING = 0x0001;

        /// The payload should be inspected without consuming it.
        const PEEK = 0x0002;

        /// The payload was cut down to fit the caller's buffer.
        const TRUNCATED = 0x0004;

        /// Out-of-band data accompanies the call.
        const OUT_OF_BAND = 0x0008;
    }
}

/// Everything a handler learns about one intercepted call.
///
/// Contexts are built by the host at the dispatch boundary and passed by
/// reference down the handler chain. A forwarding tap hands the identical
/// context to the saved original; nothing downstream can observe whether a
/// replacement sat in between.
///
/// # Examples
///
/// ```rust
/// use veiltap::table::{CallContext, CallFlags, Operation};
/// use veiltap::Pid;
///
/// let ctx = CallContext::new(Operation::RecvMessage, Pid(1337))
///     .with_args([0xdead, 0xbeef, 64, 0])
///     .with_flags(CallFlags::NONBLOCKING);
///
/// assert_eq!(ctx.caller(), Pid(1337));
/// assert_eq!(ctx.args()[2], 64);
/// assert!(ctx.flags().contains(CallFlags::NONBLOCKING));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    operation: Operation,
    caller: Pid,
    args: [u64; CALL_ARGS],
    flags: CallFlags,
}

impl CallContext {
    /// Creates a context with zeroed arguments and no flags.
    ///
    /// # Arguments
    ///
    /// * `operation` - The operation being dispatched
    /// * `caller` - Identifier of the entity making the call
    #[must_use]
    pub fn new(operation: Operation, caller: Pid) -> Self {
        CallContext {
            operation,
            caller,
            args: [0; CALL_ARGS],
            flags: CallFlags::empty(),
        }
    }

    /// Sets the raw argument words
    #[must_use]
    pub fn with_args(mut self, args: [u64; CALL_ARGS]) -> Self {
        self.args = args;
        self
    }

    /// Sets the modifier flag word
    #[must_use]
    pub fn with_flags(mut self, flags: CallFlags) -> Self {
        self.flags = flags;
        self
    }

    /// The operation being dispatched
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Identifier of the calling entity
    #[must_use]
    pub fn caller(&self) -> Pid {
        self.caller
    }

    /// The raw argument words
    #[must_use]
    pub fn args(&self) -> &[u64; CALL_ARGS] {
        &self.args
    }

    /// The modifier flag word
    #[must_use]
    pub fn flags(&self) -> CallFlags {
        self.flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_defaults() {
        let ctx = CallContext::new(Operation::SendMessage, Pid(5));
        assert_eq!(ctx.operation(), Operation::SendMessage);
        assert_eq!(ctx.caller(), Pid(5));
        assert_eq!(ctx.args(), &[0; CALL_ARGS]);
        assert!(ctx.flags().is_empty());
    }

    #[test]
    fn test_builder_style_setters() {
        let ctx = CallContext::new(Operation::RecvMessage, Pid(9))
            .with_args([1, 2, 3, 4])
            .with_flags(CallFlags::PEEK | CallFlags::TRUNCATED);

        assert_eq!(ctx.args(), &[1, 2, 3, 4]);
        assert!(ctx.flags().contains(CallFlags::PEEK));
        assert!(ctx.flags().contains(CallFlags::TRUNCATED));
        assert!(!ctx.flags().contains(CallFlags::NONBLOCKING));
    }

    #[test]
    fn test_context_clone_is_identical() {
        let ctx = CallContext::new(Operation::ExitNotify, Pid(77)).with_args([9, 8, 7, 6]);
        assert_eq!(ctx.clone(), ctx);
    }

    #[test]
    fn test_flags_roundtrip_bits() {
        let flags = CallFlags::from_bits(0x0003).unwrap();
        assert_eq!(flags, CallFlags::NONBLOCKING | CallFlags::PEEK);
        assert_eq!(flags.bits(), 0x0003);
        assert!(CallFlags::from_bits(0x8000_0000).is_none());
    }
}
