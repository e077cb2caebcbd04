//! # veiltap Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the veiltap library. Import this module to get quick access to the essential
//! types for building and driving an interception layer.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all veiltap operations
pub use crate::Error;

/// The result type used throughout veiltap
pub use crate::Result;

/// Process identifier newtype; zero is the reserved chain sentinel
pub use crate::Pid;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Main entry point for assembling the interception layer
pub use crate::{Interceptor, InterceptorBuilder};

// ================================================================================================
// Hidden-Id Registry
// ================================================================================================

/// The hidden-identifier chain and its admin operations
pub use crate::registry::HiddenRegistry;

// ================================================================================================
// Identifier Resolution
// ================================================================================================

/// Host identifier resolution seam and the bundled resolvers
pub use crate::resolver::{FixedResolver, IdHandle, IdResolver, OpenResolver};

// ================================================================================================
// Dispatch Table
// ================================================================================================

/// The dispatch table, its builder, and the scoped write window
pub use crate::table::{DispatchTable, DispatchTableBuilder, WriteGuard};

/// Handler designators and the shared handler function type
pub use crate::table::{HandlerFn, HandlerRef, SlotIndex};

/// Per-call context passed to handlers and observers
pub use crate::table::{CallContext, CallFlags, CALL_ARGS};

/// Operation identities and the startup slot layout
pub use crate::table::{Operation, SlotResolver, TableLayout};

// ================================================================================================
// Hooks and Taps
// ================================================================================================

/// Hook lifecycle management and tap construction
pub use crate::hooks::{HookManager, ObserveFn, Tap, TapPolicy};

/// Ready-made taps for common interception chores
pub use crate::hooks::stock::{call_logger, hidden_caller_probe, unhide_on_exit};

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Log sink seam and the bundled sinks
pub use crate::sink::{ConsoleSink, LogSink, MemorySink, Stream};

/// Line budget constants for bounded log output
pub use crate::sink::{LOG_LINE_MAX, PREFIX_MAX};
