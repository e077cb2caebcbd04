//! Dispatch table: operations, call contexts, and the atomic slot array.
//!
//! This module owns the shared table that routes host calls to handlers, and
//! everything needed to address it:
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Operation`] | Closed set of interceptable host operations |
//! | [`TableLayout`] / [`SlotResolver`] | Startup-time mapping of operations to slots |
//! | [`DispatchTable`] | Atomic slot array over an append-only handler arena |
//! | [`WriteGuard`] | Scoped relaxation of the table's write protection |
//! | [`CallContext`] / [`CallFlags`] | Per-call data handed through the handler chain |
//!
//! # Architecture
//!
//! ```text
//!             slots (atomic designators)        cells (append-only arena)
//!            ┌──────────────────────────┐      ┌──────────────────────────┐
//!  dispatch  │ [0] ──► cell 4 (shim)    │      │ 0: orig-recv             │
//!  ────────► │ [1] ──► cell 1           │      │ 1: orig-send             │
//!            │ [2] ──► cell 2           │      │ 2: orig-enum             │
//!            │ [3] ──► cell 3           │      │ 3: orig-exit             │
//!            └──────────────────────────┘      │ 4: tap:call-logger       │
//!                 ▲                            └──────────────────────────┘
//!                 │ single aligned store              never reclaimed
//!            WriteGuard
//! ```
//!
//! Slot stores are single aligned atomic writes, so the dispatch path reads
//! either the old or the new designator and never a torn value. Cells are
//! never reclaimed while the table lives, so a call already routed through a
//! displaced handler finishes cleanly regardless of slot rewrites.
//!
//! Layout resolution happens once, at construction; an operation that cannot
//! be mapped to a populated slot fails fast with
//! [`crate::Error::SlotUnresolved`] and the interception layer never starts.

mod context;
mod dispatch;
mod operation;

pub use context::{CallContext, CallFlags, CALL_ARGS};
pub use dispatch::{DispatchTable, DispatchTableBuilder, HandlerFn, HandlerRef, WriteGuard};
pub use operation::{Operation, SlotIndex, SlotResolver, TableLayout};
