//! Hook lifecycle: installing, running, and restoring table replacements.
//!
//! This module turns the raw dispatch table into a managed interception
//! point. The [`HookManager`] owns every install/restore transition and the
//! state needed to undo it; [`Tap`] describes what a replacement actually
//! does and builds the forwarding shim that does it.
//!
//! # Organization
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`HookManager`] | Per-slot serialized install/restore transitions |
//! | [`Tap`] / [`TapPolicy`] | Replacement behavior and shim construction |
//! | [`stock`] | Ready-made taps: logging, hidden-caller probe, exit cleanup |
//!
//! # Interception Flow
//!
//! ```text
//! host dispatch(slot)
//!         │
//!         ▼
//! ┌──────────────────┐   not installed   ┌──────────────────┐
//! │  slot designator │ ────────────────► │ original handler │
//! └──────────────────┘                   └──────────────────┘
//!         │ installed
//!         ▼
//! ┌──────────────────┐
//! │  tap shim        │  observer runs (log / consult / mutate registry)
//! └──────────────────┘
//!         │ TapPolicy::Forward              TapPolicy::Suppress
//!         ▼                                        │
//! ┌──────────────────┐                             ▼
//! │ captured original│  identical context     documented retcode
//! └──────────────────┘
//!         │
//!         ▼
//!   original's result, unmodified
//! ```
//!
//! The shim never reads its own slot: the original is captured by value at
//! install time, under the slot's transition lock, so forwarding cannot
//! recurse and cannot race a concurrent restore.

pub mod stock;

mod manager;
mod tap;

pub use manager::HookManager;
pub use tap::{ObserveFn, Tap, TapPolicy};
