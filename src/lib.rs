// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![deny(unsafe_code)]

//! # veiltap
//!
//! [![Crates.io](https://img.shields.io/crates/v/veiltap.svg)](https://crates.io/crates/veiltap)
//! [![Documentation](https://docs.rs/veiltap/badge.svg)](https://docs.rs/veiltap)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/veiltap/blob/main/LICENSE-APACHE)
//!
//! An in-process call-interception toolkit: a hidden-identifier registry, an atomically
//! hot-swappable dispatch table, and a managed hook lifecycle, built for hosts that route
//! their operations through an indexed handler table. `veiltap` is pure safe Rust; slots
//! hold indices into immortal handler cells rather than raw pointers, so installs and
//! restores are single atomic stores and dispatch is a single atomic load.
//!
//! ## Features
//!
//! - **🫥 Hidden-id registry** - Sentinel-anchored chain of hidden identifiers with arena
//!   node reuse and an optional capacity bound
//! - **🪝 Managed hook lifecycle** - Install and restore dispatch slots with the original
//!   handler saved and restored bit-identically
//! - **⚡ Lock-free dispatch** - The hot path is one atomic load plus an indexed call
//! - **🔁 Restore-safe shims** - Calls mid-flight through a tap complete correctly even
//!   while the slot is being restored underneath them
//! - **🛡️ No unsafe code** - The whole crate builds under `#![deny(unsafe_code)]`
//! - **📜 Bounded diagnostics** - Two-stream logging with a fixed line budget and
//!   truncating writes
//! - **🧩 Explicit context** - No ambient globals; one object owns the subsystem and
//!   tears it down on shutdown
//!
//! ## Quick Start
//!
//! Add `veiltap` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! veiltap = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! For convenient access to the most commonly used types, import the prelude:
//!
//! ```rust
//! use std::sync::Arc;
//! use veiltap::prelude::*;
//!
//! // A host table with one handler per operation slot.
//! let table = Arc::new(
//!     DispatchTable::builder(4)
//!         .handler(0, "recv", |_| 0)
//!         .handler(1, "send", |_| 0)
//!         .handler(2, "enum", |_| 0)
//!         .handler(3, "exit", |_| 0)
//!         .build()?,
//! );
//!
//! let interceptor = Interceptor::builder().table(table).build()?;
//! interceptor.hide(Pid(1234))?;
//! assert!(interceptor.is_hidden(Pid(1234)));
//! # Ok::<(), veiltap::Error>(())
//! ```
//!
//! ### Basic Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use veiltap::hooks::stock;
//! use veiltap::resolver::FixedResolver;
//! use veiltap::sink::{LogSink, MemorySink};
//! use veiltap::table::{CallContext, DispatchTable, Operation};
//! use veiltap::{Interceptor, Pid};
//!
//! let table = Arc::new(
//!     DispatchTable::builder(4)
//!         .handler(0, "recv", |_| 0)
//!         .handler(1, "send", |_| 0)
//!         .handler(2, "enum", |_| 0)
//!         .handler(3, "exit", |_| 0)
//!         .build()?,
//! );
//! let sink = Arc::new(MemorySink::new());
//!
//! let interceptor = Interceptor::builder()
//!     .table(table)
//!     .resolver(Arc::new(FixedResolver::with_ids([Pid(42)])))
//!     .sink(Arc::clone(&sink) as Arc<dyn LogSink>)
//!     .build()?;
//!
//! // Hide an identifier; the outcome is logged on the output stream.
//! interceptor.hide(Pid(42))?;
//! assert!(sink.contains("PID 42 is hidden."));
//!
//! // Tap the receive path, then route a call through the table.
//! interceptor.install(
//!     Operation::RecvMessage,
//!     stock::call_logger(Arc::clone(&sink) as Arc<dyn LogSink>),
//! )?;
//! interceptor.invoke(&CallContext::new(Operation::RecvMessage, Pid(42)))?;
//! assert!(sink.contains("RecvMessage intercepted from PID 42."));
//!
//! // Shutdown restores every slot and drains the hidden set.
//! interceptor.shutdown()?;
//! assert_eq!(interceptor.hidden_count(), 0);
//! # Ok::<(), veiltap::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `veiltap` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`registry`] - The hidden-identifier chain and its admin operations
//! - [`table`] - The dispatch table, call contexts, and operation-to-slot layout
//! - [`hooks`] - Tap construction and the install/restore lifecycle
//! - [`sink`] - Bounded two-stream diagnostics
//! - [`resolver`] - Host identifier resolution
//! - [`Error`] and [`Result`] - Comprehensive error handling
//!
//! ### The Registry
//!
//! The [`registry::HiddenRegistry`] keeps the set of hidden identifiers as a singly
//! linked chain anchored by a reserved sentinel node, the layout hosts traditionally
//! use for this bookkeeping. It provides:
//!
//! - **Admin operations**: hide, unhide, and membership queries
//! - **Arena storage**: unlinked nodes are recycled, so unhide never allocates
//! - **Capacity bounds**: an optional limit on the number of hidden entries
//! - **A diagnostic transcript**: one line per admin outcome, confirmations
//!   on the output stream and refusals on the diagnostic stream
//!
//! ### Dispatch and Hooks
//!
//! The [`table::DispatchTable`] holds one atomic designator per slot, each naming a
//! handler cell in an append-only arena. Cells are immortal for the table's lifetime,
//! which is what makes the hook lifecycle safe:
//!
//! - **Install** swaps a slot to a freshly built forwarding shim in one atomic store
//! - **Restore** swaps the saved original back, bit-identical to what was displaced
//! - **In-flight calls** finish through whichever handler they loaded
//! - **Write protection** is scoped to the swap and rearms even on failure
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result) with specific failure variants:
//!
//! ```rust
//! use std::sync::Arc;
//! use veiltap::registry::HiddenRegistry;
//! use veiltap::resolver::FixedResolver;
//! use veiltap::sink::MemorySink;
//! use veiltap::{Error, Pid};
//!
//! let registry = HiddenRegistry::new(
//!     Arc::new(FixedResolver::default()),
//!     Arc::new(MemorySink::new()),
//! )?;
//!
//! match registry.hide(Pid(7)) {
//!     Ok(()) => println!("hidden"),
//!     Err(Error::NotFound(pid)) => println!("{pid} does not resolve"),
//!     Err(Error::AlreadyHidden(pid)) => println!("{pid} is already hidden"),
//!     Err(e) => println!("other error: {e}"),
//! }
//! # Ok::<(), veiltap::Error>(())
//! ```
//!
//! ## Development and Testing
//!
//! The crate includes fuzzing support for the registry's admin surface:
//!
//! ### Fuzzing
//!
//! ```bash
//! # Install fuzzing tools
//! cargo install cargo-fuzz
//!
//! # Run fuzzer
//! cargo +nightly fuzz run registry_ops --release
//!
//! # Multi-core fuzzing
//! cargo +nightly fuzz run registry_ops --release -- -jobs=4 -fork=1
//! ```
//!
//! ### Testing
//!
//! The test suite includes concurrency stress tests alongside the unit tests:
//!
//! ```bash
//! cargo test
//! cargo test --release  # For the heavier concurrency tests
//! ```

pub(crate) mod error;
pub(crate) mod interceptor;
pub(crate) mod pid;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used types
/// from across the veiltap library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use veiltap::prelude::*;
///
/// let table = Arc::new(
///     DispatchTable::builder(4)
///         .handler(0, "recv", |_| 0)
///         .handler(1, "send", |_| 0)
///         .handler(2, "enum", |_| 0)
///         .handler(3, "exit", |_| 0)
///         .build()?,
/// );
/// let interceptor = Interceptor::builder().table(table).build()?;
/// interceptor.hide(Pid(7))?;
/// # Ok::<(), veiltap::Error>(())
/// ```
pub mod prelude;

/// Tap construction and the managed hook lifecycle.
///
/// A [`hooks::Tap`] is a named observer plus a forwarding policy; installing one
/// builds a shim handler that runs the observer and then forwards to the exact
/// handler the slot held at install time. The [`hooks::HookManager`] owns the
/// install/restore bookkeeping and guarantees one managed replacement per slot.
///
/// # Key Types
///
/// - [`hooks::Tap`] - A named side effect attached in front of a handler
/// - [`hooks::TapPolicy`] - Forward to the original or suppress it
/// - [`hooks::HookManager`] - Saved-original bookkeeping and slot transitions
/// - [`hooks::stock`] - Ready-made taps: call logging, hidden-caller probing,
///   unhide-on-exit
///
/// # Examples
///
/// ```rust
/// use veiltap::hooks::{Tap, TapPolicy};
///
/// let tap = Tap::new("drop-sends")
///     .with_policy(TapPolicy::Suppress { retcode: -1 });
/// assert_eq!(tap.policy(), TapPolicy::Suppress { retcode: -1 });
/// ```
pub mod hooks;

/// The hidden-identifier registry.
///
/// [`registry::HiddenRegistry`] keeps hidden identifiers in a sentinel-anchored
/// chain over arena storage, with every admin outcome logged to the configured
/// sink. See the module documentation for the chain layout and locking rules.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use veiltap::registry::HiddenRegistry;
/// use veiltap::resolver::OpenResolver;
/// use veiltap::sink::MemorySink;
/// use veiltap::Pid;
///
/// let registry = HiddenRegistry::new(
///     Arc::new(OpenResolver::new()),
///     Arc::new(MemorySink::new()),
/// )?;
///
/// registry.hide(Pid(31337))?;
/// assert!(registry.is_hidden(Pid(31337)));
/// registry.unhide(Pid(31337))?;
/// # Ok::<(), veiltap::Error>(())
/// ```
pub mod registry;

/// Host identifier resolution.
///
/// The registry refuses to hide identifiers the host does not vouch for. The
/// [`resolver::IdResolver`] trait is that seam: [`resolver::FixedResolver`]
/// resolves a configured set (the usual choice in tests and embedded hosts),
/// and [`resolver::OpenResolver`] resolves everything except the sentinel.
pub mod resolver;

/// Bounded two-stream diagnostics.
///
/// Everything the crate reports goes through a [`sink::LogSink`], line by line,
/// on either the output or the diagnostic stream. Lines longer than the fixed
/// budget are truncated at a character boundary, never split mid-character and
/// never allowed to grow without bound.
///
/// # Key Types
///
/// - [`sink::LogSink`] - The output seam implemented by hosts
/// - [`sink::Stream`] - Output versus diagnostic routing
/// - [`sink::ConsoleSink`] - Stdout/stderr sink, the default
/// - [`sink::MemorySink`] - Capturing sink for tests and embedding
pub mod sink;

/// The dispatch table and its call plumbing.
///
/// A [`table::DispatchTable`] is a fixed array of atomic slots over an
/// append-only arena of handler cells. Reads are lock-free; writes go through
/// a scoped [`table::WriteGuard`] obtained from
/// [`table::DispatchTable::unprotect`]. The [`table::TableLayout`] maps each
/// [`table::Operation`] to its slot once, at startup, and is immutable after.
///
/// # Key Types
///
/// - [`table::DispatchTable`] - Atomic slots over immortal handler cells
/// - [`table::CallContext`] - The per-call view handlers and observers receive
/// - [`table::Operation`] - The closed set of interceptable host operations
/// - [`table::TableLayout`] - Operation-to-slot mapping resolved at startup
///
/// # Examples
///
/// ```rust
/// use veiltap::table::{CallContext, DispatchTable, Operation};
/// use veiltap::Pid;
///
/// let table = DispatchTable::builder(1)
///     .handler(0, "echo", |ctx| ctx.caller().value() as isize)
///     .build()?;
///
/// let ctx = CallContext::new(Operation::RecvMessage, Pid(99));
/// assert_eq!(table.dispatch(0, &ctx)?, 99);
/// # Ok::<(), veiltap::Error>(())
/// ```
pub mod table;

/// `veiltap` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use veiltap::registry::HiddenRegistry;
/// use veiltap::resolver::OpenResolver;
/// use veiltap::sink::MemorySink;
/// use veiltap::{Pid, Result};
///
/// fn hide_worker(registry: &HiddenRegistry, pid: Pid) -> Result<()> {
///     registry.hide(pid)
/// }
/// # let registry = HiddenRegistry::new(Arc::new(OpenResolver::new()), Arc::new(MemorySink::new()))?;
/// # hide_worker(&registry, Pid(4))?;
/// # Ok::<(), veiltap::Error>(())
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `veiltap` Error type
///
/// The main error type for all operations in this crate. Provides specific variants
/// for registry admin outcomes, hook lifecycle violations, and table misuse.
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
/// let registry = HiddenRegistry::new(
///     Arc::new(FixedResolver::default()),
///     Arc::new(MemorySink::new()),
/// )?;
///
/// match registry.hide(Pid(1)) {
///     Err(Error::NotFound(pid)) => assert_eq!(pid, Pid(1)),
///     other => panic!("expected NotFound, got {other:?}"),
/// }
/// # Ok::<(), veiltap::Error>(())
/// ```
pub use error::Error;

/// Main entry point for assembling and driving the interception layer.
///
/// An [`Interceptor`] binds the registry, the dispatch table, the hook manager,
/// and the diagnostic sink into one explicitly constructed context. Build one
/// with [`Interceptor::builder`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use veiltap::table::DispatchTable;
/// use veiltap::{Interceptor, Pid};
///
/// let table = Arc::new(
///     DispatchTable::builder(4)
///         .handler(0, "recv", |_| 0)
///         .handler(1, "send", |_| 0)
///         .handler(2, "enum", |_| 0)
///         .handler(3, "exit", |_| 0)
///         .build()?,
/// );
/// let interceptor = Interceptor::builder().table(table).build()?;
/// interceptor.hide(Pid(1000))?;
/// # Ok::<(), veiltap::Error>(())
/// ```
pub use interceptor::{Interceptor, InterceptorBuilder};

/// Process identifier newtype used throughout the crate.
///
/// Wraps the host's numeric id. The zero id is the reserved chain sentinel and
/// is rejected by every admin operation.
///
/// # Example
///
/// ```rust
/// use veiltap::Pid;
///
/// let pid = Pid(42);
/// assert_eq!(pid.value(), 42);
/// assert!(!pid.is_sentinel());
/// assert!(Pid::SENTINEL.is_sentinel());
/// ```
pub use pid::Pid;
