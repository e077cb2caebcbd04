use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{Error, Result};
use crate::hooks::{HookManager, Tap};
use crate::pid::Pid;
use crate::registry::HiddenRegistry;
use crate::resolver::{IdResolver, OpenResolver};
use crate::sink::{ConsoleSink, LogSink, Stream};
use crate::table::{CallContext, DispatchTable, Operation, SlotResolver, TableLayout};

/// The interception layer: registry, table, hooks, and diagnostics in one
/// explicitly constructed context.
///
/// Nothing in the crate lives in ambient globals. An `Interceptor` is built
/// from its collaborators, owns the subsystem state for its lifetime, and
/// takes everything down in [`Interceptor::shutdown`] (also run best effort
/// on drop). All operations are synchronous and complete before returning.
///
/// Admin calls address slots by [`Operation`]; the layout resolved at build
/// time maps operations to slot indices once, so a resolution failure can
/// only happen during construction.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use veiltap::hooks::stock;
/// use veiltap::resolver::FixedResolver;
/// use veiltap::sink::{LogSink, MemorySink};
/// use veiltap::table::{CallContext, DispatchTable, Operation};
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
/// let sink = Arc::new(MemorySink::new());
/// let resolver = Arc::new(FixedResolver::with_ids([Pid(42)]));
///
/// let interceptor = Interceptor::builder()
///     .table(table)
///     .resolver(resolver)
///     .sink(Arc::clone(&sink) as Arc<dyn LogSink>)
///     .build()?;
///
/// interceptor.hide(Pid(42))?;
/// assert!(interceptor.is_hidden(Pid(42)));
///
/// interceptor.install(
///     Operation::RecvMessage,
///     stock::call_logger(Arc::clone(&sink) as Arc<dyn LogSink>),
/// )?;
/// let ctx = CallContext::new(Operation::RecvMessage, Pid(42));
/// interceptor.invoke(&ctx)?;
/// assert!(sink.contains("RecvMessage intercepted from PID 42."));
///
/// interceptor.shutdown()?;
/// assert!(!interceptor.is_hidden(Pid(42)));
/// # Ok::<(), veiltap::Error>(())
/// ```
pub struct Interceptor {
    registry: Arc<HiddenRegistry>,
    manager: HookManager,
    layout: TableLayout,
    sink: Arc<dyn LogSink>,
    closed: AtomicBool,
}

impl Interceptor {
    /// Starts building an interception layer
    #[must_use]
    pub fn builder() -> InterceptorBuilder {
        InterceptorBuilder::default()
    }

    /// Adds an identifier to the hidden set.
    ///
    /// See [`HiddenRegistry::hide`] for the outcome and diagnostic contract.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], [`Error::AlreadyHidden`],
    /// [`Error::AllocationError`], or [`Error::LockError`].
    pub fn hide(&self, pid: Pid) -> Result<()> {
        self.registry.hide(pid)
    }

    /// Removes an identifier from the hidden set.
    ///
    /// # Errors
    ///
    /// [`Error::NotHidden`] or [`Error::LockError`].
    pub fn unhide(&self, pid: Pid) -> Result<()> {
        self.registry.unhide(pid)
    }

    /// Returns true if the identifier is currently hidden
    #[must_use]
    pub fn is_hidden(&self, pid: Pid) -> bool {
        self.registry.is_hidden(pid)
    }

    /// The hidden identifiers in chain order, oldest first
    #[must_use]
    pub fn hidden_pids(&self) -> Vec<Pid> {
        self.registry.snapshot()
    }

    /// Number of currently hidden identifiers
    #[must_use]
    pub fn hidden_count(&self) -> usize {
        self.registry.len()
    }

    /// Installs a tap on an operation's slot.
    ///
    /// Builds the tap's forwarding shim against the handler the slot holds
    /// right now and swaps it in atomically. One failed-install diagnostic
    /// line is written on error.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInstalled`], [`Error::WriteProtected`], or
    /// [`Error::InvalidSlot`].
    pub fn install(&self, operation: Operation, tap: Tap) -> Result<()> {
        let slot = self.layout.slot(operation);
        let result = self
            .manager
            .install_with(slot, |original| tap.into_shim(self.manager.table(), original));

        if let Err(e) = &result {
            self.sink.log(
                Stream::Diagnostic,
                &format!("Hook install failed for {operation}: {e}."),
            );
        }
        result
    }

    /// Restores an operation's slot to its pre-install handler.
    ///
    /// Safe while calls are mid-flight through the tap; they complete
    /// through the shim they loaded. One failed-restore diagnostic line is
    /// written on error.
    ///
    /// # Errors
    ///
    /// [`Error::NotInstalled`] or [`Error::WriteProtected`].
    pub fn restore(&self, operation: Operation) -> Result<()> {
        let slot = self.layout.slot(operation);
        let result = self.manager.restore(slot);

        if let Err(e) = &result {
            self.sink.log(
                Stream::Diagnostic,
                &format!("Hook restore failed for {operation}: {e}."),
            );
        }
        result
    }

    /// Returns true if the operation's slot currently holds a managed tap
    #[must_use]
    pub fn is_installed(&self, operation: Operation) -> bool {
        self.manager.installed(self.layout.slot(operation))
    }

    /// Routes a call through the table, hooked or not.
    ///
    /// The slot is chosen by the context's operation. This is the host's
    /// dispatch boundary; whatever the slot currently designates runs on
    /// the calling thread.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSlot`] if the operation's slot lost its handler,
    /// which cannot happen through this crate's own transitions.
    pub fn invoke(&self, context: &CallContext) -> Result<isize> {
        self.manager
            .table()
            .dispatch(self.layout.slot(context.operation()), context)
    }

    /// The registry, for sharing with taps and host-side consumers
    #[must_use]
    pub fn registry(&self) -> &Arc<HiddenRegistry> {
        &self.registry
    }

    /// The dispatch table this layer manages
    #[must_use]
    pub fn table(&self) -> &Arc<DispatchTable> {
        self.manager.table()
    }

    /// The operation-to-slot layout resolved at build time
    #[must_use]
    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    /// Restores every installed hook, then drains the hidden set.
    ///
    /// Hooks first, so no tap consults a registry that is already gone.
    /// The first call does the work and writes a summary line; later calls
    /// (including the one from drop) are silent no-ops.
    ///
    /// # Errors
    ///
    /// The first failure encountered during the sweep; the sweep itself
    /// runs to completion either way.
    pub fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut first_err = None;

        let restored = match self.manager.restore_all() {
            Ok(count) => count,
            Err(e) => {
                first_err = Some(e);
                0
            }
        };

        let drained = match self.registry.clear() {
            Ok(count) => count,
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
                0
            }
        };

        let hooks = if restored == 1 { "hook" } else { "hooks" };
        let ids = if drained == 1 { "id" } else { "ids" };
        self.sink.log(
            Stream::Output,
            &format!(
                "Interception layer shut down ({restored} {hooks} restored, {drained} {ids} unhidden)."
            ),
        );

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Interceptor {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("hidden", &self.registry.len())
            .field("installed", &self.manager.installed_count())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

/// Builder for [`Interceptor`].
///
/// The dispatch table is the one required collaborator. Everything else has
/// a default: [`OpenResolver`] for id resolution, [`ConsoleSink`] for
/// diagnostics, the identity [`TableLayout`], and an unbounded registry.
///
/// Layout selection: an explicit [`InterceptorBuilder::layout`] wins over a
/// [`InterceptorBuilder::slot_resolver`]; with neither, the identity layout
/// is used. Whichever way the layout arrives, every operation must map to a
/// populated slot or [`InterceptorBuilder::build`] fails.
#[derive(Default)]
pub struct InterceptorBuilder {
    table: Option<Arc<DispatchTable>>,
    resolver: Option<Arc<dyn IdResolver>>,
    sink: Option<Arc<dyn LogSink>>,
    layout: Option<TableLayout>,
    slot_resolver: Option<Box<dyn SlotResolver>>,
    registry_capacity: Option<usize>,
}

impl InterceptorBuilder {
    /// Sets the dispatch table to manage (required)
    #[must_use]
    pub fn table(mut self, table: Arc<DispatchTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// Sets the host id resolver (default: [`OpenResolver`])
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn IdResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets the diagnostic sink (default: [`ConsoleSink`])
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Supplies a pre-resolved layout (default: identity)
    #[must_use]
    pub fn layout(mut self, layout: TableLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Supplies a resolver that maps operations to slots at build time
    #[must_use]
    pub fn slot_resolver(mut self, resolver: impl SlotResolver + 'static) -> Self {
        self.slot_resolver = Some(Box::new(resolver));
        self
    }

    /// Bounds the registry to at most `max_entries` hidden ids
    #[must_use]
    pub fn registry_capacity(mut self, max_entries: usize) -> Self {
        self.registry_capacity = Some(max_entries);
        self
    }

    /// Builds the interception layer.
    ///
    /// Resolves the layout against the table and creates the registry.
    /// Failures here are fatal by design: an `Interceptor` either comes up
    /// with every operation routable or not at all.
    ///
    /// # Errors
    ///
    /// - [`Error::Error`] - no dispatch table was provided
    /// - [`Error::SlotUnresolved`] - an operation has no populated slot
    /// - [`Error::AllocationError`] - the registry sentinel could not be
    ///   allocated
    pub fn build(self) -> Result<Interceptor> {
        let table = self
            .table
            .ok_or_else(|| Error::Error("Interceptor requires a dispatch table".to_string()))?;

        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(OpenResolver::new()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(ConsoleSink::new()));

        let layout = match (self.layout, self.slot_resolver) {
            (Some(layout), _) => {
                layout.verify(&table)?;
                layout
            }
            (None, Some(slot_resolver)) => TableLayout::resolve(slot_resolver.as_ref(), &table)?,
            (None, None) => {
                let layout = TableLayout::identity();
                layout.verify(&table)?;
                layout
            }
        };

        let registry = Arc::new(match self.registry_capacity {
            Some(max) => HiddenRegistry::with_capacity(resolver, Arc::clone(&sink), max)?,
            None => HiddenRegistry::new(resolver, Arc::clone(&sink))?,
        });

        Ok(Interceptor {
            registry,
            manager: HookManager::new(table),
            layout,
            sink,
            closed: AtomicBool::new(false),
        })
    }
}

impl fmt::Debug for InterceptorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorBuilder")
            .field("has_table", &self.table.is_some())
            .field("registry_capacity", &self.registry_capacity)
            .finish_non_exhaustive()
    }
}
