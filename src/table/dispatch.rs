use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{Error, Result};

use super::context::CallContext;
use super::operation::SlotIndex;

/// Shared function type for table handlers.
///
/// Handlers receive the call context by reference and return the operation's
/// result word. They must be callable from any thread at any time.
pub type HandlerFn = Arc<dyn Fn(&CallContext) -> isize + Send + Sync>;

/// Slot value marking "no handler installed".
const VACANT: usize = usize::MAX;

/// Designator for a handler registered with a [`DispatchTable`].
///
/// A `HandlerRef` is the value a table slot actually stores: a plain index
/// into the table's handler cells, small enough for a single aligned atomic
/// store. Refs are minted by [`DispatchTable::register`] and stay valid for
/// the life of their table; they are meaningless in any other table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRef(usize);

impl HandlerRef {
    /// The raw cell index this designator carries
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One registered handler: its diagnostic name and the function itself.
struct HandlerCell {
    name: String,
    func: HandlerFn,
}

/// An indexed array of handler designators with atomic entry updates.
///
/// The table separates two lifetimes on purpose. Slots are mutable: a single
/// aligned atomic store swaps the designator a slot holds, so readers racing
/// a swap observe either the old or the new designator and never a torn
/// value. Handler cells are immortal: they live in an append-only arena that
/// nothing removes from until the table is dropped. A call that loaded a
/// designator before a swap therefore always completes through the handler
/// it loaded, which is what makes restoring a hook safe while calls are
/// mid-flight.
///
/// Writes to slots additionally require relaxing the table's write
/// protection through [`DispatchTable::unprotect`]; the returned guard
/// re-arms protection when it drops, on success and error paths alike. A
/// table built with [`DispatchTableBuilder::sealed`] never grants a guard.
///
/// # Examples
///
/// ```rust
/// use veiltap::table::{CallContext, DispatchTable, Operation};
/// use veiltap::Pid;
///
/// let table = DispatchTable::builder(1)
///     .handler(0, "recv", |_ctx| 42)
///     .build()?;
///
/// let ctx = CallContext::new(Operation::RecvMessage, Pid(7));
/// assert_eq!(table.dispatch(0, &ctx)?, 42);
/// # Ok::<(), veiltap::Error>(())
/// ```
///
/// # Thread Safety
///
/// Dispatch is lock-free: one Acquire load plus an index into the cell
/// arena. Slot writes are Release stores under the write guard. The table
/// may be shared freely behind an `Arc`.
pub struct DispatchTable {
    /// Slot array; each slot holds a cell index or [`VACANT`].
    slots: Box<[AtomicUsize]>,
    /// Append-only handler arena; cell indices are what slots store.
    cells: boxcar::Vec<HandlerCell>,
    /// Sealed tables never relax write protection.
    sealed: bool,
    /// Count of live write guards.
    writers: AtomicUsize,
}

impl DispatchTable {
    /// Starts building a table with `slot_count` slots
    #[must_use]
    pub fn builder(slot_count: usize) -> DispatchTableBuilder {
        DispatchTableBuilder {
            slot_count,
            sealed: false,
            handlers: Vec::new(),
        }
    }

    /// Registers a handler cell, returning its designator.
    ///
    /// Registration never touches a slot; pointing a slot at the new cell is
    /// a separate, guarded write. Cells are append-only and survive until
    /// the table drops.
    pub fn register(
        &self,
        name: &str,
        handler: impl Fn(&CallContext) -> isize + Send + Sync + 'static,
    ) -> HandlerRef {
        self.register_cell(name.to_string(), Arc::new(handler))
    }

    /// Registers an already-shared handler function under a name.
    pub fn register_fn(&self, name: &str, handler: HandlerFn) -> HandlerRef {
        self.register_cell(name.to_string(), handler)
    }

    fn register_cell(&self, name: String, func: HandlerFn) -> HandlerRef {
        let index = self.cells.push(HandlerCell { name, func });
        HandlerRef(index)
    }

    /// Reads the designator a slot currently holds.
    ///
    /// Returns `None` for vacant and out-of-range slots. This is the load
    /// the dispatch path uses; it never blocks.
    #[must_use]
    pub fn entry(&self, slot: SlotIndex) -> Option<HandlerRef> {
        let raw = self.slots.get(slot)?.load(Ordering::Acquire);
        if raw == VACANT {
            None
        } else {
            Some(HandlerRef(raw))
        }
    }

    /// Relaxes write protection for the lifetime of the returned guard.
    ///
    /// Protection re-arms when the guard drops, whether the write succeeded
    /// or not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriteProtected`] if the table was built sealed.
    pub fn unprotect(&self) -> Result<WriteGuard<'_>> {
        if self.sealed {
            return Err(Error::WriteProtected);
        }

        self.writers.fetch_add(1, Ordering::AcqRel);
        Ok(WriteGuard { table: self })
    }

    /// Returns true if at least one write guard is currently live
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writers.load(Ordering::Acquire) > 0
    }

    /// Returns true if the table was built sealed
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Routes a call through the handler a slot currently designates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSlot`] for vacant and out-of-range slots.
    pub fn dispatch(&self, slot: SlotIndex, context: &CallContext) -> Result<isize> {
        let handler = self.entry(slot).ok_or(Error::InvalidSlot(slot))?;
        self.call(handler, context)
    }

    /// Invokes a handler cell directly, bypassing the slot array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSlot`] if the designator does not name a cell
    /// of this table.
    pub fn call(&self, handler: HandlerRef, context: &CallContext) -> Result<isize> {
        let cell = self
            .cells
            .get(handler.index())
            .ok_or(Error::InvalidSlot(handler.index()))?;
        Ok((cell.func)(context))
    }

    /// Clones out the function behind a designator.
    ///
    /// This is how a forwarding shim captures the handler it displaces: the
    /// clone shares the immortal cell, so the capture stays callable no
    /// matter what later happens to the slot.
    #[must_use]
    pub fn handler_fn(&self, handler: HandlerRef) -> Option<HandlerFn> {
        self.cells
            .get(handler.index())
            .map(|cell| Arc::clone(&cell.func))
    }

    /// The diagnostic name a designator was registered under
    #[must_use]
    pub fn handler_name(&self, handler: HandlerRef) -> Option<&str> {
        self.cells.get(handler.index()).map(|cell| cell.name.as_str())
    }

    /// Number of slots in the table
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("slots", &self.slots.len())
            .field("cells", &self.cells.count())
            .field("sealed", &self.sealed)
            .finish()
    }
}

/// Scoped relaxation of a table's write protection.
///
/// Holding the guard is the only way to store into a slot. Dropping it
/// re-arms protection; the guard cannot outlive its table.
pub struct WriteGuard<'a> {
    table: &'a DispatchTable,
}

impl WriteGuard<'_> {
    /// Stores a designator into a slot with a single aligned atomic write.
    ///
    /// Concurrent dispatches observe either the previous or the new
    /// designator, never a mixture.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSlot`] if the slot is out of range or the
    /// designator does not name a cell of this table; the slot keeps its
    /// previous value.
    pub fn write(&self, slot: SlotIndex, handler: HandlerRef) -> Result<()> {
        if self.table.cells.get(handler.index()).is_none() {
            return Err(Error::InvalidSlot(handler.index()));
        }
        let entry = self
            .table
            .slots
            .get(slot)
            .ok_or(Error::InvalidSlot(slot))?;
        entry.store(handler.index(), Ordering::Release);
        Ok(())
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.table.writers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Builder for [`DispatchTable`].
///
/// Populates the original handlers and decides the protection posture before
/// the table ever becomes shared; construction-time stores need no guard.
pub struct DispatchTableBuilder {
    slot_count: usize,
    sealed: bool,
    handlers: Vec<(SlotIndex, String, HandlerFn)>,
}

impl DispatchTableBuilder {
    /// Places a handler in a slot.
    ///
    /// # Arguments
    ///
    /// * `slot` - Slot to populate; must be below the slot count and not
    ///   already populated
    /// * `name` - Diagnostic name for the handler
    /// * `handler` - The handler function itself
    #[must_use]
    pub fn handler(
        mut self,
        slot: SlotIndex,
        name: &str,
        handler: impl Fn(&CallContext) -> isize + Send + Sync + 'static,
    ) -> Self {
        self.handlers.push((slot, name.to_string(), Arc::new(handler)));
        self
    }

    /// Marks the table as sealed: write protection can never be relaxed.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    /// Builds the table.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidSlot`] - a handler names a slot outside the table
    /// - [`Error::Error`] - a slot was populated twice
    pub fn build(self) -> Result<DispatchTable> {
        let slots: Box<[AtomicUsize]> = (0..self.slot_count)
            .map(|_| AtomicUsize::new(VACANT))
            .collect();

        let table = DispatchTable {
            slots,
            cells: boxcar::Vec::new(),
            sealed: self.sealed,
            writers: AtomicUsize::new(0),
        };

        for (slot, name, func) in self.handlers {
            let entry = table.slots.get(slot).ok_or(Error::InvalidSlot(slot))?;
            if entry.load(Ordering::Relaxed) != VACANT {
                return Err(Error::Error(format!("Dispatch slot {slot} populated twice")));
            }
            let handler = table.register_cell(name, func);
            entry.store(handler.index(), Ordering::Release);
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::Pid;
    use crate::table::Operation;

    fn ctx() -> CallContext {
        CallContext::new(Operation::RecvMessage, Pid(1))
    }

    fn two_slot_table() -> DispatchTable {
        DispatchTable::builder(2)
            .handler(0, "orig-zero", |_| 100)
            .handler(1, "orig-one", |_| 101)
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_and_dispatch() {
        let table = two_slot_table();
        assert_eq!(table.slot_count(), 2);
        assert_eq!(table.dispatch(0, &ctx()).unwrap(), 100);
        assert_eq!(table.dispatch(1, &ctx()).unwrap(), 101);
    }

    #[test]
    fn test_entry_reports_occupancy() {
        let table = DispatchTable::builder(2)
            .handler(0, "only", |_| 0)
            .build()
            .unwrap();

        let handler = table.entry(0).unwrap();
        assert_eq!(table.handler_name(handler), Some("only"));
        assert!(table.entry(1).is_none());
        assert!(table.entry(99).is_none());
    }

    #[test]
    fn test_dispatch_vacant_slot_fails() {
        let table = DispatchTable::builder(2)
            .handler(0, "only", |_| 0)
            .build()
            .unwrap();

        assert!(matches!(
            table.dispatch(1, &ctx()),
            Err(Error::InvalidSlot(1))
        ));
        assert!(matches!(
            table.dispatch(7, &ctx()),
            Err(Error::InvalidSlot(7))
        ));
    }

    #[test]
    fn test_build_rejects_out_of_range_slot() {
        let err = DispatchTable::builder(1)
            .handler(3, "oob", |_| 0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSlot(3)));
    }

    #[test]
    fn test_build_rejects_duplicate_slot() {
        let err = DispatchTable::builder(1)
            .handler(0, "first", |_| 0)
            .handler(0, "second", |_| 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Error(_)));
    }

    #[test]
    fn test_guarded_write_swaps_dispatch_target() {
        let table = two_slot_table();
        let replacement = table.register("replacement", |_| 200);

        {
            let guard = table.unprotect().unwrap();
            guard.write(0, replacement).unwrap();
        }

        assert_eq!(table.dispatch(0, &ctx()).unwrap(), 200);
        assert_eq!(table.entry(0).unwrap(), replacement);
        // The untouched slot still routes to its original.
        assert_eq!(table.dispatch(1, &ctx()).unwrap(), 101);
    }

    #[test]
    fn test_write_protection_rearms_on_drop() {
        let table = two_slot_table();
        assert!(!table.is_writable());

        {
            let _guard = table.unprotect().unwrap();
            assert!(table.is_writable());
        }
        assert!(!table.is_writable());
    }

    #[test]
    fn test_write_protection_rearms_after_failed_write() {
        let table = two_slot_table();
        let replacement = table.register("replacement", |_| 200);

        {
            let guard = table.unprotect().unwrap();
            assert!(matches!(
                guard.write(9, replacement),
                Err(Error::InvalidSlot(9))
            ));
        }

        assert!(!table.is_writable());
        assert_eq!(table.dispatch(0, &ctx()).unwrap(), 100);
    }

    #[test]
    fn test_sealed_table_never_unprotects() {
        let table = DispatchTable::builder(1)
            .handler(0, "only", |_| 7)
            .sealed()
            .build()
            .unwrap();

        assert!(table.is_sealed());
        assert!(matches!(table.unprotect(), Err(Error::WriteProtected)));
        assert!(!table.is_writable());
        // Dispatch is unaffected by the protection posture.
        assert_eq!(table.dispatch(0, &ctx()).unwrap(), 7);
    }

    #[test]
    fn test_foreign_handler_ref_rejected() {
        let table_a = DispatchTable::builder(1)
            .handler(0, "a", |_| 0)
            .build()
            .unwrap();
        let table_b = two_slot_table();

        // table_b has two cells, so its second designator indexes past
        // table_a's single cell.
        let foreign = table_b.entry(1).unwrap();
        let guard = table_a.unprotect().unwrap();
        assert!(matches!(
            guard.write(0, foreign),
            Err(Error::InvalidSlot(_))
        ));
    }

    #[test]
    fn test_call_by_ref_survives_slot_rewrite() {
        let table = two_slot_table();
        let original = table.entry(0).unwrap();
        let replacement = table.register("replacement", |_| 200);

        {
            let guard = table.unprotect().unwrap();
            guard.write(0, replacement).unwrap();
        }

        // The displaced cell is still directly callable.
        assert_eq!(table.call(original, &ctx()).unwrap(), 100);
        assert_eq!(table.dispatch(0, &ctx()).unwrap(), 200);
    }

    #[test]
    fn test_handler_fn_clones_cell() {
        let table = two_slot_table();
        let original = table.entry(0).unwrap();
        let func = table.handler_fn(original).unwrap();

        let replacement = table.register("replacement", |_| 200);
        {
            let guard = table.unprotect().unwrap();
            guard.write(0, replacement).unwrap();
        }

        assert_eq!(func(&ctx()), 100);
    }

    #[test]
    fn test_nested_guards_count_writers() {
        let table = two_slot_table();
        let g1 = table.unprotect().unwrap();
        let g2 = table.unprotect().unwrap();

        assert!(table.is_writable());
        drop(g1);
        assert!(table.is_writable());
        drop(g2);
        assert!(!table.is_writable());
    }
}
