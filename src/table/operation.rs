use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

use crate::{Error, Result};

use super::dispatch::DispatchTable;

/// Index of a slot in the dispatch table.
pub type SlotIndex = usize;

/// The host operations the interception layer knows how to intercept.
///
/// Each operation names one dispatch-table slot semantics-wise; the actual
/// slot index comes from the [`TableLayout`] resolved at startup. The set is
/// closed: adding an operation is an API change, never a runtime discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum Operation {
    /// Message receive path. The busiest interception point; taps on this
    /// operation must stay cheap.
    RecvMessage = 0,

    /// Message send path.
    SendMessage = 1,

    /// Process enumeration. Consumers filtering enumeration output against
    /// the hidden set tap here.
    EnumProcesses = 2,

    /// Process exit notification. Carries the exiting identifier as the
    /// caller, which is what lets the registry drop dead entries.
    ExitNotify = 3,
}

impl Operation {
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Maps operations to dispatch-table slots.
///
/// Consumed once during construction by [`TableLayout::resolve`]; failures
/// there are fatal, so a resolver is never consulted mid-operation.
///
/// Any `Fn(Operation) -> Option<SlotIndex>` closure is a resolver.
pub trait SlotResolver {
    /// Returns the slot holding the operation's handler, or `None` if the
    /// operation cannot be located in this table
    fn slot_for(&self, operation: Operation) -> Option<SlotIndex>;
}

impl<F> SlotResolver for F
where
    F: Fn(Operation) -> Option<SlotIndex> + Send + Sync,
{
    fn slot_for(&self, operation: Operation) -> Option<SlotIndex> {
        self(operation)
    }
}

/// Resolved mapping from every [`Operation`] to its table slot.
///
/// A layout is complete by construction: resolution visits every operation
/// and fails fast on the first gap, so holders of a `TableLayout` can index
/// it infallibly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    slots: [SlotIndex; Operation::COUNT],
}

impl TableLayout {
    /// The identity layout: each operation lives at its own discriminant.
    #[must_use]
    pub fn identity() -> Self {
        let mut slots = [0; Operation::COUNT];
        for (index, slot) in slots.iter_mut().enumerate() {
            *slot = index;
        }
        TableLayout { slots }
    }

    /// Resolves a layout against a live table.
    ///
    /// Every operation must resolve to a slot that exists in `table` and
    /// already holds a handler. The first gap aborts resolution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SlotUnresolved`] naming the first operation that
    /// failed to resolve or resolved to a vacant slot.
    pub fn resolve(resolver: &dyn SlotResolver, table: &DispatchTable) -> Result<Self> {
        let mut slots = [0; Operation::COUNT];
        for operation in Operation::iter() {
            let slot = resolver
                .slot_for(operation)
                .ok_or(Error::SlotUnresolved(operation))?;
            if table.entry(slot).is_none() {
                return Err(Error::SlotUnresolved(operation));
            }
            slots[operation.index()] = slot;
        }

        Ok(TableLayout { slots })
    }

    /// Checks that every mapped slot still holds a handler in `table`.
    ///
    /// Used when a pre-built layout is supplied instead of a resolver.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SlotUnresolved`] for the first operation whose slot
    /// is out of range or vacant.
    pub fn verify(&self, table: &DispatchTable) -> Result<()> {
        for operation in Operation::iter() {
            if table.entry(self.slot(operation)).is_none() {
                return Err(Error::SlotUnresolved(operation));
            }
        }
        Ok(())
    }

    /// The slot an operation dispatches through
    #[must_use]
    pub fn slot(&self, operation: Operation) -> SlotIndex {
        self.slots[operation.index()]
    }
}

impl Default for TableLayout {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DispatchTable;

    fn four_slot_table() -> DispatchTable {
        let mut builder = DispatchTable::builder(Operation::COUNT);
        for operation in Operation::iter() {
            builder = builder.handler(operation.index(), &format!("orig-{operation}"), move |_| {
                operation.index() as isize
            });
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_operation_display_names() {
        assert_eq!(Operation::RecvMessage.to_string(), "RecvMessage");
        assert_eq!(Operation::ExitNotify.to_string(), "ExitNotify");
    }

    #[test]
    fn test_operation_count_covers_all() {
        assert_eq!(Operation::iter().count(), Operation::COUNT);
        assert_eq!(Operation::COUNT, 4);
    }

    #[test]
    fn test_identity_layout() {
        let layout = TableLayout::identity();
        for operation in Operation::iter() {
            assert_eq!(layout.slot(operation), operation.index());
        }
    }

    #[test]
    fn test_resolve_identity_against_populated_table() {
        let table = four_slot_table();
        let layout = TableLayout::resolve(&|op: Operation| Some(op.index()), &table).unwrap();
        assert_eq!(layout, TableLayout::identity());
    }

    #[test]
    fn test_resolve_fails_on_unmapped_operation() {
        let table = four_slot_table();
        let resolver = |op: Operation| {
            if op == Operation::ExitNotify {
                None
            } else {
                Some(op.index())
            }
        };

        let err = TableLayout::resolve(&resolver, &table).unwrap_err();
        assert!(matches!(err, Error::SlotUnresolved(Operation::ExitNotify)));
    }

    #[test]
    fn test_resolve_fails_on_vacant_slot() {
        // Slot 5 exists nowhere in a four slot table.
        let table = four_slot_table();
        let err =
            TableLayout::resolve(&|_op: Operation| Some(5), &table).unwrap_err();
        assert!(matches!(err, Error::SlotUnresolved(Operation::RecvMessage)));
    }

    #[test]
    fn test_verify_prebuilt_layout() {
        let table = four_slot_table();
        assert!(TableLayout::identity().verify(&table).is_ok());

        let small = DispatchTable::builder(1)
            .handler(0, "only", |_| 0)
            .build()
            .unwrap();
        let err = TableLayout::identity().verify(&small).unwrap_err();
        assert!(matches!(err, Error::SlotUnresolved(_)));
    }
}
