use std::fmt;
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{Error, Result};
use crate::table::{DispatchTable, HandlerRef, SlotIndex};

/// What the manager remembers about one installed slot.
struct SavedSlot {
    /// Designator the slot held before install; written back bit for bit on
    /// restore.
    original: HandlerRef,
    /// Designator the install stored.
    replacement: HandlerRef,
}

/// Install and restore of dispatch-table hooks.
///
/// The manager owns the saved-slot map: one record per slot currently holding
/// a managed replacement, keyed by slot index. Map occupancy is the installed
/// flag, so install/restore transitions and the bookkeeping they depend on
/// commit together.
///
/// Transitions on the same slot are serialized by the map's entry lock: while
/// one thread is mid-install on slot 3, a second install or restore of slot 3
/// waits, then observes the settled state. Transitions on different slots
/// proceed independently. The dispatch path is never involved; it keeps
/// reading slots lock-free while transitions happen.
///
/// Restore is safe while calls are in flight through the replacement: the
/// slot write only changes what later dispatches load, and handler cells are
/// never reclaimed, so an in-flight call completes through the handler it
/// loaded.
pub struct HookManager {
    table: Arc<DispatchTable>,
    saved: DashMap<SlotIndex, SavedSlot>,
}

impl HookManager {
    /// Creates a manager for the given table with nothing installed
    #[must_use]
    pub fn new(table: Arc<DispatchTable>) -> Self {
        HookManager {
            table,
            saved: DashMap::new(),
        }
    }

    /// Installs a replacement designator into a slot.
    ///
    /// Saves the slot's current designator, stores the replacement with a
    /// single guarded atomic write, and records the transition. At most one
    /// installation per slot: restoring is the only way back.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyInstalled`] - the slot already holds a managed
    ///   replacement; nothing changes
    /// - [`Error::InvalidSlot`] - the slot is vacant or out of range, or the
    ///   replacement is not a cell of this table
    /// - [`Error::WriteProtected`] - the table is sealed; nothing changes
    pub fn install(&self, slot: SlotIndex, replacement: HandlerRef) -> Result<()> {
        self.install_with(slot, |_original| Ok(replacement))
    }

    /// Installs a replacement built from the slot's current designator.
    ///
    /// `build` runs while the slot transition is locked and receives the
    /// designator the slot holds right now, so a forwarding shim constructed
    /// inside it captures exactly the handler it displaces; no install can
    /// slip in between the read and the write.
    ///
    /// # Errors
    ///
    /// As [`HookManager::install`], plus whatever `build` returns; a failed
    /// build leaves the slot and the saved-state map untouched.
    pub fn install_with(
        &self,
        slot: SlotIndex,
        build: impl FnOnce(HandlerRef) -> Result<HandlerRef>,
    ) -> Result<()> {
        match self.saved.entry(slot) {
            Entry::Occupied(_) => Err(Error::AlreadyInstalled(slot)),
            Entry::Vacant(vacancy) => {
                let original = self.table.entry(slot).ok_or(Error::InvalidSlot(slot))?;
                let replacement = build(original)?;

                let guard = self.table.unprotect()?;
                guard.write(slot, replacement)?;
                drop(guard);

                vacancy.insert(SavedSlot {
                    original,
                    replacement,
                });
                Ok(())
            }
        }
    }

    /// Restores a slot to the designator saved at install time.
    ///
    /// The original goes back with a single guarded atomic write and the
    /// record is dropped, so a later install starts a fresh cycle. Calls
    /// currently executing the replacement are unaffected.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInstalled`] - no managed replacement at this slot
    /// - [`Error::WriteProtected`] - the table is sealed; the record is kept
    pub fn restore(&self, slot: SlotIndex) -> Result<()> {
        match self.saved.entry(slot) {
            Entry::Vacant(_) => Err(Error::NotInstalled(slot)),
            Entry::Occupied(saved) => {
                let guard = self.table.unprotect()?;
                guard.write(slot, saved.get().original)?;
                drop(guard);

                saved.remove();
                Ok(())
            }
        }
    }

    /// Restores every installed slot, sweeping past individual failures.
    ///
    /// Returns how many slots were restored. If any restore failed, the
    /// first error is returned after the sweep finishes; slots that raced
    /// away (restored concurrently) are not failures.
    ///
    /// # Errors
    ///
    /// The first non-racing error encountered, typically
    /// [`Error::WriteProtected`].
    pub fn restore_all(&self) -> Result<usize> {
        let slots: Vec<SlotIndex> = self.saved.iter().map(|entry| *entry.key()).collect();

        let mut restored = 0usize;
        let mut first_err = None;
        for slot in slots {
            match self.restore(slot) {
                Ok(()) => restored += 1,
                Err(Error::NotInstalled(_)) => {}
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(restored),
        }
    }

    /// Returns true if the slot currently holds a managed replacement
    #[must_use]
    pub fn installed(&self, slot: SlotIndex) -> bool {
        self.saved.contains_key(&slot)
    }

    /// Number of slots currently holding managed replacements
    #[must_use]
    pub fn installed_count(&self) -> usize {
        self.saved.len()
    }

    /// The designator saved for a slot at install time, if installed
    #[must_use]
    pub fn original_of(&self, slot: SlotIndex) -> Option<HandlerRef> {
        self.saved.get(&slot).map(|saved| saved.original)
    }

    /// The table this manager writes to
    #[must_use]
    pub fn table(&self) -> &Arc<DispatchTable> {
        &self.table
    }
}

impl fmt::Debug for HookManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookManager")
            .field("installed", &self.saved.len())
            .finish_non_exhaustive()
    }
}
