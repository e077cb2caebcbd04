//! Arena-backed singly linked chain of hidden identifiers.
//!
//! The chain is the registry's storage: a sentinel head at arena index 0,
//! one node per hidden identifier linked in insertion order, and a tail
//! index for O(1) append. Unlinked nodes go on an intrusive free list
//! (reusing the `next` field) and are recycled by later insertions, so a
//! hide/unhide workload settles into a fixed arena footprint.
//!
//! The chain itself is not synchronized; [`super::HiddenRegistry`] wraps it
//! in the registry lock and upholds the invariant that no partially linked
//! node is ever visible outside a write critical section.

use crate::{Error, Result};
use crate::pid::Pid;

/// One arena slot: a chain node or a free-list link.
///
/// Free nodes carry the sentinel id and use `next` as the free-list link, so
/// a stale identifier can never be read out of a recycled slot.
#[derive(Debug, Clone, Copy)]
struct Node {
    id: Pid,
    next: Option<usize>,
}

/// Sentinel-headed chain in a growable node arena.
pub(crate) struct Chain {
    /// Node storage; index 0 is the sentinel and lives for the whole chain.
    nodes: Vec<Node>,
    /// Head of the intrusive free list of recycled node indices.
    free_head: Option<usize>,
    /// Index of the last linked node; the sentinel when the chain is empty.
    tail: usize,
    /// Number of linked entries, excluding the sentinel.
    len: usize,
    /// Upper bound on linked entries, when configured.
    max_entries: Option<usize>,
}

impl Chain {
    /// Creates an empty chain, allocating only the sentinel node.
    pub(crate) fn new(max_entries: Option<usize>) -> Result<Chain> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve(1)
            .map_err(|e| Error::AllocationError(e.to_string()))?;
        nodes.push(Node {
            id: Pid::SENTINEL,
            next: None,
        });

        Ok(Chain {
            nodes,
            free_head: None,
            tail: 0,
            len: 0,
            max_entries,
        })
    }

    /// Appends an identifier at the tail.
    ///
    /// The caller has already established that `id` is not in the chain.
    /// Fails with [`Error::AllocationError`] when the arena cannot grow or
    /// the configured capacity is reached; the chain is unchanged on failure.
    pub(crate) fn push(&mut self, id: Pid) -> Result<()> {
        let idx = self.acquire_node(id)?;
        self.nodes[self.tail].next = Some(idx);
        self.tail = idx;
        self.len += 1;
        Ok(())
    }

    /// Unlinks the node carrying `id`, returning false when absent.
    ///
    /// Walks from the sentinel tracking the predecessor, relinks around the
    /// victim, pulls the tail back when the victim was last, and recycles
    /// the node.
    pub(crate) fn remove(&mut self, id: Pid) -> bool {
        let mut prev = 0usize;
        let mut cursor = self.nodes[0].next;

        while let Some(idx) = cursor {
            if self.nodes[idx].id == id {
                self.nodes[prev].next = self.nodes[idx].next;
                if self.tail == idx {
                    self.tail = prev;
                }
                self.release_node(idx);
                self.len -= 1;
                return true;
            }
            prev = idx;
            cursor = self.nodes[idx].next;
        }

        false
    }

    /// Returns true if `id` occupies a linked node.
    pub(crate) fn contains(&self, id: Pid) -> bool {
        self.iter().any(|entry| entry == id)
    }

    /// Iterates linked identifiers in insertion order.
    pub(crate) fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            chain: self,
            cursor: self.nodes[0].next,
        }
    }

    /// Number of linked entries, excluding the sentinel.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns true if only the sentinel remains.
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every linked node, returning how many were drained.
    ///
    /// The sentinel survives and the chain is immediately reusable.
    pub(crate) fn clear(&mut self) -> usize {
        let drained = self.len;
        self.nodes.truncate(1);
        self.nodes[0].next = None;
        self.free_head = None;
        self.tail = 0;
        self.len = 0;
        drained
    }

    fn acquire_node(&mut self, id: Pid) -> Result<usize> {
        if let Some(max) = self.max_entries {
            if self.len >= max {
                let entries = if max == 1 { "entry" } else { "entries" };
                return Err(Error::AllocationError(format!(
                    "registry at capacity ({max} {entries})"
                )));
            }
        }

        if let Some(idx) = self.free_head {
            self.free_head = self.nodes[idx].next;
            self.nodes[idx] = Node { id, next: None };
            return Ok(idx);
        }

        self.nodes
            .try_reserve(1)
            .map_err(|e| Error::AllocationError(e.to_string()))?;
        self.nodes.push(Node { id, next: None });
        Ok(self.nodes.len() - 1)
    }

    fn release_node(&mut self, idx: usize) {
        self.nodes[idx] = Node {
            id: Pid::SENTINEL,
            next: self.free_head,
        };
        self.free_head = Some(idx);
    }

    /// Structural check used by tests: the walk from the sentinel visits
    /// exactly `len` distinct non-sentinel ids and ends at `tail`.
    #[cfg(test)]
    pub(crate) fn integrity_ok(&self) -> bool {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        let mut count = 0usize;
        let mut last = 0usize;
        let mut cursor = self.nodes[0].next;

        while let Some(idx) = cursor {
            if count >= self.len.saturating_add(1) {
                return false;
            }
            let node = &self.nodes[idx];
            if node.id.is_sentinel() || !seen.insert(node.id) {
                return false;
            }
            count += 1;
            last = idx;
            cursor = node.next;
        }

        count == self.len && last == self.tail
    }

    /// Arena footprint in nodes, including the sentinel and free slots.
    #[cfg(test)]
    pub(crate) fn arena_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Iterator over linked identifiers, oldest first.
pub(crate) struct ChainIter<'a> {
    chain: &'a Chain,
    cursor: Option<usize>,
}

impl Iterator for ChainIter<'_> {
    type Item = Pid;

    fn next(&mut self) -> Option<Pid> {
        let idx = self.cursor?;
        let node = &self.chain.nodes[idx];
        self.cursor = node.next;
        Some(node.id)
    }
}
