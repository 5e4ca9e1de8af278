/*!
Index slots: the fixed-capacity buffers Stage 1 ([`crate::stage1`]) and
Stage 2 ([`crate::tape`]) hand structural offsets through (spec §3.4).

Each slot holds up to [`IndexSlot::CAPACITY`] 32-bit deltas between
successive structural byte offsets. Slots are pool-allocated and returned to
the pool once Stage 2 has drained them, so a long-running parser that reuses
a [`crate::ParsedDocument`] across many documents doesn't keep reallocating.
*/

/// Number of deltas a single index slot can hold before it must be
/// published and a fresh one taken.
pub(crate) const SLOT_CAPACITY: usize = 512;

/// A fixed-capacity buffer of structural-offset deltas (spec §3.4).
#[derive(Debug, Clone)]
pub(crate) struct IndexSlot {
    deltas: Vec<u32>,
}

impl IndexSlot {
    #[inline]
    fn new() -> Self {
        IndexSlot {
            deltas: Vec::with_capacity(SLOT_CAPACITY),
        }
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.deltas.len() >= SLOT_CAPACITY
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    #[inline]
    pub(crate) fn push(&mut self, delta: u32) {
        test_assert!(!self.is_full());
        self.deltas.push(delta);
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u32] {
        &self.deltas
    }

    #[inline]
    fn clear(&mut self) {
        self.deltas.clear();
    }
}

/// A pool of reusable [`IndexSlot`]s, tied to one [`crate::ParsedDocument`]'s
/// allocations (spec §3.5).
#[derive(Debug, Default)]
pub(crate) struct SlotPool {
    free: Vec<IndexSlot>,
}

impl SlotPool {
    #[inline]
    pub(crate) fn take(&mut self) -> IndexSlot {
        self.free.pop().unwrap_or_else(IndexSlot::new)
    }

    #[inline]
    pub(crate) fn recycle(&mut self, mut slot: IndexSlot) {
        slot.clear();
        self.free.push(slot);
    }
}
