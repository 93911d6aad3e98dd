use crate::{
    identifier::TransactionId,
    pool::state::{SubPoolMarker, SubPoolType},
    transaction::TxSlot,
};
use std::{
    cmp::Ordering,
    ops::{Index, IndexMut},
};

/// Handle to a resident transaction inside the pool's [`Arena`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) struct MetaTxId(usize);

/// Pool-owned wrapper around exactly one transaction.
///
/// The by-nonce index and the sub-pool heaps refer to the record through its
/// [`MetaTxId`]; the record itself carries its positions in the two heaps of
/// its current sub-pool (`-1` when absent) so it can be located in O(1).
#[derive(Debug)]
pub(crate) struct MetaTx {
    /// The wrapped transaction.
    pub(crate) tx: TxSlot,
    /// Eligibility bitset, recomputed whenever the sender's state changes.
    pub(crate) marker: SubPoolMarker,
    /// Miner tip the transaction would pay at the current pending base fee,
    /// clamped by upstream nonce-neighbors.
    pub(crate) effective_tip: u64,
    /// Sub-pool the record currently resides in.
    pub(crate) current: Option<SubPoolType>,
    /// Position in the best heap of the current sub-pool.
    pub(crate) best_index: isize,
    /// Position in the worst heap of the current sub-pool.
    pub(crate) worst_index: isize,
}

// === impl MetaTx ===

impl MetaTx {
    /// Wraps a parsed transaction, marking it local when requested.
    pub(crate) fn new(tx: TxSlot, is_local: bool) -> Self {
        let marker =
            if is_local { SubPoolMarker::IS_LOCAL } else { SubPoolMarker::empty() };
        Self { tx, marker, effective_tip: 0, current: None, best_index: -1, worst_index: -1 }
    }

    /// The `(sender-id, nonce)` identifier of the wrapped transaction.
    pub(crate) fn id(&self) -> TransactionId {
        self.tx.transaction_id()
    }

    /// Priority order: higher marker wins, then higher effective tip, then
    /// lower nonce; otherwise equal.
    pub(crate) fn prefer(&self, other: &Self) -> Ordering {
        self.marker
            .bits()
            .cmp(&other.marker.bits())
            .then(self.effective_tip.cmp(&other.effective_tip))
            .then(other.tx.nonce.cmp(&self.tx.nonce))
    }
}

/// Owner of every resident [`MetaTx`].
///
/// Freed slots are recycled, but a handle is only ever reused after the
/// previous record was removed from every index, so a live [`MetaTxId`]
/// always refers to the record it was created for.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: Vec<Option<MetaTx>>,
    free: Vec<usize>,
}

// === impl Arena ===

impl Arena {
    /// Stores a record and returns its handle.
    pub(crate) fn insert(&mut self, meta: MetaTx) -> MetaTxId {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(meta);
                MetaTxId(idx)
            }
            None => {
                self.slots.push(Some(meta));
                MetaTxId(self.slots.len() - 1)
            }
        }
    }

    /// Removes a record, invalidating its handle.
    pub(crate) fn remove(&mut self, id: MetaTxId) -> MetaTx {
        let meta = self.slots[id.0].take().expect("stale meta tx handle");
        self.free.push(id.0);
        meta
    }

    /// Number of resident records.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl Index<MetaTxId> for Arena {
    type Output = MetaTx;

    fn index(&self, id: MetaTxId) -> &Self::Output {
        self.slots[id.0].as_ref().expect("stale meta tx handle")
    }
}

impl IndexMut<MetaTxId> for Arena {
    fn index_mut(&mut self, id: MetaTxId) -> &mut Self::Output {
        self.slots[id.0].as_mut().expect("stale meta tx handle")
    }
}
