use crate::{
    identifier::{SenderId, TransactionId},
    pool::meta::MetaTxId,
};
use std::collections::BTreeMap;

/// Ordered index over all resident transactions, keyed by
/// `(sender-id, nonce)`.
///
/// Membership here equals membership in the pool's identity-hash map; the
/// pool keeps the two in sync on every insert and discard.
#[derive(Debug, Default)]
pub(crate) struct ByNonce {
    txs: BTreeMap<TransactionId, MetaTxId>,
}

// === impl ByNonce ===

impl ByNonce {
    /// Returns the resident transaction with the given identifier.
    pub(crate) fn get(&self, id: TransactionId) -> Option<MetaTxId> {
        self.txs.get(&id).copied()
    }

    /// Indexes a transaction, returning a displaced entry if one existed.
    pub(crate) fn insert(&mut self, id: TransactionId, meta: MetaTxId) -> Option<MetaTxId> {
        self.txs.insert(id, meta)
    }

    /// Drops a transaction from the index.
    pub(crate) fn remove(&mut self, id: TransactionId) -> Option<MetaTxId> {
        self.txs.remove(&id)
    }

    /// Total number of indexed transactions.
    pub(crate) fn len(&self) -> usize {
        self.txs.len()
    }

    /// All of `sender`'s resident transactions in ascending nonce order.
    pub(crate) fn ascend(&self, sender: SenderId) -> impl Iterator<Item = MetaTxId> + '_ {
        self.txs
            .range(TransactionId::first_for_sender(sender)..)
            .take_while(move |(id, _)| id.sender == sender)
            .map(|(_, meta)| *meta)
    }

    /// Number of resident transactions of `sender`.
    pub(crate) fn count(&self, sender: SenderId) -> usize {
        self.ascend(sender).count()
    }

    /// Iterates over all `(identifier, handle)` pairs in key order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (TransactionId, MetaTxId)> + '_ {
        self.txs.iter().map(|(id, meta)| (*id, *meta))
    }
}
