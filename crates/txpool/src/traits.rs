//! Contracts of the pool's external collaborators.

use crate::{error::PoolResult, transaction::TxSlot};
use alloy_primitives::{B256, B512};

/// Network identity of a peer.
pub type PeerId = B512;

/// Parses raw encoded transaction bytes into normalized records.
///
/// The pool invokes the parser during restart recovery; the collaborator
/// feeding `on_new_txs` uses the same contract for external submissions.
pub trait TransactionParser {
    /// Parses one transaction from `data` starting at `offset` into `slot`,
    /// recovering the sender address when `with_sender` is set.
    ///
    /// Returns the number of bytes consumed, or
    /// [`PoolError::Malformed`](crate::PoolError::Malformed) when the
    /// encoding is invalid.
    fn parse(
        &mut self,
        data: &[u8],
        offset: usize,
        slot: &mut TxSlot,
        with_sender: bool,
    ) -> PoolResult<usize>;
}

/// Sink for pooled-transaction hash announcements.
///
/// Implementations own the peer topology; the pool only decides what to
/// announce and to whom locality matters.
pub trait Broadcaster {
    /// Announces locally submitted transactions to all peers.
    fn broadcast_local_pooled_txs(&self, hashes: &[B256]);

    /// Announces remote transactions to a subset of peers.
    fn broadcast_remote_pooled_txs(&self, hashes: &[B256]);

    /// Syncs the given hashes to exactly the listed peers.
    fn propagate_pooled_txs_to_peers_list(&self, peers: &[PeerId], hashes: &[B256]);
}
