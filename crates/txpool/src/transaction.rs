use crate::{
    error::{PoolError, PoolResult},
    identifier::{SenderId, TransactionId},
};
use alloy_primitives::{Address, Bytes, B256, U256};

/// The normalized form of a signed transaction, immutable after parsing.
///
/// `sender_id` is the only field written after parsing: it is filled in
/// during intake once the sender cache has resolved (or allocated) the dense
/// id for `sender`. The raw encoded bytes are kept until the record has been
/// durably written, then dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxSlot {
    /// Keccak hash of the raw encoded bytes, globally unique.
    pub id_hash: B256,
    /// Recovered sender address.
    pub sender: Address,
    /// Dense id of `sender`, assigned during intake.
    pub sender_id: SenderId,
    /// Transaction nonce.
    pub nonce: u64,
    /// Gas limit of the transaction.
    pub gas_limit: u64,
    /// Maximum total fee per gas the sender is willing to pay.
    pub fee_cap: u64,
    /// Maximum miner tip per gas.
    pub tip: u64,
    /// Transferred value in wei.
    pub value: U256,
    /// Raw encoded bytes, present until durably written.
    pub rlp: Option<Bytes>,
}

// === impl TxSlot ===

impl TxSlot {
    /// The `(sender-id, nonce)` identifier of this transaction.
    pub fn transaction_id(&self) -> TransactionId {
        TransactionId::new(self.sender_id, self.nonce)
    }
}

/// A batch of parsed transactions with per-transaction locality flags.
#[derive(Debug, Clone, Default)]
pub struct TxSlots {
    /// The parsed transactions.
    pub txs: Vec<TxSlot>,
    /// Whether the transaction at the same position was locally submitted.
    pub is_local: Vec<bool>,
}

// === impl TxSlots ===

impl TxSlots {
    /// Appends a transaction with its locality flag.
    pub fn push(&mut self, slot: TxSlot, is_local: bool) {
        self.txs.push(slot);
        self.is_local.push(is_local);
    }

    /// Number of transactions in the batch.
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Iterates over `(transaction, is_local)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&TxSlot, bool)> + '_ {
        self.txs.iter().zip(self.is_local.iter().copied())
    }

    /// Intake validation: parallel vectors must line up and every sender id
    /// must be resolved.
    pub fn valid(&self) -> PoolResult<()> {
        if self.txs.len() != self.is_local.len() {
            return Err(PoolError::Intake("locality flags out of sync with batch"))
        }
        if self.txs.iter().any(|tx| tx.sender_id.is_unassigned()) {
            return Err(PoolError::Intake("sender id can't be zero"))
        }
        Ok(())
    }
}
