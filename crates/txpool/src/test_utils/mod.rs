//! Internal helpers for pool tests.

use crate::{
    error::{PoolError, PoolResult},
    identifier::SenderId,
    kv::{tables, Database, DatabaseError, DbTxMut, MemDb},
    pool::TxPool,
    senders::SenderInfo,
    traits::{Broadcaster, PeerId, TransactionParser},
    transaction::{TxSlot, TxSlots},
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Protocol base fee used by the test scenarios.
pub const TEST_PROTOCOL_BASE_FEE: u64 = 50;

/// Pending base fee used by the test scenarios.
pub const TEST_PENDING_BASE_FEE: u64 = 70;

/// Byte length of the fixture encoding:
/// `sender 20 || nonce 8 || gas 8 || fee_cap 8 || tip 8 || value 32`.
const FIXTURE_LEN: usize = 20 + 8 + 8 + 8 + 8 + 32;

/// Builds deterministic transactions carrying a parseable fixture encoding,
/// so stored bytes round-trip through [`FixtureParser`].
#[derive(Debug, Clone)]
pub struct TxBuilder {
    sender: Address,
    nonce: u64,
    gas_limit: u64,
    fee_cap: u64,
    tip: u64,
    value: U256,
}

// === impl TxBuilder ===

impl TxBuilder {
    /// A transaction from `sender` with scenario defaults: nonce 0, gas
    /// 21 000, fee cap 100, tip 10, no value.
    pub fn new(sender: Address) -> Self {
        Self { sender, nonce: 0, gas_limit: 21_000, fee_cap: 100, tip: 10, value: U256::ZERO }
    }

    /// Sets the nonce.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the gas limit.
    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the fee cap.
    pub fn fee_cap(mut self, fee_cap: u64) -> Self {
        self.fee_cap = fee_cap;
        self
    }

    /// Sets the tip.
    pub fn tip(mut self, tip: u64) -> Self {
        self.tip = tip;
        self
    }

    /// Sets the transferred value.
    pub fn value(mut self, value: impl Into<U256>) -> Self {
        self.value = value.into();
        self
    }

    /// Encodes the fixture layout and derives the identity hash from it.
    pub fn build(&self) -> TxSlot {
        let mut bytes = Vec::with_capacity(FIXTURE_LEN);
        bytes.extend_from_slice(self.sender.as_slice());
        bytes.extend_from_slice(&self.nonce.to_be_bytes());
        bytes.extend_from_slice(&self.gas_limit.to_be_bytes());
        bytes.extend_from_slice(&self.fee_cap.to_be_bytes());
        bytes.extend_from_slice(&self.tip.to_be_bytes());
        bytes.extend_from_slice(&self.value.to_be_bytes::<32>());
        TxSlot {
            id_hash: keccak256(&bytes),
            sender: self.sender,
            sender_id: SenderId::UNASSIGNED,
            nonce: self.nonce,
            gas_limit: self.gas_limit,
            fee_cap: self.fee_cap,
            tip: self.tip,
            value: self.value,
            rlp: Some(Bytes::from(bytes)),
        }
    }
}

/// Parser for the fixture encoding produced by [`TxBuilder`].
#[derive(Debug, Default)]
pub struct FixtureParser;

impl TransactionParser for FixtureParser {
    fn parse(
        &mut self,
        data: &[u8],
        offset: usize,
        slot: &mut TxSlot,
        with_sender: bool,
    ) -> PoolResult<usize> {
        let data = data.get(offset..offset + FIXTURE_LEN).ok_or(PoolError::Malformed)?;
        slot.id_hash = keccak256(data);
        if with_sender {
            slot.sender = Address::from_slice(&data[..20]);
        }
        slot.nonce = be_u64(&data[20..28]);
        slot.gas_limit = be_u64(&data[28..36]);
        slot.fee_cap = be_u64(&data[36..44]);
        slot.tip = be_u64(&data[44..52]);
        slot.value = U256::from_be_slice(&data[52..84]);
        slot.rlp = Some(Bytes::copy_from_slice(data));
        Ok(FIXTURE_LEN)
    }
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    u64::from_be_bytes(out)
}

/// A broadcaster that drops everything.
#[derive(Debug, Default, Clone)]
pub struct NoopBroadcaster;

impl Broadcaster for NoopBroadcaster {
    fn broadcast_local_pooled_txs(&self, _hashes: &[B256]) {}
    fn broadcast_remote_pooled_txs(&self, _hashes: &[B256]) {}
    fn propagate_pooled_txs_to_peers_list(&self, _peers: &[PeerId], _hashes: &[B256]) {}
}

/// Seeds an account in the chain backend's state table.
pub fn seed_account(core: &MemDb, addr: Address, nonce: u64, balance: impl Into<U256>) {
    let balance = balance.into();
    core.update::<_, DatabaseError, _>(|tx| {
        tx.put::<tables::PlainState>(addr, SenderInfo::new(nonce, balance))
    })
    .unwrap();
}

/// Marks the canonical header at `height` in the chain backend.
pub fn seed_canonical(core: &MemDb, height: u64, hash: B256) {
    core.update::<_, DatabaseError, _>(|tx| tx.put::<tables::HeaderCanonical>(height, hash))
        .unwrap();
}

/// Delivers a block notification carrying only the scenario base fees.
pub fn seed_block<DB: Database>(pool: &TxPool<DB>, cancel: &CancellationToken, height: u64) {
    pool.on_new_block(
        cancel,
        &HashMap::new(),
        TxSlots::default(),
        TxSlots::default(),
        TEST_PROTOCOL_BASE_FEE,
        TEST_PENDING_BASE_FEE,
        height,
        B256::with_last_byte(height as u8),
    )
    .unwrap();
}

/// Wraps transactions into a batch with a shared locality flag.
pub fn batch(txs: &[TxSlot], is_local: bool) -> TxSlots {
    let mut slots = TxSlots::default();
    for tx in txs {
        slots.push(tx.clone(), is_local);
    }
    slots
}
