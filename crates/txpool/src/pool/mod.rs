//! The transaction pool: sub-pool bookkeeping, event entry points and
//! durable state.

use crate::{
    config::{PoolConfig, MAX_SENDERS_IN_CACHE, RECENT_LOCALS_CAPACITY},
    error::{PoolError, PoolResult},
    identifier::SenderId,
    kv::{tables, Database, DbTx, DbTxMut},
    metrics::TxPoolMetrics,
    senders::{SenderCache, SenderInfo},
    traits::{PeerId, TransactionParser},
    transaction::{TxSlot, TxSlots},
};
use alloy_primitives::{Address, Bytes, B256};
use fnv::{FnvHashMap, FnvHashSet};
use parking_lot::{Mutex, RwLock};
use schnellru::{ByLength, LruMap};
use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub(crate) mod by_nonce;
pub(crate) mod meta;
pub mod state;
pub(crate) mod subpool;
mod update;

pub use state::{SubPoolMarker, SubPoolType};

use by_nonce::ByNonce;
use meta::{Arena, MetaTx, MetaTxId};
use subpool::SubPool;

/// What a flush wrote, applied to the in-memory pool only after the write
/// transaction committed.
pub(crate) struct FlushOutcome {
    /// Senders whose persistent records were cleaned.
    pub(crate) evicted: u64,
    /// Hashes whose raw bytes became durable this round.
    pub(crate) written: Vec<B256>,
}

/// Buffers ids of recently connected good peers so pooled hashes can be
/// synced to all of them at once. Does not track disconnects.
#[derive(Debug, Default)]
struct RecentlyConnectedPeers {
    peers: Vec<PeerId>,
}

impl RecentlyConnectedPeers {
    fn add(&mut self, peer: PeerId) {
        self.peers.push(peer);
    }

    fn drain(&mut self) -> Vec<PeerId> {
        std::mem::take(&mut self.peers)
    }
}

/// All pool state guarded by the exclusive lock.
pub(crate) struct PoolInner {
    /// Owner of every resident transaction record.
    pub(crate) arena: Arena,
    /// Identity hash to record handle.
    pub(crate) by_hash: HashMap<B256, MetaTxId>,
    /// `(sender-id, nonce)` ordered index over the same records.
    pub(crate) by_nonce: ByNonce,
    /// Candidates for immediate inclusion.
    pub(crate) pending: SubPool,
    /// Candidates should the base fee drop.
    pub(crate) base_fee: SubPool,
    /// Long-horizon residents.
    pub(crate) queued: SubPool,
    /// Records pending persistent removal since the last flush.
    pub(crate) deleted: Vec<MetaTx>,
    /// Identity hashes of transactions that were ever local, used to re-flag
    /// re-injected transactions after an unwind.
    pub(crate) locals_history: LruMap<B256, ()>,
    /// Event counters.
    pub(crate) metrics: TxPoolMetrics,
}

// === impl PoolInner ===

impl PoolInner {
    fn new() -> Self {
        Self {
            arena: Arena::default(),
            by_hash: HashMap::default(),
            by_nonce: ByNonce::default(),
            pending: SubPool::new(SubPoolType::Pending),
            base_fee: SubPool::new(SubPoolType::BaseFee),
            queued: SubPool::new(SubPoolType::Queued),
            deleted: Vec::new(),
            locals_history: LruMap::new(ByLength::new(RECENT_LOCALS_CAPACITY)),
            metrics: TxPoolMetrics::default(),
        }
    }

    /// Removes the record from the sub-pool it currently resides in, if any.
    pub(crate) fn detach(&mut self, id: MetaTxId) {
        match self.arena[id].current {
            Some(SubPoolType::Pending) => self.pending.unsafe_remove(&mut self.arena, id),
            Some(SubPoolType::BaseFee) => self.base_fee.unsafe_remove(&mut self.arena, id),
            Some(SubPoolType::Queued) => self.queued.unsafe_remove(&mut self.arena, id),
            None => {}
        }
    }

    /// Drops a detached record from every index and stages it for persistent
    /// removal. A discarded local transaction is remembered in the
    /// recent-locals cache.
    pub(crate) fn discard(&mut self, id: MetaTxId) {
        let meta = self.arena.remove(id);
        debug_assert!(meta.current.is_none());
        self.by_hash.remove(&meta.tx.id_hash);
        self.by_nonce.remove(meta.id());
        if meta.marker.is_local() {
            self.locals_history.insert(meta.tx.id_hash, ());
        }
        self.metrics.discarded_transactions.increment(1);
        self.deleted.push(meta);
    }

    /// Inserts a batch into the pending sub-pool without restoring heap
    /// order, applying the replacement policy per `(sender-id, nonce)` slot.
    ///
    /// Returns the senders whose set of resident transactions changed.
    pub(crate) fn unsafe_add_to_pending(&mut self, slots: &TxSlots) -> FnvHashSet<SenderId> {
        let mut changed = FnvHashSet::default();
        for (slot, is_local) in slots.iter() {
            if self.by_hash.contains_key(&slot.id_hash) {
                continue
            }
            if let Some(found) = self.by_nonce.get(slot.transaction_id()) {
                // Replacement is exclusive: the resident record survives
                // unless the incoming tip is strictly greater.
                if slot.tip <= self.arena[found].tx.tip {
                    continue
                }
                self.detach(found);
                self.discard(found);
            }
            let id = self.arena.insert(MetaTx::new(slot.clone(), is_local));
            self.by_hash.insert(slot.id_hash, id);
            let displaced = self.by_nonce.insert(slot.transaction_id(), id);
            debug_assert!(displaced.is_none());
            self.pending.unsafe_add(&mut self.arena, id);
            changed.insert(slot.sender_id);
            self.metrics.inserted_transactions.increment(1);
        }
        changed
    }

    /// Removes every transaction made obsolete by the mined batch: per
    /// sender, everything with nonce up to the maximum mined nonce.
    ///
    /// Returns the senders whose set of resident transactions changed.
    pub(crate) fn remove_mined(&mut self, mined: &TxSlots) -> FnvHashSet<SenderId> {
        let mut max_mined: FnvHashMap<SenderId, u64> = FnvHashMap::default();
        for (slot, _) in mined.iter() {
            let nonce = max_mined.entry(slot.sender_id).or_insert(slot.nonce);
            if slot.nonce > *nonce {
                *nonce = slot.nonce;
            }
        }

        let mut touched = FnvHashSet::default();
        for (&sender, &mined_nonce) in &max_mined {
            let to_remove: Vec<MetaTxId> = self
                .by_nonce
                .ascend(sender)
                .take_while(|&id| self.arena[id].tx.nonce <= mined_nonce)
                .collect();
            if to_remove.is_empty() {
                continue
            }
            touched.insert(sender);
            for id in to_remove {
                self.detach(id);
                self.discard(id);
                self.metrics.mined_transactions.increment(1);
            }
        }
        touched
    }

    /// Applies a batch: insert/replace, rescore every touched sender,
    /// restore heap order and run promotion.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert_and_promote(
        &mut self,
        tx: &impl DbTx,
        senders: &SenderCache,
        slots: &TxSlots,
        mut touched: FnvHashSet<SenderId>,
        protocol_base_fee: u64,
        pending_base_fee: u64,
        config: &PoolConfig,
    ) -> PoolResult<()> {
        touched.extend(self.unsafe_add_to_pending(slots));
        for &sender in &touched {
            let info = senders.info(tx, sender)?;
            self.on_sender_change(sender, &info, protocol_base_fee, pending_base_fee);
        }
        self.pending.enforce_invariants(&mut self.arena);
        self.base_fee.enforce_invariants(&mut self.arena);
        self.queued.enforce_invariants(&mut self.arena);
        self.promote(config);
        self.assert_consistency(config)
    }

    /// Writes the durable image of the pool into `tx`. In-memory cleanup is
    /// the caller's job once the transaction commits.
    pub(crate) fn flush_locked(
        &self,
        tx: &mut impl DbTxMut,
        senders: &SenderCache,
        protocol_base_fee: u64,
        pending_base_fee: u64,
        evict_after: u64,
    ) -> PoolResult<FlushOutcome> {
        let mut senders_without_txs = BTreeSet::new();
        for meta in &self.deleted {
            if self.by_nonce.count(meta.tx.sender_id) == 0 {
                senders_without_txs.insert(meta.tx.sender_id);
            }
            tx.delete::<tables::PooledTransaction>(meta.tx.id_hash)?;
        }

        tx.clear::<tables::RecentLocalTransaction>()?;
        for (i, (hash, _)) in self.locals_history.iter().enumerate() {
            tx.put::<tables::RecentLocalTransaction>(i as u64, *hash)?;
        }

        let mut written = Vec::new();
        for (hash, &id) in &self.by_hash {
            let meta = &self.arena[id];
            let Some(rlp) = meta.tx.rlp.clone() else { continue };
            tx.put::<tables::PooledTransaction>(
                *hash,
                tables::StoredTransaction { sender_id: meta.tx.sender_id, rlp },
            )?;
            written.push(*hash);
        }

        tx.put::<tables::PoolInfo>(
            tables::PROTOCOL_BASE_FEE_KEY.to_vec(),
            protocol_base_fee.to_be_bytes().to_vec(),
        )?;
        tx.put::<tables::PoolInfo>(
            tables::PENDING_BASE_FEE_KEY.to_vec(),
            pending_base_fee.to_be_bytes().to_vec(),
        )?;

        let evicted = senders.flush(tx, &self.by_nonce, &senders_without_txs, evict_after)?;
        Ok(FlushOutcome { evicted, written })
    }

    /// Cross-structure consistency check, compiled only into debug builds.
    #[cfg(debug_assertions)]
    pub(crate) fn assert_consistency(&self, config: &PoolConfig) -> PoolResult<()> {
        if self.by_hash.len() != self.by_nonce.len() {
            return Err(PoolError::Invariant("identity-hash map and by-nonce index out of sync"))
        }
        if self.arena.len() != self.by_hash.len() {
            return Err(PoolError::Invariant("arena out of sync with the identity-hash map"))
        }
        for (id, meta_id) in self.by_nonce.iter() {
            let meta = &self.arena[meta_id];
            if meta.id() != id {
                return Err(PoolError::Invariant("by-nonce key does not match its record"))
            }
            if !self.by_hash.contains_key(&meta.tx.id_hash) {
                return Err(PoolError::Invariant("indexed record missing from identity-hash map"))
            }
            match meta.current {
                Some(_) if meta.best_index < 0 || meta.worst_index < 0 => {
                    return Err(PoolError::Invariant("resident record with unset heap positions"))
                }
                None if meta.best_index != -1 || meta.worst_index != -1 => {
                    return Err(PoolError::Invariant("detached record with stale heap positions"))
                }
                _ => {}
            }
        }
        if self.pending.len() > config.pending_limit ||
            self.base_fee.len() > config.base_fee_limit ||
            self.queued.len() > config.queued_limit
        {
            return Err(PoolError::Invariant("sub-pool over capacity"))
        }
        for id in self.pending.iter() {
            if !self.arena[id].marker.qualifies_for_pending() {
                return Err(PoolError::Invariant("pending element below the pending bar"))
            }
        }
        for id in self.base_fee.iter() {
            let marker = self.arena[id].marker;
            if !marker.qualifies_for_base_fee() || marker.qualifies_for_pending() {
                return Err(PoolError::Invariant("base-fee element outside its marker band"))
            }
        }
        for id in self.queued.iter() {
            let marker = self.arena[id].marker;
            if !marker.qualifies_for_queued() || marker.qualifies_for_base_fee() {
                return Err(PoolError::Invariant("queued element outside its marker band"))
            }
        }
        Ok(())
    }

    #[cfg(not(debug_assertions))]
    pub(crate) fn assert_consistency(&self, _config: &PoolConfig) -> PoolResult<()> {
        Ok(())
    }
}

/// The transaction pool.
///
/// Mutating events (`on_new_txs`, `on_new_block`, `flush`, `restore`) run
/// under one exclusive lock and restore every invariant before releasing it;
/// queries take the lock shared. Base fees live in atomics so `started` can
/// be answered without the lock.
pub struct TxPool<DB> {
    db: DB,
    senders: Arc<SenderCache>,
    inner: RwLock<PoolInner>,
    protocol_base_fee: AtomicU64,
    pending_base_fee: AtomicU64,
    new_txs: mpsc::Sender<Vec<B256>>,
    recently_connected_peers: Mutex<RecentlyConnectedPeers>,
    config: PoolConfig,
}

impl<DB> std::fmt::Debug for TxPool<DB> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxPool").finish_non_exhaustive()
    }
}

// === impl TxPool ===

impl<DB: Database> TxPool<DB> {
    /// Creates a pool over `db`, publishing hash announcements of surviving
    /// transactions into `new_txs` (non-blocking, dropped when full).
    pub fn new(
        db: DB,
        senders: Arc<SenderCache>,
        new_txs: mpsc::Sender<Vec<B256>>,
        config: PoolConfig,
    ) -> Self {
        Self {
            db,
            senders,
            inner: RwLock::new(PoolInner::new()),
            protocol_base_fee: AtomicU64::new(0),
            pending_base_fee: AtomicU64::new(0),
            new_txs,
            recently_connected_peers: Mutex::new(RecentlyConnectedPeers::default()),
            config,
        }
    }

    /// Whether the pool has seen its first block notification and accepts
    /// transactions.
    pub fn started(&self) -> bool {
        self.protocol_base_fee.load(Ordering::Relaxed) > 0
    }

    /// Whether the transaction with the given identity hash is known, either
    /// resident or durably stored.
    pub fn id_hash_known(&self, hash: &B256) -> PoolResult<bool> {
        {
            let inner = self.inner.read();
            if inner.by_hash.contains_key(hash) {
                return Ok(true)
            }
        }
        self.db.view::<_, PoolError, _>(|tx| Ok(tx.has::<tables::PooledTransaction>(*hash)?))
    }

    /// Whether the resident transaction with the given hash is local.
    pub fn id_hash_is_local(&self, hash: &B256) -> bool {
        let inner = self.inner.read();
        inner.by_hash.get(hash).map(|&id| inner.arena[id].marker.is_local()).unwrap_or(false)
    }

    /// Raw encoded bytes of the transaction with the given hash, falling
    /// back to the persistent store once the in-memory copy was flushed.
    pub fn get_rlp(&self, hash: &B256) -> PoolResult<Option<Bytes>> {
        {
            let inner = self.inner.read();
            if let Some(&id) = inner.by_hash.get(hash) {
                if let Some(rlp) = inner.arena[id].tx.rlp.clone() {
                    return Ok(Some(rlp))
                }
            }
        }
        self.db.view::<_, PoolError, _>(|tx| {
            Ok(tx.get::<tables::PooledTransaction>(*hash)?.map(|stored| stored.rlp))
        })
    }

    /// Appends the hashes of all resident local transactions to `buf`.
    pub fn append_local_hashes(&self, buf: &mut Vec<B256>) {
        let inner = self.inner.read();
        for (hash, &id) in &inner.by_hash {
            if inner.arena[id].marker.is_local() {
                buf.push(*hash);
            }
        }
    }

    /// Appends the hashes of all resident remote transactions to `buf`.
    pub fn append_remote_hashes(&self, buf: &mut Vec<B256>) {
        let inner = self.inner.read();
        for (hash, &id) in &inner.by_hash {
            if !inner.arena[id].marker.is_local() {
                buf.push(*hash);
            }
        }
    }

    /// Appends all resident hashes to `buf`, local ones first.
    pub fn append_all_hashes(&self, buf: &mut Vec<B256>) {
        self.append_local_hashes(buf);
        self.append_remote_hashes(buf);
    }

    /// Records a freshly connected good peer for the next pooled-hash sync.
    pub fn add_new_good_peer(&self, peer: PeerId) {
        self.recently_connected_peers.lock().add(peer);
    }

    /// Takes and clears the buffered recently connected peers.
    pub fn drain_new_peers(&self) -> Vec<PeerId> {
        self.recently_connected_peers.lock().drain()
    }

    /// Handles a batch of parsed inbound transactions.
    ///
    /// Senders are resolved against the cache, missing account facts are
    /// loaded from the chain backend `core`, then the batch is inserted under
    /// the replacement policy, rescored and promoted. Hashes of surviving
    /// transactions are published to the broadcast channel.
    pub fn on_new_txs<C: Database>(
        &self,
        core: &C,
        cancel: &CancellationToken,
        mut slots: TxSlots,
    ) -> PoolResult<()> {
        if slots.is_empty() {
            return Ok(())
        }
        let protocol = self.protocol_base_fee.load(Ordering::Relaxed);
        let pending = self.pending_base_fee.load(Ordering::Relaxed);
        if protocol == 0 || pending == 0 {
            return Err(PoolError::BaseFeeNotReady { protocol, pending })
        }

        let started = Instant::now();
        let mut inner = self.inner.write();
        self.db.view::<_, PoolError, _>(|tx| {
            let misses = self.senders.on_new_txs(tx, &mut slots)?;
            if !misses.is_empty() {
                core.view::<_, PoolError, _>(|core_tx| {
                    self.senders.load_from_chain(core_tx, cancel, &misses)
                })?;
            }
            slots.valid()?;
            inner.insert_and_promote(
                tx,
                &self.senders,
                &slots,
                FnvHashSet::default(),
                protocol,
                pending,
                &self.config,
            )
        })?;

        let notify: Vec<B256> = slots
            .txs
            .iter()
            .filter(|tx| inner.by_hash.contains_key(&tx.id_hash))
            .map(|tx| tx.id_hash)
            .collect();
        drop(inner);
        if !notify.is_empty() {
            let _ = self.new_txs.try_send(notify);
        }
        trace!(target: "txpool", txs = slots.len(), elapsed = ?started.elapsed(), "processed new transactions");
        Ok(())
    }

    /// Handles a new canonical block: applies sender state changes, removes
    /// mined transactions, re-injects unwound ones (restoring their locality
    /// from the recent-locals cache) and re-runs scoring and promotion.
    #[allow(clippy::too_many_arguments)]
    pub fn on_new_block(
        &self,
        cancel: &CancellationToken,
        state_changes: &HashMap<Address, SenderInfo>,
        mut unwound: TxSlots,
        mut mined: TxSlots,
        protocol_base_fee: u64,
        pending_base_fee: u64,
        block_height: u64,
        block_hash: B256,
    ) -> PoolResult<()> {
        let started = Instant::now();
        let mut inner = self.inner.write();
        if cancel.is_cancelled() {
            debug!(target: "txpool", height = block_height, "skipping block event: cancelled");
            return Ok(())
        }
        let (protocol, pending) = self.set_base_fee(protocol_base_fee, pending_base_fee);
        self.db.view::<_, PoolError, _>(|tx| {
            self.senders.on_new_block(
                tx,
                state_changes,
                &mut unwound,
                &mut mined,
                block_height,
                block_hash,
            )?;
            unwound.valid()?;
            mined.valid()?;

            let touched = inner.remove_mined(&mined);
            for i in 0..unwound.len() {
                if inner.locals_history.peek(&unwound.txs[i].id_hash).is_some() {
                    unwound.is_local[i] = true;
                }
            }
            inner.insert_and_promote(
                tx,
                &self.senders,
                &unwound,
                touched,
                protocol,
                pending,
                &self.config,
            )
        })?;

        let notify: Vec<B256> = unwound
            .txs
            .iter()
            .filter(|tx| inner.by_hash.contains_key(&tx.id_hash))
            .map(|tx| tx.id_hash)
            .collect();
        drop(inner);
        if !notify.is_empty() {
            let _ = self.new_txs.try_send(notify);
        }
        debug!(
            target: "txpool",
            height = block_height,
            unwound = unwound.len(),
            mined = mined.len(),
            elapsed = ?started.elapsed(),
            "processed new block"
        );
        Ok(())
    }

    /// Flushes the pool into the persistent store.
    ///
    /// Deletions become durable here and only here; in-memory raw bytes and
    /// the deletion queue are dropped strictly after the write transaction
    /// committed, so a failed flush leaves both sides unchanged. Returns the
    /// number of evicted senders.
    pub fn flush(&self) -> PoolResult<u64> {
        let mut inner = self.inner.write();
        let protocol = self.protocol_base_fee.load(Ordering::Relaxed);
        let pending = self.pending_base_fee.load(Ordering::Relaxed);
        let outcome = self.db.update::<_, PoolError, _>(|tx| {
            inner.flush_locked(
                tx,
                &self.senders,
                protocol,
                pending,
                self.config.evict_senders_after_commits,
            )
        })?;

        for hash in &outcome.written {
            if let Some(&id) = inner.by_hash.get(hash) {
                inner.arena[id].tx.rlp = None;
            }
        }
        inner.deleted.clear();
        self.senders.finish_flush();
        Ok(outcome.evicted)
    }

    /// Restores the pool from the persistent store after a restart,
    /// reconciling the sender cache against the chain backend and re-running
    /// intake for every stored transaction.
    pub fn restore<C, P>(
        &self,
        core: &C,
        parser: &mut P,
        cancel: &CancellationToken,
    ) -> PoolResult<()>
    where
        C: Database,
        P: TransactionParser,
    {
        let mut inner = self.inner.write();
        self.db.update::<_, PoolError, _>(|tx| {
            core.view::<_, PoolError, _>(|core_tx| {
                self.senders.restore(tx, core_tx, cancel)?;

                tx.for_each::<tables::RecentLocalTransaction, PoolError>(None, |_, hash| {
                    inner.locals_history.insert(hash, ());
                    Ok(())
                })?;

                let mut slots = TxSlots::default();
                tx.for_each::<tables::PooledTransaction, PoolError>(None, |hash, stored| {
                    let mut slot = TxSlot::default();
                    parser.parse(&stored.rlp, 0, &mut slot, false)?;
                    debug_assert_eq!(slot.id_hash, hash);
                    slot.sender_id = stored.sender_id;
                    slot.sender = tx
                        .get::<tables::PooledSenderIDToAddress>(stored.sender_id)?
                        .ok_or(PoolError::Intake("stored transaction without sender mapping"))?;
                    slot.rlp = None;
                    let is_local = inner.locals_history.peek(&hash).is_some();
                    slots.push(slot, is_local);
                    Ok(())
                })?;

                let protocol = tables::get_info_u64(tx, tables::PROTOCOL_BASE_FEE_KEY)?
                    .unwrap_or_default();
                let pending =
                    tables::get_info_u64(tx, tables::PENDING_BASE_FEE_KEY)?.unwrap_or_default();

                let misses = self.senders.on_new_txs(tx, &mut slots)?;
                if !misses.is_empty() {
                    self.senders.load_from_chain(core_tx, cancel, &misses)?;
                }
                slots.valid()?;
                inner.insert_and_promote(
                    tx,
                    &self.senders,
                    &slots,
                    FnvHashSet::default(),
                    protocol,
                    pending,
                    &self.config,
                )?;
                self.protocol_base_fee.store(protocol, Ordering::Relaxed);
                self.pending_base_fee.store(pending, Ordering::Relaxed);
                info!(target: "txpool", restored = slots.len(), "restored pool from db");
                Ok(())
            })
        })
    }

    /// Logs base fees, sub-pool occupancy and sender-cache sizes.
    pub fn log_stats(&self) -> PoolResult<()> {
        let protocol = self.protocol_base_fee.load(Ordering::Relaxed);
        let pending_fee = self.pending_base_fee.load(Ordering::Relaxed);
        let (pending, base_fee, queued) = {
            let inner = self.inner.read();
            (inner.pending.len(), inner.base_fee.len(), inner.queued.len())
        };
        let (ids_in_db, info_in_db) = self.db.view::<_, PoolError, _>(|tx| {
            Ok((
                tx.entries::<tables::PooledSenderID>()?,
                tx.entries::<tables::PooledSender>()?,
            ))
        })?;
        let (ids_in_mem, info_in_mem) = self.senders.sizes();
        if ids_in_mem + info_in_mem > MAX_SENDERS_IN_CACHE {
            warn!(
                target: "txpool",
                ids = ids_in_mem,
                info = info_in_mem,
                "sender cache over soft capacity"
            );
        }
        info!(
            target: "txpool",
            protocol_base_fee = protocol,
            pending_base_fee = pending_fee,
            pending = pending,
            base_fee = base_fee,
            queued = queued,
            sender_ids_mem = ids_in_mem,
            sender_ids_db = ids_in_db,
            sender_info_mem = info_in_mem,
            sender_info_db = info_in_db,
            "transaction pool status"
        );
        Ok(())
    }

    fn set_base_fee(&self, protocol: u64, pending: u64) -> (u64, u64) {
        self.protocol_base_fee.store(protocol, Ordering::Relaxed);
        let mut pending = pending;
        let mut has_new = pending > 0;
        if pending < protocol {
            pending = protocol;
            has_new = true;
        }
        if has_new {
            self.pending_base_fee.store(pending, Ordering::Relaxed);
        }
        (protocol, self.pending_base_fee.load(Ordering::Relaxed))
    }
}

/// A resident transaction's scoring state, exposed for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxStatus {
    /// Raw marker bits.
    pub marker: u8,
    /// Computed effective tip.
    pub effective_tip: u64,
    /// Sub-pool the transaction currently resides in.
    pub sub_pool: Option<SubPoolType>,
}

#[cfg(any(test, feature = "test-utils"))]
impl<DB: Database> TxPool<DB> {
    /// Scoring state of the resident transaction with the given hash.
    pub fn status(&self, hash: &B256) -> Option<TxStatus> {
        let inner = self.inner.read();
        inner.by_hash.get(hash).map(|&id| {
            let meta = &inner.arena[id];
            TxStatus {
                marker: meta.marker.bits(),
                effective_tip: meta.effective_tip,
                sub_pool: meta.current,
            }
        })
    }

    /// `(pending, base_fee, queued)` occupancy.
    pub fn size(&self) -> (usize, usize, usize) {
        let inner = self.inner.read();
        (inner.pending.len(), inner.base_fee.len(), inner.queued.len())
    }

    /// Sorted identity hashes of every resident transaction.
    pub fn resident_hashes(&self) -> Vec<B256> {
        let inner = self.inner.read();
        let mut hashes: Vec<B256> = inner.by_hash.keys().copied().collect();
        hashes.sort_unstable();
        hashes
    }

    /// Number of records staged for persistent removal.
    pub fn deletion_queue_len(&self) -> usize {
        self.inner.read().deleted.len()
    }

    /// Runs the full cross-structure consistency check.
    pub fn check_consistency(&self) -> PoolResult<()> {
        self.inner.read().assert_consistency(&self.config)
    }
}
