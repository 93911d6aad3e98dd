//! The per-sender metadata cache feeding balance and nonce facts into
//! scoring.

use crate::{
    error::{PoolError, PoolResult},
    identifier::SenderId,
    kv::{tables, DatabaseError, DbTx, DbTxMut},
    pool::by_nonce::ByNonce,
    transaction::TxSlots,
};
use alloy_primitives::{Address, B256, U256};
use fnv::FnvHashMap;
use parking_lot::RwLock;
use std::{
    collections::{BTreeSet, HashMap},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The sender-info table is dropped on restart when the last commit is older
/// than this.
const DROP_CACHE_AFTER: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// The sender-info table is dropped on restart when the chain is further
/// ahead of the stored height than this many blocks.
const MAX_MISSED_BLOCKS: u64 = 1024;

/// Last known account facts of a sender.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SenderInfo {
    /// Account nonce.
    pub nonce: u64,
    /// Account balance in wei.
    pub balance: U256,
}

// === impl SenderInfo ===

impl SenderInfo {
    /// Creates a record from its parts.
    pub const fn new(nonce: u64, balance: U256) -> Self {
        Self { nonce, balance }
    }
}

#[derive(Debug, Default)]
struct SenderCacheInner {
    block_height: u64,
    block_hash: B256,
    sender_id: u64,
    commit_id: u64,
    ids: HashMap<Address, SenderId>,
    info: FnvHashMap<SenderId, SenderInfo>,
}

// === impl SenderCacheInner ===

impl SenderCacheInner {
    fn id(&self, tx: &impl DbTx, addr: &Address) -> Result<Option<SenderId>, DatabaseError> {
        if let Some(id) = self.ids.get(addr) {
            return Ok(Some(*id))
        }
        tx.get::<tables::PooledSenderID>(*addr)
    }

    fn info(&self, tx: &impl DbTx, id: SenderId) -> Result<Option<SenderInfo>, DatabaseError> {
        if let Some(info) = self.info.get(&id) {
            return Ok(Some(*info))
        }
        tx.get::<tables::PooledSender>(id)
    }

    /// Allocation is monotone; ids are never reused.
    fn allocate(&mut self, addr: Address) -> SenderId {
        self.sender_id += 1;
        let id = SenderId::new(self.sender_id);
        self.ids.insert(addr, id);
        id
    }

    fn id_or_allocate(
        &mut self,
        tx: &impl DbTx,
        addr: Address,
    ) -> Result<SenderId, DatabaseError> {
        match self.id(tx, &addr)? {
            Some(id) => Ok(id),
            None => Ok(self.allocate(addr)),
        }
    }

    fn set_ids(&self, tx: &impl DbTx, slots: &mut TxSlots) -> PoolResult<()> {
        for slot in &mut slots.txs {
            slot.sender_id = self
                .id(tx, &slot.sender)?
                .ok_or(PoolError::Intake("sender id missing after merge"))?;
        }
        Ok(())
    }

    fn merge_state_changes(
        &mut self,
        tx: &impl DbTx,
        state_changes: &HashMap<Address, SenderInfo>,
        unwound: &TxSlots,
        mined: &TxSlots,
    ) -> PoolResult<()> {
        for (addr, info) in state_changes {
            let id = self.id_or_allocate(tx, *addr)?;
            self.info.insert(id, *info);
        }
        // Senders appearing only through their transactions start out as
        // empty accounts; they may become known in the near future.
        for slots in [unwound, mined] {
            for slot in &slots.txs {
                let id = self.id_or_allocate(tx, slot.sender)?;
                if !state_changes.contains_key(&slot.sender) && self.info(tx, id)?.is_none() {
                    self.info.insert(id, SenderInfo::default());
                }
            }
        }
        Ok(())
    }

    fn sync_missed_state_diff(
        &mut self,
        tx: &mut impl DbTxMut,
        core: &impl DbTx,
        cancel: &CancellationToken,
    ) -> PoolResult<()> {
        let mut drop_info_table = false;

        if let Some(committed) = tables::get_info_u64(tx, tables::SENDER_COMMIT_TIME_KEY)? {
            if unix_now().saturating_sub(committed) > DROP_CACHE_AFTER.as_secs() {
                drop_info_table = true;
            }
        }
        if self.block_height > 0 && !is_canonical(core, self.block_height, &self.block_hash)? {
            drop_info_table = true;
        }
        if let Some(progress) = core_progress(core)? {
            if progress.saturating_sub(self.block_height) > MAX_MISSED_BLOCKS {
                drop_info_table = true;
            }
        }

        if drop_info_table {
            info!(target: "txpool", height = self.block_height, "dropping stale sender table");
            tx.clear::<tables::PooledSender>()?;
            self.info.clear();
        }

        if self.block_height == 0 {
            return Ok(())
        }
        let diff = changesets(core, cancel, self.block_height)?;
        self.merge_state_changes(tx, &diff, &TxSlots::default(), &TxSlots::default())
    }
}

/// Write-through cache mapping addresses to dense sender ids and sender ids
/// to account facts, backed by the pool's persistent tables.
///
/// Carries its own lock because it is also consulted during flush while the
/// pool lock is held. Chain reads never happen under this lock: intake
/// computes the misses under the lock, releases it, reads, re-acquires and
/// merges.
#[derive(Debug, Default)]
pub struct SenderCache {
    inner: RwLock<SenderCacheInner>,
}

// === impl SenderCache ===

impl SenderCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the dense id of `addr`, if one was ever assigned.
    pub fn id(&self, tx: &impl DbTx, addr: &Address) -> PoolResult<Option<SenderId>> {
        Ok(self.inner.read().id(tx, addr)?)
    }

    /// Account facts of `id`. Every sender referenced by a resident
    /// transaction must have been loaded in advance; a miss is fatal.
    pub fn info(&self, tx: &impl DbTx, id: SenderId) -> PoolResult<SenderInfo> {
        self.info_opt(tx, id)?.ok_or(PoolError::SenderNotPreloaded(id))
    }

    /// Account facts of `id`, tolerating a miss.
    pub fn info_opt(&self, tx: &impl DbTx, id: SenderId) -> PoolResult<Option<SenderInfo>> {
        Ok(self.inner.read().info(tx, id)?)
    }

    /// In-memory `(ids, info)` entry counts.
    pub fn sizes(&self) -> (usize, usize) {
        let inner = self.inner.read();
        (inner.ids.len(), inner.info.len())
    }

    /// Ensures every transaction of the batch has a sender id, assigning new
    /// ones as needed, and returns the senders whose account facts still
    /// need a chain lookup.
    pub fn on_new_txs(
        &self,
        tx: &impl DbTx,
        slots: &mut TxSlots,
    ) -> PoolResult<FnvHashMap<SenderId, Address>> {
        let mut cache = self.inner.write();
        let mut to_load = FnvHashMap::default();
        for slot in &mut slots.txs {
            let id = cache.id_or_allocate(tx, slot.sender)?;
            slot.sender_id = id;
            if cache.info(tx, id)?.is_none() {
                to_load.insert(id, slot.sender);
            }
        }
        Ok(to_load)
    }

    /// Loads missing sender records from the chain backend, then merges.
    /// The reads happen before the cache lock is taken.
    pub fn load_from_chain(
        &self,
        core: &impl DbTx,
        cancel: &CancellationToken,
        misses: &FnvHashMap<SenderId, Address>,
    ) -> PoolResult<()> {
        let mut loaded = Vec::with_capacity(misses.len());
        for (&id, addr) in misses {
            if cancel.is_cancelled() {
                debug!(target: "txpool", "skipping sender load: cancelled");
                return Ok(())
            }
            loaded.push((id, load_sender(core, addr)?));
        }
        let mut cache = self.inner.write();
        for (id, info) in loaded {
            cache.info.insert(id, info);
        }
        Ok(())
    }

    /// Applies the state changes delivered with a block event and assigns
    /// ids to every sender appearing in the unwound or mined batches. Does
    /// not fetch from the chain.
    pub fn on_new_block(
        &self,
        tx: &impl DbTx,
        state_changes: &HashMap<Address, SenderInfo>,
        unwound: &mut TxSlots,
        mined: &mut TxSlots,
        block_height: u64,
        block_hash: B256,
    ) -> PoolResult<()> {
        let mut cache = self.inner.write();
        cache.block_height = block_height;
        cache.block_hash = block_hash;
        cache.merge_state_changes(tx, state_changes, unwound, mined)?;
        cache.set_ids(tx, unwound)?;
        cache.set_ids(tx, mined)?;
        Ok(())
    }

    /// Persists dirty identity and account state, stages the
    /// senders-without-transactions list under the new commit id and cleans
    /// senders that stayed transaction-less for `evict_after` commits.
    ///
    /// The write-through maps are dropped by [`Self::finish_flush`] once the
    /// transaction committed. Returns the number of evicted senders.
    pub(crate) fn flush(
        &self,
        tx: &mut impl DbTxMut,
        by_nonce: &ByNonce,
        senders_without_txs: &BTreeSet<SenderId>,
        evict_after: u64,
    ) -> Result<u64, DatabaseError> {
        let mut cache = self.inner.write();
        cache.commit_id += 1;
        let commit_id = cache.commit_id;

        if !senders_without_txs.is_empty() {
            tx.put::<tables::PoolStateEviction>(
                commit_id,
                tables::SenderIdList(senders_without_txs.iter().copied().collect()),
            )?;
        }

        // Revisit rows old enough and clean senders that still have no
        // resident transactions and no live cache entry.
        let mut due: Vec<(u64, tables::SenderIdList)> = Vec::new();
        tx.for_each::<tables::PoolStateEviction, DatabaseError>(None, |key, list| {
            if commit_id.saturating_sub(key) >= evict_after {
                due.push((key, list));
            }
            Ok(())
        })?;
        let mut evicted = 0u64;
        for (key, list) in due {
            for id in list.0 {
                if cache.info.contains_key(&id) {
                    continue
                }
                if by_nonce.count(id) > 0 {
                    continue
                }
                let Some(addr) = tx.get::<tables::PooledSenderIDToAddress>(id)? else {
                    continue
                };
                if cache.ids.contains_key(&addr) {
                    continue
                }
                tx.delete::<tables::PooledSenderID>(addr)?;
                tx.delete::<tables::PooledSenderIDToAddress>(id)?;
                tx.delete::<tables::PooledSender>(id)?;
                evicted += 1;
            }
            tx.delete::<tables::PoolStateEviction>(key)?;
        }

        for (addr, id) in &cache.ids {
            let current = tx.get::<tables::PooledSenderID>(*addr)?;
            if current == Some(*id) {
                continue
            }
            tx.put::<tables::PooledSenderID>(*addr, *id)?;
            tx.put::<tables::PooledSenderIDToAddress>(*id, *addr)?;
        }

        for (id, info) in &cache.info {
            tx.put::<tables::PooledSender>(*id, *info)?;
        }

        tx.put::<tables::PoolInfo>(
            tables::SENDER_CACHE_HEIGHT_KEY.to_vec(),
            cache.block_height.to_be_bytes().to_vec(),
        )?;
        tx.put::<tables::PoolInfo>(
            tables::SENDER_CACHE_HASH_KEY.to_vec(),
            cache.block_hash.to_vec(),
        )?;
        tx.put::<tables::PoolInfo>(
            tables::SENDER_CACHE_ID_KEY.to_vec(),
            cache.sender_id.to_be_bytes().to_vec(),
        )?;
        tx.put::<tables::PoolInfo>(
            tables::SENDER_COMMIT_ID_KEY.to_vec(),
            commit_id.to_be_bytes().to_vec(),
        )?;
        tx.put::<tables::PoolInfo>(
            tables::SENDER_COMMIT_TIME_KEY.to_vec(),
            unix_now().to_be_bytes().to_vec(),
        )?;

        Ok(evicted)
    }

    /// Drops the write-through maps after a successful commit.
    pub fn finish_flush(&self) {
        let mut cache = self.inner.write();
        cache.ids.clear();
        cache.info.clear();
    }

    /// Restores persisted metadata after a restart and reconciles the
    /// account table against the chain backend, replaying missed change-sets
    /// from the stored height.
    pub fn restore(
        &self,
        tx: &mut impl DbTxMut,
        core: &impl DbTx,
        cancel: &CancellationToken,
    ) -> PoolResult<()> {
        let mut cache = self.inner.write();
        if let Some(v) = tables::get_info_u64(tx, tables::SENDER_CACHE_HEIGHT_KEY)? {
            cache.block_height = v;
        }
        if let Some(v) = tx.get::<tables::PoolInfo>(tables::SENDER_CACHE_HASH_KEY.to_vec())? {
            if v.len() == 32 {
                cache.block_hash = B256::from_slice(&v);
            }
        }
        if let Some(v) = tables::get_info_u64(tx, tables::SENDER_CACHE_ID_KEY)? {
            cache.sender_id = v;
        }
        if let Some(v) = tables::get_info_u64(tx, tables::SENDER_COMMIT_ID_KEY)? {
            cache.commit_id = v;
        }
        cache.sync_missed_state_diff(tx, core, cancel)
    }
}

/// Reads a sender's account facts from the chain state, defaulting to an
/// empty account for unknown senders.
fn load_sender(core: &impl DbTx, addr: &Address) -> Result<SenderInfo, DatabaseError> {
    Ok(core.get::<tables::PlainState>(*addr)?.unwrap_or_default())
}

/// Whether `hash` is the canonical header at `height`.
fn is_canonical(core: &impl DbTx, height: u64, hash: &B256) -> Result<bool, DatabaseError> {
    Ok(core.get::<tables::HeaderCanonical>(height)? == Some(*hash))
}

/// Overall chain progress as reported by the `Finish` sync stage.
fn core_progress(core: &impl DbTx) -> Result<Option<u64>, DatabaseError> {
    core.get::<tables::SyncStageProgress>(tables::FINISH_STAGE.to_vec())
}

/// Collects the accounts changed from `from` onwards, with their current
/// chain state.
fn changesets(
    core: &impl DbTx,
    cancel: &CancellationToken,
    from: u64,
) -> PoolResult<HashMap<Address, SenderInfo>> {
    let mut diff = HashMap::new();
    core.for_each::<tables::AccountChangeSet, PoolError>(
        Some(tables::ChangeSetKey::first_at(from)),
        |_, addr| {
            if cancel.is_cancelled() {
                return Ok(())
            }
            diff.insert(addr, load_sender(core, &addr)?);
            Ok(())
        },
    )?;
    Ok(diff)
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        kv::{Database, MemDb},
        transaction::TxSlot,
    };

    fn batch_of(addrs: &[Address]) -> TxSlots {
        let mut slots = TxSlots::default();
        for addr in addrs {
            slots.push(TxSlot { sender: *addr, ..Default::default() }, false);
        }
        slots
    }

    #[test]
    fn allocation_is_monotone_and_stable() {
        let db = MemDb::default();
        let cache = SenderCache::new();
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);

        let mut slots = batch_of(&[a, b, a]);
        let misses = db
            .view::<_, PoolError, _>(|tx| cache.on_new_txs(tx, &mut slots))
            .unwrap();
        assert_eq!(slots.txs[0].sender_id, SenderId::new(1));
        assert_eq!(slots.txs[1].sender_id, SenderId::new(2));
        assert_eq!(slots.txs[2].sender_id, SenderId::new(1));
        assert_eq!(misses.len(), 2);

        // ids survive a flush through the persistent tables
        db.update::<_, PoolError, _>(|tx| {
            cache
                .flush(tx, &ByNonce::default(), &BTreeSet::new(), 10)
                .map_err(Into::into)
        })
        .unwrap();
        cache.finish_flush();
        assert_eq!(cache.sizes(), (0, 0));

        let id = db.view::<_, PoolError, _>(|tx| cache.id(tx, &a)).unwrap();
        assert_eq!(id, Some(SenderId::new(1)));

        // a new sender continues the sequence
        let mut slots = batch_of(&[Address::repeat_byte(0xcc)]);
        db.view::<_, PoolError, _>(|tx| cache.on_new_txs(tx, &mut slots)).unwrap();
        assert_eq!(slots.txs[0].sender_id, SenderId::new(3));
    }

    #[test]
    fn chain_misses_are_loaded_then_merged() {
        let db = MemDb::default();
        let core = MemDb::default();
        let cache = SenderCache::new();
        let addr = Address::repeat_byte(0x11);
        core.update::<_, DatabaseError, _>(|tx| {
            tx.put::<tables::PlainState>(addr, SenderInfo::new(3, U256::from(500u64)))
        })
        .unwrap();

        let mut slots = batch_of(&[addr]);
        let misses =
            db.view::<_, PoolError, _>(|tx| cache.on_new_txs(tx, &mut slots)).unwrap();
        assert_eq!(misses.len(), 1);

        let cancel = CancellationToken::new();
        core.view::<_, PoolError, _>(|tx| cache.load_from_chain(tx, &cancel, &misses))
            .unwrap();

        let info = db
            .view::<_, PoolError, _>(|tx| cache.info(tx, SenderId::new(1)))
            .unwrap();
        assert_eq!(info, SenderInfo::new(3, U256::from(500u64)));
    }

    #[test]
    fn info_miss_is_fatal() {
        let db = MemDb::default();
        let cache = SenderCache::new();
        let res = db.view::<_, PoolError, _>(|tx| cache.info(tx, SenderId::new(9)));
        assert!(matches!(res, Err(PoolError::SenderNotPreloaded(_))));
    }

    #[test]
    fn idle_senders_are_evicted_after_enough_commits() {
        let db = MemDb::default();
        let cache = SenderCache::new();
        let addr = Address::repeat_byte(0x42);

        let mut slots = batch_of(&[addr]);
        db.view::<_, PoolError, _>(|tx| cache.on_new_txs(tx, &mut slots)).unwrap();
        let id = slots.txs[0].sender_id;

        let by_nonce = ByNonce::default();
        let without_txs: BTreeSet<SenderId> = [id].into_iter().collect();

        // first commit records the eviction candidate
        db.update::<_, DatabaseError, _>(|tx| {
            cache.flush(tx, &by_nonce, &without_txs, 2)
        })
        .unwrap();
        cache.finish_flush();

        // not due yet
        let evicted = db
            .update::<_, DatabaseError, _>(|tx| {
                cache.flush(tx, &by_nonce, &BTreeSet::new(), 2)
            })
            .unwrap();
        cache.finish_flush();
        assert_eq!(evicted, 0);

        // due now: the sender has no transactions and no live cache entry
        let evicted = db
            .update::<_, DatabaseError, _>(|tx| {
                cache.flush(tx, &by_nonce, &BTreeSet::new(), 2)
            })
            .unwrap();
        cache.finish_flush();
        assert_eq!(evicted, 1);

        db.view::<_, DatabaseError, _>(|tx| {
            assert_eq!(tx.entries::<tables::PooledSenderID>()?, 0);
            assert_eq!(tx.entries::<tables::PooledSenderIDToAddress>()?, 0);
            assert_eq!(tx.entries::<tables::PooledSender>()?, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn restore_drops_non_canonical_state() {
        let db = MemDb::default();
        let core = MemDb::default();
        let cache = SenderCache::new();
        let cancel = CancellationToken::new();

        // pretend a previous run committed at height 5
        db.update::<_, DatabaseError, _>(|tx| {
            tx.put::<tables::PoolInfo>(
                tables::SENDER_CACHE_HEIGHT_KEY.to_vec(),
                5u64.to_be_bytes().to_vec(),
            )?;
            tx.put::<tables::PoolInfo>(
                tables::SENDER_CACHE_HASH_KEY.to_vec(),
                B256::repeat_byte(1).to_vec(),
            )?;
            tx.put::<tables::PooledSender>(SenderId::new(1), SenderInfo::default())
        })
        .unwrap();
        // the chain knows a different canonical hash at that height
        core.update::<_, DatabaseError, _>(|tx| {
            tx.put::<tables::HeaderCanonical>(5, B256::repeat_byte(9))
        })
        .unwrap();

        db.update::<_, PoolError, _>(|tx| {
            core.view::<_, PoolError, _>(|core_tx| cache.restore(tx, core_tx, &cancel))
        })
        .unwrap();

        db.view::<_, DatabaseError, _>(|tx| {
            assert_eq!(tx.entries::<tables::PooledSender>()?, 0);
            Ok(())
        })
        .unwrap();
    }
}
