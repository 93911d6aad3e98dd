use std::time::Duration;

/// Max number of transactions in the pending sub-pool.
pub const PENDING_SUBPOOL_LIMIT: usize = 10 * 1024;

/// Max number of transactions in the base-fee sub-pool.
pub const BASE_FEE_SUBPOOL_LIMIT: usize = 10 * 1024;

/// Max number of transactions in the queued sub-pool.
pub const QUEUED_SUBPOOL_LIMIT: usize = 10 * 1024;

/// Soft cap on in-memory sender records between flushes.
pub const MAX_SENDERS_IN_CACHE: usize =
    2 * (PENDING_SUBPOOL_LIMIT + BASE_FEE_SUBPOOL_LIMIT + QUEUED_SUBPOOL_LIMIT);

/// Capacity of the recent-locals cache used to re-flag re-injected
/// transactions as local after an unwind.
pub const RECENT_LOCALS_CAPACITY: u32 = 1024;

/// Configuration options for the transaction pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// How often the pool is flushed to the persistent store.
    pub commit_interval: Duration,
    /// How often pool statistics are logged.
    pub log_interval: Duration,
    /// How often pooled hashes are synced to recently connected peers.
    pub sync_to_new_peers_interval: Duration,
    /// Number of commits a transaction-less sender survives before its
    /// persistent records are cleaned.
    pub evict_senders_after_commits: u64,
    /// Max number of transactions in the pending sub-pool.
    pub pending_limit: usize,
    /// Max number of transactions in the base-fee sub-pool.
    pub base_fee_limit: usize,
    /// Max number of transactions in the queued sub-pool.
    pub queued_limit: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            commit_interval: Duration::from_secs(15),
            log_interval: Duration::from_secs(30),
            sync_to_new_peers_interval: Duration::from_secs(2 * 60),
            evict_senders_after_commits: 10,
            pending_limit: PENDING_SUBPOOL_LIMIT,
            base_fee_limit: BASE_FEE_SUBPOOL_LIMIT,
            queued_limit: QUEUED_SUBPOOL_LIMIT,
        }
    }
}
