//! Transaction pool integration tests.

use alloy_primitives::B256;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use txpool::{kv::MemDb, PoolConfig, SenderCache, TxPool};

mod persistence;
mod pool;

struct TestPool {
    pool: TxPool<MemDb>,
    db: MemDb,
    core: MemDb,
    rx: mpsc::Receiver<Vec<B256>>,
    cancel: CancellationToken,
}

fn setup() -> TestPool {
    let db = MemDb::default();
    let core = MemDb::default();
    let (tx, rx) = mpsc::channel(16);
    let pool =
        TxPool::new(db.clone(), Arc::new(SenderCache::new()), tx, PoolConfig::default());
    TestPool { pool, db, core, rx, cancel: CancellationToken::new() }
}
