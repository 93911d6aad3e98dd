//! Flush, restart and recovery tests.

use crate::{setup, TestPool};
use alloy_primitives::{Address, B256};
use std::sync::Arc;
use tokio::sync::mpsc;
use txpool::{
    test_utils::{batch, seed_account, seed_block, seed_canonical, FixtureParser, TxBuilder},
    PoolConfig, SenderCache, TxPool,
};

const BALANCE: u64 = 1_000_000_000_000_000_000;

/// Builds a second pool over the same persistent store, as after a restart.
fn reopen(t: &TestPool) -> TxPool<txpool::kv::MemDb> {
    let (tx, _rx) = mpsc::channel(16);
    TxPool::new(t.db.clone(), Arc::new(SenderCache::new()), tx, PoolConfig::default())
}

#[test]
fn flush_then_restart_restores_residents_and_locality() {
    let t = setup();
    let local_sender = Address::repeat_byte(0x0a);
    let remote_sender = Address::repeat_byte(0x0b);
    seed_account(&t.core, local_sender, 0, BALANCE);
    seed_account(&t.core, remote_sender, 0, BALANCE);
    seed_canonical(&t.core, 1, B256::with_last_byte(1));
    seed_block(&t.pool, &t.cancel, 1);

    let local = TxBuilder::new(local_sender).build();
    let remote = TxBuilder::new(remote_sender).fee_cap(60).build();
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&[local.clone()], true)).unwrap();
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&[remote.clone()], false)).unwrap();

    t.pool.flush().unwrap();
    assert_eq!(t.pool.deletion_queue_len(), 0);

    // raw bytes were dropped from memory but remain reachable
    assert_eq!(t.pool.get_rlp(&local.id_hash).unwrap(), local.rlp);
    assert!(t.pool.id_hash_known(&local.id_hash).unwrap());

    let reopened = reopen(&t);
    reopened.restore(&t.core, &mut FixtureParser, &t.cancel).unwrap();

    assert!(reopened.started());
    assert_eq!(reopened.resident_hashes(), t.pool.resident_hashes());
    for hash in reopened.resident_hashes() {
        assert_eq!(reopened.status(&hash), t.pool.status(&hash));
    }
    assert!(reopened.id_hash_is_local(&local.id_hash));
    assert!(!reopened.id_hash_is_local(&remote.id_hash));
    reopened.check_consistency().unwrap();
}

#[test]
fn deletions_become_durable_at_the_next_flush() {
    let t = setup();
    let sender = Address::repeat_byte(0x0c);
    seed_account(&t.core, sender, 0, BALANCE);
    seed_canonical(&t.core, 1, B256::with_last_byte(1));
    seed_block(&t.pool, &t.cancel, 1);

    let original = TxBuilder::new(sender).tip(10).build();
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&[original.clone()], false)).unwrap();
    t.pool.flush().unwrap();
    assert!(t.pool.id_hash_known(&original.id_hash).unwrap());

    // a replacement discards the stored record
    let replacement = TxBuilder::new(sender).tip(20).build();
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&[replacement.clone()], false)).unwrap();
    assert_eq!(t.pool.deletion_queue_len(), 1);
    t.pool.flush().unwrap();
    assert_eq!(t.pool.deletion_queue_len(), 0);
    assert!(!t.pool.id_hash_known(&original.id_hash).unwrap());

    let reopened = reopen(&t);
    reopened.restore(&t.core, &mut FixtureParser, &t.cancel).unwrap();
    assert_eq!(reopened.resident_hashes(), vec![replacement.id_hash]);
    reopened.check_consistency().unwrap();
}

#[test]
fn restart_after_reorg_reloads_senders_from_the_chain() {
    let t = setup();
    let sender = Address::repeat_byte(0x0d);
    seed_account(&t.core, sender, 0, BALANCE);
    seed_block(&t.pool, &t.cancel, 1);

    let tx = TxBuilder::new(sender).build();
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&[tx.clone()], false)).unwrap();
    t.pool.flush().unwrap();

    // the chain moved on: the committed block hash is no longer canonical
    seed_canonical(&t.core, 1, B256::repeat_byte(0x99));

    let reopened = reopen(&t);
    reopened.restore(&t.core, &mut FixtureParser, &t.cancel).unwrap();

    // the sender table was dropped and repopulated from chain state
    assert_eq!(reopened.resident_hashes(), vec![tx.id_hash]);
    assert_eq!(reopened.status(&tx.id_hash).unwrap().marker, 0b11110);
    reopened.check_consistency().unwrap();
}
