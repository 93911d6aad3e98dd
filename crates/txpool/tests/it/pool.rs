//! Scenario and law tests over the pool's event entry points.

use crate::setup;
use alloy_primitives::{Address, B256};
use std::collections::HashMap;
use txpool::{
    kv::Database,
    test_utils::{
        batch, seed_account, seed_block, TxBuilder, TEST_PENDING_BASE_FEE,
        TEST_PROTOCOL_BASE_FEE,
    },
    PoolError, SenderInfo, SubPoolType, TxSlots,
};

const BALANCE: u64 = 1_000_000_000_000_000_000;

#[test]
fn rejects_txs_before_the_first_block() {
    let t = setup();
    assert!(!t.pool.started());
    let tx = TxBuilder::new(Address::repeat_byte(1)).build();
    let res = t.pool.on_new_txs(&t.core, &t.cancel, batch(&[tx], true));
    assert!(matches!(res, Err(PoolError::BaseFeeNotReady { .. })));
}

#[test]
fn single_local_tx_lands_in_pending() {
    let mut t = setup();
    let sender = Address::repeat_byte(1);
    seed_account(&t.core, sender, 0, BALANCE);
    seed_block(&t.pool, &t.cancel, 1);
    assert!(t.pool.started());

    let tx = TxBuilder::new(sender).build();
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&[tx.clone()], true)).unwrap();

    let status = t.pool.status(&tx.id_hash).unwrap();
    assert_eq!(status.marker, 0b11111);
    assert_eq!(status.effective_tip, 10);
    assert_eq!(status.sub_pool, Some(SubPoolType::Pending));
    assert_eq!(t.pool.size(), (1, 0, 0));
    assert!(t.pool.id_hash_is_local(&tx.id_hash));
    t.pool.check_consistency().unwrap();

    // the surviving hash was announced
    assert_eq!(t.rx.try_recv().unwrap(), vec![tx.id_hash]);
}

#[test]
fn nonce_gap_parks_the_tail_in_queued() {
    let t = setup();
    let sender = Address::repeat_byte(2);
    seed_account(&t.core, sender, 0, BALANCE);
    seed_block(&t.pool, &t.cancel, 1);

    let head = TxBuilder::new(sender).build();
    let gapped = TxBuilder::new(sender).nonce(2).build();
    t.pool
        .on_new_txs(&t.core, &t.cancel, batch(&[head.clone(), gapped.clone()], true))
        .unwrap();

    let head_status = t.pool.status(&head.id_hash).unwrap();
    assert_eq!(head_status.marker, 0b11111);
    assert_eq!(head_status.sub_pool, Some(SubPoolType::Pending));

    let gapped_status = t.pool.status(&gapped.id_hash).unwrap();
    assert_eq!(gapped_status.marker, 0b10111);
    assert_eq!(gapped_status.sub_pool, Some(SubPoolType::Queued));

    assert_eq!(t.pool.size(), (1, 0, 1));
    t.pool.check_consistency().unwrap();
}

#[test]
fn replacement_requires_strictly_higher_tip() {
    let t = setup();
    let sender = Address::repeat_byte(3);
    seed_account(&t.core, sender, 0, BALANCE);
    seed_block(&t.pool, &t.cancel, 1);

    let a = TxBuilder::new(sender).tip(10).build();
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&[a.clone()], false)).unwrap();

    // strictly higher tip displaces the resident record
    let b = TxBuilder::new(sender).tip(11).build();
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&[b.clone()], false)).unwrap();
    assert!(t.pool.status(&a.id_hash).is_none());
    assert!(t.pool.status(&b.id_hash).is_some());
    assert_eq!(t.pool.resident_hashes().len(), 1);
    assert_eq!(t.pool.deletion_queue_len(), 1);

    // an equal tip is rejected and nothing changes
    let c = TxBuilder::new(sender).tip(11).value(1u64).build();
    assert_ne!(c.id_hash, b.id_hash);
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&[c.clone()], false)).unwrap();
    assert!(t.pool.status(&c.id_hash).is_none());
    assert!(t.pool.status(&b.id_hash).is_some());
    assert_eq!(t.pool.deletion_queue_len(), 1);
    t.pool.check_consistency().unwrap();
}

#[test]
fn pending_capacity_discards_the_lowest_priority() {
    let t = setup();
    let count = 10 * 1024 + 1;

    // one update seeds every account
    t.core
        .update::<_, txpool::kv::DatabaseError, _>(|tx| {
            for i in 0..count {
                let addr = Address::from_word(B256::from(alloy_primitives::U256::from(
                    i as u64 + 1,
                )));
                tx.put::<txpool::kv::tables::PlainState>(
                    addr,
                    SenderInfo::new(0, alloy_primitives::U256::from(BALANCE)),
                )?;
            }
            Ok(())
        })
        .unwrap();
    seed_block(&t.pool, &t.cancel, 1);

    let mut slots = TxSlots::default();
    let mut lowest = None;
    for i in 0..count {
        let addr =
            Address::from_word(B256::from(alloy_primitives::U256::from(i as u64 + 1)));
        let tx = TxBuilder::new(addr).tip(i as u64 + 1).build();
        if i == 0 {
            lowest = Some(tx.id_hash);
        }
        slots.push(tx, false);
    }
    t.pool.on_new_txs(&t.core, &t.cancel, slots).unwrap();

    assert_eq!(t.pool.size(), (10 * 1024, 0, 0));
    // the lowest-priority candidate (tip 1) was the one discarded
    assert!(t.pool.status(&lowest.unwrap()).is_none());
    t.pool.check_consistency().unwrap();
}

#[test]
fn same_batch_twice_is_idempotent() {
    let t = setup();
    let a = Address::repeat_byte(4);
    let b = Address::repeat_byte(5);
    seed_account(&t.core, a, 0, BALANCE);
    seed_account(&t.core, b, 0, BALANCE);
    seed_block(&t.pool, &t.cancel, 1);

    let slots = batch(
        &[
            TxBuilder::new(a).build(),
            TxBuilder::new(a).nonce(1).build(),
            TxBuilder::new(b).fee_cap(60).build(),
        ],
        true,
    );
    t.pool.on_new_txs(&t.core, &t.cancel, slots.clone()).unwrap();

    let hashes = t.pool.resident_hashes();
    let statuses: Vec<_> = hashes.iter().map(|h| t.pool.status(h)).collect();
    let size = t.pool.size();
    let deletions = t.pool.deletion_queue_len();

    t.pool.on_new_txs(&t.core, &t.cancel, slots).unwrap();
    assert_eq!(t.pool.resident_hashes(), hashes);
    assert_eq!(hashes.iter().map(|h| t.pool.status(h)).collect::<Vec<_>>(), statuses);
    assert_eq!(t.pool.size(), size);
    assert_eq!(t.pool.deletion_queue_len(), deletions);
    t.pool.check_consistency().unwrap();
}

#[test]
fn reorg_round_trip_preserves_locality() {
    let t = setup();
    let sender = Address::repeat_byte(6);
    seed_account(&t.core, sender, 0, BALANCE);
    seed_block(&t.pool, &t.cancel, 1);

    let local = TxBuilder::new(sender).build();
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&[local.clone()], true)).unwrap();
    assert!(t.pool.id_hash_is_local(&local.id_hash));

    // the transaction is mined
    let mut mined_state = HashMap::new();
    mined_state.insert(sender, SenderInfo::new(1, alloy_primitives::U256::from(BALANCE)));
    t.pool
        .on_new_block(
            &t.cancel,
            &mined_state,
            TxSlots::default(),
            batch(&[local.clone()], false),
            TEST_PROTOCOL_BASE_FEE,
            TEST_PENDING_BASE_FEE,
            2,
            B256::with_last_byte(2),
        )
        .unwrap();
    assert!(t.pool.status(&local.id_hash).is_none());
    assert_eq!(t.pool.size(), (0, 0, 0));

    // the block is unwound; the bytes come back from the chain without any
    // locality information
    let mut unwound_state = HashMap::new();
    unwound_state.insert(sender, SenderInfo::new(0, alloy_primitives::U256::from(BALANCE)));
    t.pool
        .on_new_block(
            &t.cancel,
            &unwound_state,
            batch(&[local.clone()], false),
            TxSlots::default(),
            TEST_PROTOCOL_BASE_FEE,
            TEST_PENDING_BASE_FEE,
            1,
            B256::with_last_byte(1),
        )
        .unwrap();

    let status = t.pool.status(&local.id_hash).unwrap();
    assert_eq!(status.sub_pool, Some(SubPoolType::Pending));
    assert_eq!(status.marker, 0b11111, "locality must survive the round trip");
    assert!(t.pool.id_hash_is_local(&local.id_hash));
    t.pool.check_consistency().unwrap();
}

#[test]
fn mined_removal_drops_everything_up_to_the_mined_nonce() {
    let t = setup();
    let sender = Address::repeat_byte(7);
    seed_account(&t.core, sender, 0, BALANCE);
    seed_block(&t.pool, &t.cancel, 1);

    let txs: Vec<_> = (0..3).map(|n| TxBuilder::new(sender).nonce(n).build()).collect();
    t.pool.on_new_txs(&t.core, &t.cancel, batch(&txs, false)).unwrap();
    assert_eq!(t.pool.size(), (3, 0, 0));

    // a block mines nonces 0 and 1
    let mut state = HashMap::new();
    state.insert(sender, SenderInfo::new(2, alloy_primitives::U256::from(BALANCE)));
    t.pool
        .on_new_block(
            &t.cancel,
            &state,
            TxSlots::default(),
            batch(&txs[..2], false),
            TEST_PROTOCOL_BASE_FEE,
            TEST_PENDING_BASE_FEE,
            2,
            B256::with_last_byte(2),
        )
        .unwrap();

    assert_eq!(t.pool.size(), (1, 0, 0));
    let survivor = t.pool.status(&txs[2].id_hash).unwrap();
    assert_eq!(survivor.sub_pool, Some(SubPoolType::Pending));
    assert_eq!(survivor.marker, 0b11110);
    t.pool.check_consistency().unwrap();
}
