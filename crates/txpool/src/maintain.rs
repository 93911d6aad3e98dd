//! Pool maintenance: restore on startup, periodic flush and stats, and hash
//! broadcast fan-out.

use crate::{
    config::PoolConfig,
    kv::Database,
    pool::TxPool,
    traits::{Broadcaster, TransactionParser},
};
use alloy_primitives::B256;
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Splits announced hashes into local and remote buffers.
///
/// The two buffers are disjoint: local transactions go to all peers, remote
/// ones to a subset.
fn split_by_locality<DB: Database>(
    pool: &TxPool<DB>,
    hashes: Vec<B256>,
    local: &mut Vec<B256>,
    remote: &mut Vec<B256>,
) {
    local.clear();
    remote.clear();
    for hash in hashes {
        if pool.id_hash_is_local(&hash) {
            local.push(hash);
        } else {
            remote.push(hash);
        }
    }
}

/// Drives the pool until cancelled: restores it from the persistent store,
/// then fans announced hashes out to the broadcaster, flushes on the commit
/// ticker, logs stats and syncs pooled hashes to recently connected peers.
pub async fn maintain_pool<DB, C, P, B>(
    pool: Arc<TxPool<DB>>,
    core: C,
    mut parser: P,
    broadcaster: B,
    mut new_txs: mpsc::Receiver<Vec<B256>>,
    config: PoolConfig,
    cancel: CancellationToken,
) where
    DB: Database,
    C: Database,
    P: TransactionParser,
    B: Broadcaster,
{
    if let Err(err) = pool.restore(&core, &mut parser, &cancel) {
        error!(target: "txpool", %err, "failed to restore pool from db");
    }
    if let Err(err) = pool.log_stats() {
        warn!(target: "txpool", %err, "failed to log pool stats");
    }

    let mut commit = tokio::time::interval(config.commit_interval);
    let mut log = tokio::time::interval(config.log_interval);
    let mut sync_peers = tokio::time::interval(config.sync_to_new_peers_interval);

    let mut local_hashes = Vec::with_capacity(128);
    let mut remote_hashes = Vec::with_capacity(128);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = log.tick() => {
                if let Err(err) = pool.log_stats() {
                    warn!(target: "txpool", %err, "failed to log pool stats");
                }
            }
            _ = commit.tick() => {
                let started = Instant::now();
                match pool.flush() {
                    Ok(evicted) => {
                        info!(
                            target: "txpool",
                            evicted,
                            elapsed = ?started.elapsed(),
                            "flushed pool"
                        );
                    }
                    Err(err) => error!(target: "txpool", %err, "pool flush failed"),
                }
            }
            Some(hashes) = new_txs.recv() => {
                split_by_locality(&pool, hashes, &mut local_hashes, &mut remote_hashes);
                broadcaster.broadcast_local_pooled_txs(&local_hashes);
                broadcaster.broadcast_remote_pooled_txs(&remote_hashes);
            }
            _ = sync_peers.tick() => {
                let peers = pool.drain_new_peers();
                if peers.is_empty() {
                    continue
                }
                remote_hashes.clear();
                pool.append_all_hashes(&mut remote_hashes);
                broadcaster.propagate_pooled_txs_to_peers_list(&peers, &remote_hashes);
            }
        }
    }
}
