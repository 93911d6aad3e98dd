#![warn(missing_debug_implementations, missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]

//! A standalone Ethereum-style transaction pool.
//!
//! The pool keeps every resident transaction in an arena of scored records,
//! indexed by identity hash and by `(sender-id, nonce)`, and distributed
//! over three sub-pools:
//!
//! - `Pending`: candidates for immediate inclusion in the next block,
//! - `BaseFee`: candidates should the base fee drop slightly,
//! - `Queued`: long-horizon residents with nonce gaps or missing funds.
//!
//! Each sub-pool is a pair of heaps over the same records, exposing its best
//! and worst element in O(log n). A five-bit marker per transaction,
//! recomputed whenever the sender's state changes, decides membership; the
//! promotion pass moves transactions between the sub-pools until every
//! marker band and capacity limit holds again.
//!
//! Pool state is durably persisted across restarts and reconciled against
//! the chain backend on recovery. The peer transport, the transaction
//! parser, the chain backend and the key-value engine are collaborators
//! behind traits.

pub mod config;
pub mod error;
mod identifier;
pub mod kv;
mod maintain;
pub mod metrics;
pub mod pool;
mod senders;
mod traits;
mod transaction;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::{
    config::PoolConfig,
    error::{PoolError, PoolResult},
    identifier::{SenderId, TransactionId},
    maintain::maintain_pool,
    pool::{SubPoolMarker, SubPoolType, TxPool},
    senders::{SenderCache, SenderInfo},
    traits::{Broadcaster, PeerId, TransactionParser},
    transaction::{TxSlot, TxSlots},
};
