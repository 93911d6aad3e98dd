//! Transaction pool errors.

use crate::{identifier::SenderId, kv::DatabaseError};

/// Transaction pool result type.
pub type PoolResult<T> = Result<T, PoolError>;

/// All errors the transaction pool can throw.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The parser rejected an inbound transaction encoding.
    #[error("malformed transaction encoding")]
    Malformed,
    /// An entry point was called before the first block notification supplied
    /// base fees. The caller may retry once the pool has started.
    #[error("base fees not initialized: protocol={protocol}, pending={pending}")]
    BaseFeeNotReady {
        /// Current protocol base fee.
        protocol: u64,
        /// Current pending-block base fee.
        pending: u64,
    },
    /// A programmer-visible intake invariant was breached; the event is
    /// rejected and the pool state is unchanged.
    #[error("intake violation: {0}")]
    Intake(&'static str),
    /// A sender referenced by a resident transaction was not loaded in
    /// advance. Fatal: the intake path failed to preload account facts.
    #[error("sender {0} not loaded in advance")]
    SenderNotPreloaded(SenderId),
    /// Chain backend or persistent store failure, surfaced to the caller with
    /// in-memory state unchanged.
    #[error(transparent)]
    Backend(#[from] DatabaseError),
    /// A debug-build consistency check failed.
    #[error("pool invariant violated: {0}")]
    Invariant(&'static str),
}
