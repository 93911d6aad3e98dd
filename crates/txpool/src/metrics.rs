//! Transaction pool metrics.

use metrics::{counter, describe_counter, Counter};

pub(crate) struct TxPoolMetrics {
    /// Transactions inserted into the pool.
    pub(crate) inserted_transactions: Counter,
    /// Transactions discarded by replacement, demotion or capacity.
    pub(crate) discarded_transactions: Counter,
    /// Transactions removed because they were mined.
    pub(crate) mined_transactions: Counter,
}

impl Default for TxPoolMetrics {
    fn default() -> Self {
        Self {
            inserted_transactions: counter!("transaction_pool.inserted_transactions"),
            discarded_transactions: counter!("transaction_pool.discarded_transactions"),
            mined_transactions: counter!("transaction_pool.mined_transactions"),
        }
    }
}

/// Describes the transaction pool metrics.
pub fn describe() {
    describe_counter!(
        "transaction_pool.inserted_transactions",
        "Number of transactions inserted into the pool"
    );
    describe_counter!(
        "transaction_pool.discarded_transactions",
        "Number of transactions discarded by replacement, demotion or capacity"
    );
    describe_counter!(
        "transaction_pool.mined_transactions",
        "Number of transactions removed from the pool because they were mined"
    );
}
