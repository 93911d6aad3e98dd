bitflags::bitflags! {
    /// Ordered bitset summarizing a transaction's eligibility, from which its
    /// sub-pool is derived.
    ///
    /// A higher value always outranks a lower one, so markers double as the
    /// most significant component of the priority order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SubPoolMarker: u8 {
        /// Set to `1` if the fee cap is no less than the in-protocol minimal
        /// base fee. A transaction without this bit can never be included
        /// into this particular chain.
        const ENOUGH_FEE_CAP_PROTOCOL = 0b10000;
        /// Set to `1` if all nonces between the sender's state nonce and this
        /// transaction's nonce are present in the pool.
        const NO_NONCE_GAPS = 0b01000;
        /// Set to `1` if the sender's balance covers `gas * fee_cap + value`
        /// of this transaction cumulated with all its required prior
        /// transactions.
        const ENOUGH_BALANCE = 0b00100;
        /// Set to `1` if the fee cap is no less than the base fee of the
        /// currently pending block.
        const ENOUGH_FEE_CAP_BLOCK = 0b00010;
        /// Set to `1` if the transaction was locally submitted.
        const IS_LOCAL = 0b00001;

        /// Minimum marker of a pending transaction.
        const PENDING_POOL_BITS = Self::ENOUGH_FEE_CAP_PROTOCOL.bits() |
            Self::NO_NONCE_GAPS.bits() |
            Self::ENOUGH_BALANCE.bits() |
            Self::ENOUGH_FEE_CAP_BLOCK.bits();

        /// Minimum marker of a base-fee transaction.
        const BASE_FEE_POOL_BITS = Self::ENOUGH_FEE_CAP_PROTOCOL.bits() |
            Self::NO_NONCE_GAPS.bits() |
            Self::ENOUGH_BALANCE.bits();

        /// Minimum marker of a queued transaction.
        const QUEUED_POOL_BITS = Self::ENOUGH_FEE_CAP_PROTOCOL.bits();
    }
}

// === impl SubPoolMarker ===

impl SubPoolMarker {
    /// Whether the transaction was locally submitted.
    #[inline]
    pub const fn is_local(&self) -> bool {
        self.bits() & Self::IS_LOCAL.bits() != 0
    }

    /// Whether the marker qualifies for the pending sub-pool.
    #[inline]
    pub(crate) const fn qualifies_for_pending(&self) -> bool {
        self.bits() >= Self::PENDING_POOL_BITS.bits()
    }

    /// Whether the marker qualifies for the base-fee sub-pool or better.
    #[inline]
    pub(crate) const fn qualifies_for_base_fee(&self) -> bool {
        self.bits() >= Self::BASE_FEE_POOL_BITS.bits()
    }

    /// Whether the marker qualifies for the queued sub-pool or better.
    #[inline]
    pub(crate) const fn qualifies_for_queued(&self) -> bool {
        self.bits() >= Self::QUEUED_POOL_BITS.bits()
    }
}

/// Identifier for the sub-pool a transaction currently resides in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SubPoolType {
    /// Candidates for immediate inclusion.
    Pending,
    /// Would become candidates should the base fee drop slightly.
    BaseFee,
    /// Long-horizon residents.
    Queued,
}

impl From<SubPoolMarker> for SubPoolType {
    fn from(marker: SubPoolMarker) -> Self {
        if marker.qualifies_for_pending() {
            return SubPoolType::Pending
        }
        if marker.qualifies_for_base_fee() {
            return SubPoolType::BaseFee
        }
        SubPoolType::Queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_thresholds() {
        assert_eq!(SubPoolMarker::PENDING_POOL_BITS.bits(), 0b11110);
        assert_eq!(SubPoolMarker::BASE_FEE_POOL_BITS.bits(), 0b11100);
        assert_eq!(SubPoolMarker::QUEUED_POOL_BITS.bits(), 0b10000);

        let full = SubPoolMarker::all();
        assert!(full.qualifies_for_pending());
        assert!(full.is_local());

        let no_block_fee = SubPoolMarker::ENOUGH_FEE_CAP_PROTOCOL |
            SubPoolMarker::NO_NONCE_GAPS |
            SubPoolMarker::ENOUGH_BALANCE;
        assert!(!no_block_fee.qualifies_for_pending());
        assert!(no_block_fee.qualifies_for_base_fee());
    }

    #[test]
    fn sub_pool_derivation() {
        assert_eq!(SubPoolType::from(SubPoolMarker::all()), SubPoolType::Pending);
        assert_eq!(
            SubPoolType::from(SubPoolMarker::PENDING_POOL_BITS),
            SubPoolType::Pending
        );
        assert_eq!(
            SubPoolType::from(SubPoolMarker::BASE_FEE_POOL_BITS | SubPoolMarker::IS_LOCAL),
            SubPoolType::BaseFee
        );
        assert_eq!(SubPoolType::from(SubPoolMarker::empty()), SubPoolType::Queued);
        assert_eq!(
            SubPoolType::from(SubPoolMarker::QUEUED_POOL_BITS),
            SubPoolType::Queued
        );
    }
}
