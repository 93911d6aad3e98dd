use std::fmt;

/// A dense internal identifier for a transaction sender.
///
/// Ids are allocated once per address by the sender cache, are monotonically
/// increasing and are never reused. They are the primary key of every
/// in-memory index, replacing the 20-byte address on hot paths.
///
/// `0` is reserved as the unassigned sentinel: a transaction entering the
/// pool carries it until intake resolves the sender.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SenderId(u64);

// === impl SenderId ===

impl SenderId {
    /// The sentinel carried by transactions whose sender is not resolved yet.
    pub const UNASSIGNED: Self = Self(0);

    /// Wraps a raw id value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Whether this is the unassigned sentinel.
    pub const fn is_unassigned(&self) -> bool {
        self.0 == 0
    }

    /// Returns the raw id value.
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SenderId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A unique identifier of a resident transaction: the `(sender-id, nonce)`
/// pair.
///
/// The derived ordering sorts by sender first and nonce second, so a range
/// scan over identifiers yields one sender's transactions in ascending nonce
/// order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TransactionId {
    /// Sender of this transaction.
    pub sender: SenderId,
    /// Nonce of this transaction.
    pub nonce: u64,
}

// === impl TransactionId ===

impl TransactionId {
    /// Create a new identifier pair.
    pub const fn new(sender: SenderId, nonce: u64) -> Self {
        Self { sender, nonce }
    }

    /// The smallest identifier belonging to `sender`, used as a range start.
    pub(crate) const fn first_for_sender(sender: SenderId) -> Self {
        Self::new(sender, 0)
    }
}
