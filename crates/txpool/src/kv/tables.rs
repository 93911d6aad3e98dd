//! Declaration of all buckets the pool reads or writes.
//!
//! The pool-owned bucket names and value layouts are fixed for layout
//! compatibility; the chain-side buckets are read-only views into the
//! backend the pool shares its engine with.

use crate::{
    identifier::SenderId,
    kv::{Decode, DbTx, Encode, DatabaseError},
    senders::SenderInfo,
};
use alloy_primitives::{Address, Bytes, B256, U256};

/// Macro to declare a typed bucket.
macro_rules! table {
    ($(#[$docs:meta])+ ( $table_name:ident ) $key:ty => $value:ty) => {
        $(#[$docs])+
        ///
        #[doc = concat!("Takes [`", stringify!($key), "`] as a key and returns [`", stringify!($value), "`].")]
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $table_name;

        impl $crate::kv::Table for $table_name {
            const NAME: &'static str = stringify!($table_name);
            type Key = $key;
            type Value = $value;
        }

        impl std::fmt::Display for $table_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", stringify!($table_name))
            }
        }
    };
}

//
//  POOL-OWNED BUCKETS
//

table!(
    /// Raw bytes of every durably written pooled transaction, keyed by
    /// identity hash.
    ( PooledTransaction ) B256 => StoredTransaction
);

table!(
    /// Canonical address to sender-id mapping.
    ( PooledSenderID ) Address => SenderId
);

table!(
    /// Inverse of [`PooledSenderID`].
    ( PooledSenderIDToAddress ) SenderId => Address
);

table!(
    /// Last known `(nonce, balance)` per sender-id.
    ( PooledSender ) SenderId => SenderInfo
);

table!(
    /// Per commit-id list of senders whose discards at that commit left them
    /// with no resident transactions. Revisited on later flushes to clean the
    /// sender tables.
    ( PoolStateEviction ) u64 => SenderIdList
);

table!(
    /// Singleton pool metadata, see the `*_KEY` constants.
    ( PoolInfo ) Vec<u8> => Vec<u8>
);

table!(
    /// Monotone-keyed list of identity hashes of transactions that were ever
    /// local.
    ( RecentLocalTransaction ) u64 => B256
);

//
//  CHAIN-SIDE BUCKETS (read-only)
//

table!(
    /// Current account state of the chain backend, reduced to the fields the
    /// pool consumes.
    ( PlainState ) Address => SenderInfo
);

table!(
    /// Canonical header hash per block height.
    ( HeaderCanonical ) u64 => B256
);

table!(
    /// Accounts changed per block, keyed by `(height, address)`.
    ( AccountChangeSet ) ChangeSetKey => Address
);

table!(
    /// Highest synced block per named sync stage.
    ( SyncStageProgress ) Vec<u8> => u64
);

/// [`PoolInfo`] key: block height the sender cache was reconciled at.
pub const SENDER_CACHE_HEIGHT_KEY: &[u8] = b"sender_cache_block_height";
/// [`PoolInfo`] key: block hash the sender cache was reconciled at.
pub const SENDER_CACHE_HASH_KEY: &[u8] = b"sender_cache_block_hash";
/// [`PoolInfo`] key: last allocated sender id.
pub const SENDER_CACHE_ID_KEY: &[u8] = b"sender_cache_id";
/// [`PoolInfo`] key: commit counter, incremented on every flush.
pub const SENDER_COMMIT_ID_KEY: &[u8] = b"sender_commit_id";
/// [`PoolInfo`] key: unix time of the last flush.
pub const SENDER_COMMIT_TIME_KEY: &[u8] = b"sender_commit_time";
/// [`PoolInfo`] key: pending-block base fee.
pub const PENDING_BASE_FEE_KEY: &[u8] = b"pending_base_fee";
/// [`PoolInfo`] key: protocol base fee.
pub const PROTOCOL_BASE_FEE_KEY: &[u8] = b"protocol_base_fee";

/// The name of the sync stage the chain backend reports overall progress
/// under.
pub const FINISH_STAGE: &[u8] = b"Finish";

/// Value layout of [`PooledTransaction`]:
/// `u64_be sender_id || u64_be reserved_zero || raw tx bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTransaction {
    /// Sender id the raw bytes resolve to.
    pub sender_id: SenderId,
    /// Raw encoded transaction bytes.
    pub rlp: Bytes,
}

/// Value layout of [`PoolStateEviction`]: concatenated `u64_be` sender ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderIdList(pub Vec<SenderId>);

/// Key layout of [`AccountChangeSet`]: `u64_be height || address`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChangeSetKey {
    /// Block height the change was applied at.
    pub height: u64,
    /// The changed account.
    pub address: Address,
}

// === impl ChangeSetKey ===

impl ChangeSetKey {
    /// The smallest key of `height`, used as a range start.
    pub const fn first_at(height: u64) -> Self {
        Self { height, address: Address::ZERO }
    }
}

//
//  CODECS
//

impl Encode for u64 {
    type Encoded = [u8; 8];

    fn encode(self) -> Self::Encoded {
        self.to_be_bytes()
    }
}

impl Decode for u64 {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        let bytes: [u8; 8] =
            value.try_into().map_err(|_| DatabaseError::Decode("expected 8 byte integer"))?;
        Ok(u64::from_be_bytes(bytes))
    }
}

impl Encode for SenderId {
    type Encoded = [u8; 8];

    fn encode(self) -> Self::Encoded {
        self.value().to_be_bytes()
    }
}

impl Decode for SenderId {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        u64::decode(value).map(Self::new)
    }
}

impl Encode for Address {
    type Encoded = Self;

    fn encode(self) -> Self::Encoded {
        self
    }
}

impl Decode for Address {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        if value.len() != Self::len_bytes() {
            return Err(DatabaseError::Decode("expected 20 byte address"))
        }
        Ok(Self::from_slice(value))
    }
}

impl Encode for B256 {
    type Encoded = Self;

    fn encode(self) -> Self::Encoded {
        self
    }
}

impl Decode for B256 {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        if value.len() != Self::len_bytes() {
            return Err(DatabaseError::Decode("expected 32 byte hash"))
        }
        Ok(Self::from_slice(value))
    }
}

impl Encode for Vec<u8> {
    type Encoded = Self;

    fn encode(self) -> Self::Encoded {
        self
    }
}

impl Decode for Vec<u8> {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        Ok(value.to_vec())
    }
}

// `u64_be nonce || big-endian balance (<= 32 B)`
impl Encode for SenderInfo {
    type Encoded = Vec<u8>;

    fn encode(self) -> Self::Encoded {
        let balance = self.balance.to_be_bytes_trimmed_vec();
        let mut out = Vec::with_capacity(8 + balance.len());
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(&balance);
        out
    }
}

impl Decode for SenderInfo {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        if value.len() < 8 || value.len() > 8 + 32 {
            return Err(DatabaseError::Decode("malformed sender record"))
        }
        let nonce = u64::decode(&value[..8])?;
        Ok(Self { nonce, balance: U256::from_be_slice(&value[8..]) })
    }
}

impl Encode for StoredTransaction {
    type Encoded = Vec<u8>;

    fn encode(self) -> Self::Encoded {
        let mut out = Vec::with_capacity(8 + 8 + self.rlp.len());
        out.extend_from_slice(&self.sender_id.value().to_be_bytes());
        out.extend_from_slice(&0u64.to_be_bytes());
        out.extend_from_slice(&self.rlp);
        out
    }
}

impl Decode for StoredTransaction {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        if value.len() < 16 {
            return Err(DatabaseError::Decode("malformed stored transaction"))
        }
        let sender_id = SenderId::decode(&value[..8])?;
        Ok(Self { sender_id, rlp: Bytes::copy_from_slice(&value[16..]) })
    }
}

impl Encode for SenderIdList {
    type Encoded = Vec<u8>;

    fn encode(self) -> Self::Encoded {
        let mut out = Vec::with_capacity(8 * self.0.len());
        for id in self.0 {
            out.extend_from_slice(&id.value().to_be_bytes());
        }
        out
    }
}

impl Decode for SenderIdList {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        if value.len() % 8 != 0 {
            return Err(DatabaseError::Decode("malformed sender id list"))
        }
        value.chunks_exact(8).map(SenderId::decode).collect::<Result<Vec<_>, _>>().map(Self)
    }
}

impl Encode for ChangeSetKey {
    type Encoded = [u8; 28];

    fn encode(self) -> Self::Encoded {
        let mut out = [0u8; 28];
        out[..8].copy_from_slice(&self.height.to_be_bytes());
        out[8..].copy_from_slice(self.address.as_slice());
        out
    }
}

impl Decode for ChangeSetKey {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        if value.len() != 28 {
            return Err(DatabaseError::Decode("malformed change-set key"))
        }
        Ok(Self { height: u64::decode(&value[..8])?, address: Address::from_slice(&value[8..]) })
    }
}

/// Reads a big-endian `u64` entry of [`PoolInfo`].
pub(crate) fn get_info_u64(tx: &impl DbTx, key: &[u8]) -> Result<Option<u64>, DatabaseError> {
    match tx.get::<PoolInfo>(key.to_vec())? {
        Some(v) => u64::decode(&v).map(Some),
        None => Ok(None),
    }
}
