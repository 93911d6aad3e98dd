//! Minimal abstraction over an ordered, transactional key-value store.
//!
//! The pool persists its state into named buckets of an ordered map and
//! shares the engine with the chain backend for reads. Everything the pool
//! needs is covered by point lookups, ascending scans and closure-scoped
//! transactions, so that is all this abstraction exposes.

use std::fmt::Debug;

pub mod mem;
pub mod tables;

pub use mem::MemDb;

/// Errors of the underlying key-value engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseError {
    /// A read failed.
    #[error("database read failed: {0}")]
    Read(&'static str),
    /// A write failed.
    #[error("database write failed: {0}")]
    Write(&'static str),
    /// A stored value could not be decoded.
    #[error("corrupt database value: {0}")]
    Decode(&'static str),
}

/// Transforms the data to be saved in the store.
pub trait Encode: Send + Sync + Sized + Debug {
    /// Encoded representation.
    type Encoded: AsRef<[u8]> + Send + Sync;

    /// Encodes data going into the store.
    fn encode(self) -> Self::Encoded;
}

/// Transforms the data read from the store.
pub trait Decode: Send + Sync + Sized + Debug {
    /// Decodes data coming out of the store.
    fn decode(value: &[u8]) -> Result<Self, DatabaseError>;
}

/// A typed bucket of the store.
///
/// [`Table::Key`] ordering must be preserved by [`Encode`], so that scans in
/// encoded-byte order equal scans in key order.
pub trait Table: Send + Sync + Debug + 'static {
    /// Bucket name as present inside the store.
    const NAME: &'static str;
    /// Key element of the table.
    type Key: Encode + Decode;
    /// Value element of the table.
    type Value: Encode + Decode;
}

/// Read-only transaction over the store.
pub trait DbTx {
    /// Returns the value for `key`, if present.
    fn get<T: Table>(&self, key: T::Key) -> Result<Option<T::Value>, DatabaseError>;

    /// Whether `key` is present.
    fn has<T: Table>(&self, key: T::Key) -> Result<bool, DatabaseError>;

    /// Number of entries in the table.
    fn entries<T: Table>(&self) -> Result<usize, DatabaseError>;

    /// Ascending scan over the table, starting at `from` (inclusive) when
    /// given.
    fn for_each<T: Table, E: From<DatabaseError>>(
        &self,
        from: Option<T::Key>,
        f: impl FnMut(T::Key, T::Value) -> Result<(), E>,
    ) -> Result<(), E>;
}

/// Read-write transaction over the store.
pub trait DbTxMut: DbTx {
    /// Inserts or replaces the value for `key`.
    fn put<T: Table>(&mut self, key: T::Key, value: T::Value) -> Result<(), DatabaseError>;

    /// Deletes the entry for `key`, reporting whether it existed.
    fn delete<T: Table>(&mut self, key: T::Key) -> Result<bool, DatabaseError>;

    /// Removes every entry of the table.
    fn clear<T: Table>(&mut self) -> Result<(), DatabaseError>;
}

/// Handle to a store that can run closure-scoped read and write
/// transactions.
///
/// `update` is all-or-nothing: when the closure returns an error nothing of
/// what it wrote becomes visible.
pub trait Database: Send + Sync {
    /// Read-only transaction type.
    type Tx<'a>: DbTx
    where
        Self: 'a;
    /// Read-write transaction type.
    type TxMut<'a>: DbTxMut
    where
        Self: 'a;

    /// Runs `f` inside a read-only transaction.
    fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Self::Tx<'_>) -> Result<R, E>,
        E: From<DatabaseError>;

    /// Runs `f` inside a read-write transaction, committing on success.
    fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Self::TxMut<'_>) -> Result<R, E>,
        E: From<DatabaseError>;
}
