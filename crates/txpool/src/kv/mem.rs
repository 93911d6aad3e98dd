//! In-memory store used for testing and throwaway pools.

use crate::kv::{Database, DatabaseError, DbTx, DbTxMut, Decode, Encode, Table};
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

type Tables = BTreeMap<&'static str, BTreeMap<Vec<u8>, Vec<u8>>>;

/// An ordered in-memory store with copy-on-write transactions.
///
/// `update` stages its writes on a copy of the data and swaps the copy in
/// only when the closure succeeds, so a failed transaction leaves nothing
/// behind.
#[derive(Clone, Debug, Default)]
pub struct MemDb {
    data: Arc<RwLock<Tables>>,
}

/// Read-only view over a [`MemDb`].
#[derive(Debug)]
pub struct MemTx<'a> {
    tables: &'a Tables,
}

/// Read-write view over a [`MemDb`].
#[derive(Debug)]
pub struct MemTxMut<'a> {
    tables: &'a mut Tables,
}

fn raw<E: Encode>(value: E) -> Vec<u8> {
    let encoded = value.encode();
    let bytes: &[u8] = encoded.as_ref();
    bytes.to_vec()
}

trait View {
    fn tables(&self) -> &Tables;
}

impl View for MemTx<'_> {
    fn tables(&self) -> &Tables {
        self.tables
    }
}

impl View for MemTxMut<'_> {
    fn tables(&self) -> &Tables {
        self.tables
    }
}

impl<X: View> DbTx for X {
    fn get<T: Table>(&self, key: T::Key) -> Result<Option<T::Value>, DatabaseError> {
        match self.tables().get(T::NAME).and_then(|t| t.get(&raw(key))) {
            Some(v) => T::Value::decode(v).map(Some),
            None => Ok(None),
        }
    }

    fn has<T: Table>(&self, key: T::Key) -> Result<bool, DatabaseError> {
        Ok(self.tables().get(T::NAME).is_some_and(|t| t.contains_key(&raw(key))))
    }

    fn entries<T: Table>(&self) -> Result<usize, DatabaseError> {
        Ok(self.tables().get(T::NAME).map_or(0, |t| t.len()))
    }

    fn for_each<T: Table, E: From<DatabaseError>>(
        &self,
        from: Option<T::Key>,
        mut f: impl FnMut(T::Key, T::Value) -> Result<(), E>,
    ) -> Result<(), E> {
        let Some(table) = self.tables().get(T::NAME) else { return Ok(()) };
        let start = from.map(raw).unwrap_or_default();
        for (k, v) in table.range(start..) {
            f(T::Key::decode(k).map_err(E::from)?, T::Value::decode(v).map_err(E::from)?)?;
        }
        Ok(())
    }
}

impl DbTxMut for MemTxMut<'_> {
    fn put<T: Table>(&mut self, key: T::Key, value: T::Value) -> Result<(), DatabaseError> {
        self.tables.entry(T::NAME).or_default().insert(raw(key), raw(value));
        Ok(())
    }

    fn delete<T: Table>(&mut self, key: T::Key) -> Result<bool, DatabaseError> {
        Ok(self.tables.get_mut(T::NAME).is_some_and(|t| t.remove(&raw(key)).is_some()))
    }

    fn clear<T: Table>(&mut self) -> Result<(), DatabaseError> {
        self.tables.remove(T::NAME);
        Ok(())
    }
}

impl Database for MemDb {
    type Tx<'a> = MemTx<'a>;
    type TxMut<'a> = MemTxMut<'a>;

    fn view<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Self::Tx<'_>) -> Result<R, E>,
        E: From<DatabaseError>,
    {
        let guard = self.data.read();
        let tx = MemTx { tables: &guard };
        f(&tx)
    }

    fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Self::TxMut<'_>) -> Result<R, E>,
        E: From<DatabaseError>,
    {
        let mut guard = self.data.write();
        let mut staged = guard.clone();
        let res = f(&mut MemTxMut { tables: &mut staged });
        if res.is_ok() {
            *guard = staged;
        }
        res
    }
}
