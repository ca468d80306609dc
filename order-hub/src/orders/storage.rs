//! redb-based storage layer for orders
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `(restaurant_id, order_id)` | `Order` (JSON) | Order documents, tenant-prefixed |
//! | `day_counters` | `(restaurant_id, date_key)` | `u64` | Per-restaurant, per-day order counter |
//! | `sequence_counter` | `"seq"` | `u64` | Global commit sequence |
//!
//! # Concurrency
//!
//! redb admits a single write transaction at a time, so a read-modify-write
//! inside one `WriteTransaction` is serializable. Readers see a consistent
//! MVCC snapshot and never block writers.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::order::Order;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::utils::IsTransient;

/// Orders: key = (restaurant_id, order_id), value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("orders");

/// Order number counters: key = (restaurant_id, date_key), value = last counter
const DAY_COUNTER_TABLE: TableDefinition<(&str, &str), u64> =
    TableDefinition::new("day_counters");

/// Global commit sequence: key = "seq"
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const SEQUENCE_KEY: &str = "seq";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Backing store unreachable (I/O), as opposed to bad data
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StorageError::Storage(redb::StorageError::Io(_))
                | StorageError::Database(redb::DatabaseError::Storage(
                    redb::StorageError::Io(_)
                ))
                | StorageError::Database(redb::DatabaseError::DatabaseAlreadyOpen)
        )
    }
}

impl IsTransient for StorageError {
    /// Transaction and commit failures may succeed when the whole
    /// transaction is replayed
    fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transaction(_) | StorageError::Commit(_))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Orders read together with the commit sequence they reflect
#[derive(Debug, Clone)]
pub struct SequencedOrders {
    pub orders: Vec<Order>,
    pub sequence: u64,
}

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for OrderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStorage").finish_non_exhaustive()
    }
}

impl OrderStorage {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, demo)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(DAY_COUNTER_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(SEQUENCE_KEY)?.is_none() {
                seq_table.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Sequence Operations ==========

    /// Increment and return the global commit sequence
    pub fn increment_sequence(&self, txn: &WriteTransaction) -> StorageResult<u64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert(SEQUENCE_KEY, next)?;
        Ok(next)
    }

    /// Get current sequence (read-only)
    pub fn get_current_sequence(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEQUENCE_TABLE)?;
        Ok(table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    // ========== Day Counter (order numbers) ==========

    /// Read `lastCounter` (0 if absent), write back `lastCounter + 1`, return it
    pub fn increment_day_counter(
        &self,
        txn: &WriteTransaction,
        restaurant_id: &str,
        date_key: &str,
    ) -> StorageResult<u64> {
        let mut table = txn.open_table(DAY_COUNTER_TABLE)?;
        let current = table
            .get((restaurant_id, date_key))?
            .map(|g| g.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert((restaurant_id, date_key), next)?;
        Ok(next)
    }

    /// Current counter value without incrementing
    pub fn get_day_counter(&self, restaurant_id: &str, date_key: &str) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DAY_COUNTER_TABLE)?;
        Ok(table
            .get((restaurant_id, date_key))?
            .map(|g| g.value())
            .unwrap_or(0))
    }

    // ========== Order Operations ==========

    /// Insert or replace an order document
    pub fn put_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(
            (order.restaurant_id.as_str(), order.id.as_str()),
            value.as_slice(),
        )?;
        Ok(())
    }

    /// Get an order (within transaction)
    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        restaurant_id: &str,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get((restaurant_id, order_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get an order by tenant and ID
    pub fn get_order(&self, restaurant_id: &str, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get((restaurant_id, order_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All orders of one restaurant (unordered)
    pub fn list_orders(&self, restaurant_id: &str) -> StorageResult<Vec<Order>> {
        Ok(self.list_orders_sequenced(restaurant_id)?.orders)
    }

    /// All orders of one restaurant plus the commit sequence of the same
    /// read snapshot
    pub fn list_orders_sequenced(&self, restaurant_id: &str) -> StorageResult<SequencedOrders> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        let seq_table = read_txn.open_table(SEQUENCE_TABLE)?;

        let sequence = seq_table
            .get(SEQUENCE_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0);

        let mut orders = Vec::new();
        for result in table.range((restaurant_id, "")..)? {
            let (key, value) = result?;
            if key.value().0 != restaurant_id {
                break;
            }
            let order: Order = serde_json::from_slice(value.value())?;
            orders.push(order);
        }

        Ok(SequencedOrders { orders, sequence })
    }

    /// Write undecodable bytes under an order key
    #[cfg(test)]
    pub(crate) fn put_raw(&self, restaurant_id: &str, order_id: &str, bytes: &[u8]) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            table.insert((restaurant_id, order_id), bytes)?;
        }
        txn.commit()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn remove_raw(&self, restaurant_id: &str, order_id: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            table.remove((restaurant_id, order_id))?;
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Statistics ==========

    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;
        let orders_table = read_txn.open_table(ORDERS_TABLE)?;
        let counter_table = read_txn.open_table(DAY_COUNTER_TABLE)?;
        let seq_table = read_txn.open_table(SEQUENCE_TABLE)?;

        Ok(StorageStats {
            order_count: orders_table.len()?,
            day_counter_count: counter_table.len()?,
            current_sequence: seq_table
                .get(SEQUENCE_KEY)?
                .map(|guard| guard.value())
                .unwrap_or(0),
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub order_count: u64,
    pub day_counter_count: u64,
    pub current_sequence: u64,
}
