//! Storage backend seam. The pipeline only talks to `StorageBackend`; `SqliteStore`
//! is the shipped implementation.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::model::{Association, Item, Store, Transaction};
use anyhow::Result;
use std::fmt;

/// How `setup_schema` treats existing tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaMode {
    /// Drop every table, then create them empty (full rebuild).
    Rebuild,
    /// Create missing tables, keep existing data (incremental / resume).
    CreateIfAbsent,
}

/// The four persisted tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Item,
    Store,
    Transaction,
    StoresItems,
}

impl Table {
    pub fn sql_name(self) -> &'static str {
        match self {
            Table::Item => "Item",
            Table::Store => "Store",
            Table::Transaction => "\"Transaction\"",
            Table::StoresItems => "stores_items",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name().trim_matches('"'))
    }
}

/// Bulk-write contract the pipeline relies on.
///
/// Every `insert_*` call is one atomic commit: either all rows of the batch are applied
/// or none are. The return value is the number of rows actually inserted; rows the
/// backend ignored (duplicate keys) are not counted.
pub trait StorageBackend {
    fn setup_schema(&mut self, mode: SchemaMode) -> Result<()>;
    fn insert_items(&mut self, items: &[Item]) -> Result<usize>;
    fn insert_stores(&mut self, stores: &[Store]) -> Result<usize>;
    fn insert_transactions(&mut self, transactions: &[Transaction]) -> Result<usize>;
    fn insert_associations(&mut self, links: &[Association]) -> Result<usize>;
    fn count(&self, table: Table) -> Result<u64>;
    /// Association rows whose transaction, store or item was never written.
    fn dangling_associations(&self) -> Result<u64>;
}

/// A record kind the batch writer can flush: routes a homogeneous batch to the
/// matching `StorageBackend` method.
pub trait Insertable: Sized + Send {
    const TABLE: Table;
    fn insert_batch<S: StorageBackend + ?Sized>(store: &mut S, batch: &[Self]) -> Result<usize>;
}

impl Insertable for Item {
    const TABLE: Table = Table::Item;
    fn insert_batch<S: StorageBackend + ?Sized>(store: &mut S, batch: &[Self]) -> Result<usize> {
        store.insert_items(batch)
    }
}

impl Insertable for Store {
    const TABLE: Table = Table::Store;
    fn insert_batch<S: StorageBackend + ?Sized>(store: &mut S, batch: &[Self]) -> Result<usize> {
        store.insert_stores(batch)
    }
}

impl Insertable for Transaction {
    const TABLE: Table = Table::Transaction;
    fn insert_batch<S: StorageBackend + ?Sized>(store: &mut S, batch: &[Self]) -> Result<usize> {
        store.insert_transactions(batch)
    }
}

impl Insertable for Association {
    const TABLE: Table = Table::StoresItems;
    fn insert_batch<S: StorageBackend + ?Sized>(store: &mut S, batch: &[Self]) -> Result<usize> {
        store.insert_associations(batch)
    }
}
