//! [`SqliteStore`]: the SQLite implementation of [`StorageBackend`].

use super::schema::{
    CONNECTION_PRAGMAS, CREATE_SCHEMA, DANGLING_ASSOCIATIONS, DROP_SCHEMA, INSERT_ASSOCIATION, INSERT_ITEM, INSERT_STORE,
    INSERT_TRANSACTION,
};
use super::{SchemaMode, StorageBackend, Table};
use crate::model::{Association, Item, Store, Transaction};
use anyhow::{Context, Result};
use rusqlite::{params, CachedStatement, Connection};
use std::path::{Path, PathBuf};

/// Target for statement tracing when echo is on.
const SQL_LOG_TARGET: &str = "liquor_etl::sql";

fn log_statement(sql: &str) {
    tracing::debug!(target: SQL_LOG_TARGET, "{}", sql.trim());
}

/// A liquor sales database in a single SQLite file (or in memory).
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. With `echo`, every executed statement is
    /// logged at debug level under the `liquor_etl::sql` target.
    pub fn open(path: impl AsRef<Path>, echo: bool) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let conn = Connection::open(path).with_context(|| format!("open database {}", path.display()))?;
        Self::configure(conn, Some(path.to_path_buf()), echo)
    }

    /// Open an in-memory database, useful for testing.
    pub fn open_in_memory(echo: bool) -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        Self::configure(conn, None, echo)
    }

    fn configure(mut conn: Connection, path: Option<PathBuf>, echo: bool) -> Result<Self> {
        if echo {
            conn.trace(Some(log_statement as fn(&str)));
        }
        conn.execute_batch(CONNECTION_PRAGMAS).context("apply connection pragmas")?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Underlying connection, for ad-hoc reads.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert `rows` with one cached statement inside one transaction.
    /// The transaction rolls back on drop if any row fails.
    fn insert_rows<T>(
        &mut self,
        sql: &str,
        rows: &[T],
        bind: impl Fn(&mut CachedStatement<'_>, &T) -> rusqlite::Result<usize>,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction().context("begin transaction")?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare_cached(sql)?;
            for row in rows {
                inserted += bind(&mut stmt, row)?;
            }
        }
        tx.commit().context("commit")?;
        Ok(inserted)
    }
}

impl StorageBackend for SqliteStore {
    fn setup_schema(&mut self, mode: SchemaMode) -> Result<()> {
        let tx = self.conn.transaction()?;
        if mode == SchemaMode::Rebuild {
            tx.execute_batch(DROP_SCHEMA).context("drop tables")?;
        }
        tx.execute_batch(CREATE_SCHEMA).context("create tables")?;
        tx.commit()?;
        Ok(())
    }

    fn insert_items(&mut self, items: &[Item]) -> Result<usize> {
        self.insert_rows(INSERT_ITEM, items, |stmt, i| {
            stmt.execute(params![
                i.number,
                i.bottle_volume,
                i.category,
                i.category_name,
                i.description,
                i.pack,
                i.vendor_name,
                i.vendor_number,
            ])
        })
        .context("insert items")
    }

    fn insert_stores(&mut self, stores: &[Store]) -> Result<usize> {
        self.insert_rows(INSERT_STORE, stores, |stmt, s| {
            stmt.execute(params![
                s.number,
                s.address,
                s.city,
                s.county,
                s.county_number,
                s.location,
                s.longitude,
                s.latitude,
                s.name,
                s.zip_code,
            ])
        })
        .context("insert stores")
    }

    fn insert_transactions(&mut self, transactions: &[Transaction]) -> Result<usize> {
        self.insert_rows(INSERT_TRANSACTION, transactions, |stmt, t| {
            stmt.execute(params![
                t.number,
                t.bottle_cost,
                t.bottle_retail,
                t.bottles_sold,
                t.date.to_string(),
                t.gallons_sold,
                t.liters_sold,
                t.total_sale,
                t.item_number,
                t.store_number,
            ])
        })
        .context("insert transactions")
    }

    fn insert_associations(&mut self, links: &[Association]) -> Result<usize> {
        self.insert_rows(INSERT_ASSOCIATION, links, |stmt, a| {
            stmt.execute(params![a.transaction_number, a.store_number, a.item_number])
        })
        .context("insert associations")
    }

    fn count(&self, table: Table) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.sql_name());
        let n: i64 = self
            .conn
            .query_row(&sql, [], |r| r.get(0))
            .with_context(|| format!("count {}", table))?;
        Ok(n as u64)
    }

    fn dangling_associations(&self) -> Result<u64> {
        let mut stmt = self.conn.prepare(DANGLING_ASSOCIATIONS)?;
        // One result row per broken reference; a link can break up to three.
        let mut rowids = ahash::AHashSet::new();
        let mut rows = stmt.query([]).context("foreign key check on stores_items")?;
        while let Some(row) = rows.next()? {
            let rowid: Option<i64> = row.get(1)?;
            rowids.extend(rowid);
        }
        Ok(rowids.len() as u64)
    }
}
