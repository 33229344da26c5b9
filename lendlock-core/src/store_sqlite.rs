//! SQLite-backed ReplicatedStore implementation.
//! A durable single-node backend: every consistency level is satisfied by
//! the one local copy, and conditional writes run inside an immediate
//! transaction so the check and the write are atomic.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! lendlock-core = { path = "../lendlock-core", features = ["sqlite"] }
//! ```

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreResult;
use crate::store::{Condition, Consistency, Key, ReplicatedStore, Row, Table};

/// A persistent row store backed by SQLite.
///
/// Uses WAL mode for concurrent read performance.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent read performance
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::from_connection(conn)
    }

    /// A throwaway database that lives as long as the store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rows (
                tbl            TEXT NOT NULL,
                partition_key  TEXT NOT NULL,
                clustering_key TEXT NOT NULL,
                body           TEXT NOT NULL,
                PRIMARY KEY (tbl, partition_key, clustering_key)
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_row(conn: &Connection, key: &Key) -> StoreResult<Option<Row>> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM rows WHERE tbl = ?1 AND partition_key = ?2 AND clustering_key = ?3",
                params![key.table.name(), key.partition, key.clustering],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn write_row(conn: &Connection, key: &Key, row: &Row) -> StoreResult<()> {
        let body = serde_json::to_string(row)?;
        conn.execute(
            "INSERT INTO rows (tbl, partition_key, clustering_key, body) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (tbl, partition_key, clustering_key) DO UPDATE SET body = excluded.body",
            params![key.table.name(), key.partition, key.clustering, body],
        )?;
        Ok(())
    }

    fn remove_row(conn: &Connection, key: &Key) -> StoreResult<bool> {
        let removed = conn.execute(
            "DELETE FROM rows WHERE tbl = ?1 AND partition_key = ?2 AND clustering_key = ?3",
            params![key.table.name(), key.partition, key.clustering],
        )?;
        Ok(removed > 0)
    }

    fn immediate(conn: &mut Connection) -> StoreResult<Transaction<'_>> {
        Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Merge `update` into the stored row when `condition` holds.
    fn merge_if(&self, key: &Key, update: Row, condition: Option<&Condition>) -> StoreResult<bool> {
        let mut conn = self.conn();
        let tx = Self::immediate(&mut conn)?;
        let current = Self::read_row(&tx, key)?;
        if let Some(condition) = condition
            && !condition.holds(current.as_ref())
        {
            return Ok(false);
        }
        let mut merged = current.unwrap_or_default();
        merged.extend(update);
        Self::write_row(&tx, key, &merged)?;
        tx.commit()?;
        Ok(true)
    }
}

impl ReplicatedStore for SqliteStore {
    fn get(&self, key: &Key, _consistency: Consistency) -> StoreResult<Option<Row>> {
        Self::read_row(&self.conn(), key)
    }

    fn scan(
        &self,
        table: Table,
        partition: Option<&str>,
        _consistency: Consistency,
    ) -> StoreResult<Vec<(Key, Row)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT partition_key, clustering_key, body FROM rows
             WHERE tbl = ?1 AND (?2 IS NULL OR partition_key = ?2)
             ORDER BY partition_key, clustering_key",
        )?;
        let raw = stmt
            .query_map(params![table.name(), partition], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(partition, clustering, body)| -> StoreResult<(Key, Row)> {
                let row: Row = serde_json::from_str(&body)?;
                Ok((Key::new(table, partition, clustering), row))
            })
            .collect()
    }

    fn put(&self, key: &Key, row: Row, _consistency: Consistency) -> StoreResult<()> {
        self.merge_if(key, row, None).map(|_| ())
    }

    fn conditional_put(
        &self,
        key: &Key,
        row: Row,
        condition: &Condition,
        _consistency: Consistency,
    ) -> StoreResult<bool> {
        self.merge_if(key, row, Some(condition))
    }

    fn delete(&self, key: &Key, _consistency: Consistency) -> StoreResult<()> {
        Self::remove_row(&self.conn(), key).map(|_| ())
    }

    fn conditional_delete(
        &self,
        key: &Key,
        condition: &Condition,
        _consistency: Consistency,
    ) -> StoreResult<bool> {
        let mut conn = self.conn();
        let tx = Self::immediate(&mut conn)?;
        let current = Self::read_row(&tx, key)?;
        if !condition.holds(current.as_ref()) {
            return Ok(false);
        }
        let removed = Self::remove_row(&tx, key)?;
        tx.commit()?;
        Ok(removed)
    }
}
