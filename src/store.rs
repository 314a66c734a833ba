#![forbid(unsafe_code)]

//! File-backed relational store for collected show data. Unlike a fixed
//! metadata schema, tables here are created from caller-supplied column
//! definitions and rows are appended positionally, so the same store serves
//! any show layout the binaries decide on.

use crate::logger::ErrorLog;
use libsql::{Builder, Connection, Value, params};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not open store: {0}")]
    Open(String),
    #[error("DDL failed: {0}")]
    Ddl(String),
    #[error("insert failed: {0}")]
    Insert(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("store connection is closed")]
    Closed,
}

/// Materialized result of an ad-hoc read query.
#[derive(Debug, Clone, Default)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

async fn configure_connection(conn: &Connection) -> Result<(), StoreError> {
    // libsql's execute path rejects statements that return rows, and
    // `PRAGMA journal_mode=WAL` returns one, so issue the pragmas as queries.
    conn.query("PRAGMA journal_mode=WAL", params![])
        .await
        .map_err(|err| StoreError::Open(err.to_string()))?;
    conn.query("PRAGMA synchronous=NORMAL", params![])
        .await
        .map_err(|err| StoreError::Open(err.to_string()))?;
    Ok(())
}

/// Wrapper around the SQLite-compatible connection. The caller owns the
/// store's lifetime and releases it with [`VideoStore::close`]; every
/// operation after that reports [`StoreError::Closed`].
pub struct VideoStore {
    conn: Option<Connection>,
    log: Option<ErrorLog>,
}

impl VideoStore {
    /// Opens (and if necessary creates) the database at `path`, including its
    /// parent directory.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|err| {
                StoreError::Open(format!("creating {}: {err}", parent.display()))
            })?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|err| StoreError::Open(format!("opening {}: {err}", path.display())))?;
        let conn = db
            .connect()
            .map_err(|err| StoreError::Open(err.to_string()))?;
        configure_connection(&conn).await?;

        Ok(Self {
            conn: Some(conn),
            log: None,
        })
    }

    /// Attaches the owning component's log so degenerate operations (like an
    /// empty insert batch) leave a trace in the same place failures do.
    pub fn with_error_log(mut self, log: ErrorLog) -> Self {
        self.log = Some(log);
        self
    }

    fn conn(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    /// Create-if-absent DDL from a caller-supplied column list, e.g.
    /// `"video_id TEXT, title TEXT, view_count INTEGER"`. Idempotent.
    pub async fn create_table(&self, name: &str, column_schema: &str) -> Result<(), StoreError> {
        self.conn()?
            .execute(
                &format!("CREATE TABLE IF NOT EXISTS {name} ({column_schema})"),
                params![],
            )
            .await
            .map_err(|err| StoreError::Ddl(err.to_string()))?;
        Ok(())
    }

    /// Bulk-appends rows positionally against the table's declared column
    /// order, one implicit transaction per batch. An empty batch is a no-op.
    /// There is no dedup: reinserting the same key duplicates the row.
    pub async fn insert_rows(&self, name: &str, rows: &[Vec<Value>]) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let Some(first) = rows.first() else {
            if let Some(log) = &self.log {
                log.error(&format!("Row batch for '{name}' is empty. Nothing to insert."));
            }
            return Ok(0);
        };

        let width = first.len();
        if let Some(bad) = rows.iter().find(|row| row.len() != width) {
            return Err(StoreError::Insert(format!(
                "row width mismatch: expected {width} values, got {}",
                bad.len()
            )));
        }

        let placeholders = vec!["?"; width].join(", ");
        let sql = format!("INSERT INTO {name} VALUES ({placeholders})");

        let tx = conn
            .transaction()
            .await
            .map_err(|err| StoreError::Insert(err.to_string()))?;
        for row in rows {
            tx.execute(&sql, row.clone())
                .await
                .map_err(|err| StoreError::Insert(err.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|err| StoreError::Insert(err.to_string()))?;
        Ok(rows.len())
    }

    /// Runs an arbitrary read query and materializes the full result.
    pub async fn query(&self, sql: &str) -> Result<QueryTable, StoreError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(sql, params![])
            .await
            .map_err(|err| StoreError::Query(err.to_string()))?;

        let column_count = rows.column_count();
        let columns: Vec<String> = (0..column_count)
            .map(|i| rows.column_name(i).unwrap_or("?").to_string())
            .collect();

        let mut table = QueryTable {
            columns,
            rows: Vec::new(),
        };
        while let Some(row) = rows
            .next()
            .await
            .map_err(|err| StoreError::Query(err.to_string()))?
        {
            let mut values = Vec::with_capacity(column_count as usize);
            for i in 0..column_count {
                values.push(
                    row.get_value(i)
                        .map_err(|err| StoreError::Query(err.to_string()))?,
                );
            }
            table.rows.push(values);
        }
        Ok(table)
    }

    /// Releases the connection. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.conn.take();
    }
}
