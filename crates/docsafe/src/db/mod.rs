//! Database module for the two local stores.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle.
//! All access is serialized through a `Mutex<Connection>`; the lock is only
//! held for the duration of a single operation.
//!
//! Two independent schemas live in separate files: the ingest store
//! (`emails`, `attachments`) and the normalization store (`xml_data`,
//! `meta_data`).

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod attachment_repo;
pub mod document_repo;
pub mod email_repo;
pub mod error;
pub mod migrations;

pub use error::DatabaseError;

/// Which set of tables a database file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// `emails` and `attachments`, written by the ingestor.
    Ingest,
    /// `xml_data` and `meta_data`, written by the PDF normalizer.
    Normalize,
}

impl Schema {
    fn migrations(self) -> &'static [migrations::Migration] {
        match self {
            Schema::Ingest => migrations::INGEST,
            Schema::Normalize => migrations::NORMALIZE,
        }
    }
}

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). All access is serialized through
/// a `Mutex`, which is fine for SQLite (which serializes writes anyway).
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    schema: Schema,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations for `schema`.
    pub fn open(path: &Path, schema: Schema) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn, schema.migrations())?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            schema,
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory(schema: Schema) -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn, schema.migrations())?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            schema,
        })
    }

    /// Re-applies any pending migrations. Safe to call repeatedly.
    pub fn ensure_schema(&self) -> Result<(), DatabaseError> {
        let migrations = self.schema.migrations();
        self.with_conn(|conn| migrations::run_all(conn, migrations))
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Starts a transaction on the shared connection.
    ///
    /// Every write issued through this handle until the returned guard is
    /// committed belongs to the transaction. Dropping the guard without
    /// calling [`Transaction::commit`] rolls everything back.
    pub fn begin(&self) -> Result<Transaction<'_>, DatabaseError> {
        self.with_conn(|conn| {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            Ok(())
        })?;
        Ok(Transaction {
            db: self,
            finished: false,
        })
    }
}

/// Guard for an open transaction, see [`Database::begin`].
pub struct Transaction<'db> {
    db: &'db Database,
    finished: bool,
}

impl Transaction<'_> {
    pub fn commit(mut self) -> Result<(), DatabaseError> {
        self.finished = true;
        self.db.with_conn(|conn| {
            conn.execute_batch("COMMIT")?;
            Ok(())
        })
    }

    pub fn rollback(mut self) -> Result<(), DatabaseError> {
        self.finished = true;
        self.db.with_conn(|conn| {
            conn.execute_batch("ROLLBACK")?;
            Ok(())
        })
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let result = self.db.with_conn(|conn| {
            conn.execute_batch("ROLLBACK")?;
            Ok(())
        });
        match result {
            Ok(()) => log::warn!("Transaction dropped without commit, rolled back"),
            Err(e) => log::error!("Failed to roll back transaction: {}", e),
        }
    }
}
