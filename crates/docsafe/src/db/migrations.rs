//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order. ALTER TABLE ADD COLUMN migrations are handled
//! conditionally so that stores created by older tooling, which may
//! already carry the column, migrate cleanly.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
pub struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    /// Execute the SQL directly.
    Standard,
    /// ALTER TABLE ADD COLUMN, skipped if the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// Migrations for the ingest store (`emails`, `attachments`).
pub const INGEST: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_emails_table",
        sql: include_str!("sql/ingest_001_create_emails.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "create_attachments_table",
        sql: include_str!("sql/ingest_002_create_attachments.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 3,
        description: "add_email_sender_to_emails",
        sql: include_str!("sql/ingest_003_add_email_sender.sql"),
        kind: MigrationKind::AddColumn {
            table: "emails",
            column: "email_sender",
        },
    },
    Migration {
        version: 4,
        description: "add_account_to_emails",
        sql: include_str!("sql/ingest_004_add_account.sql"),
        kind: MigrationKind::AddColumn {
            table: "emails",
            column: "account",
        },
    },
];

/// Migrations for the normalization store (`xml_data`, `meta_data`).
pub const NORMALIZE: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_xml_data_table",
        sql: include_str!("sql/normalize_001_create_xml_data.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "create_meta_data_table",
        sql: include_str!("sql/normalize_002_create_meta_data.sql"),
        kind: MigrationKind::Standard,
    },
];

/// Runs all pending migrations from `migrations` on the given connection.
pub fn run_all(conn: &Connection, migrations: &[Migration]) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in migrations {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        let should_run = match &migration.kind {
            MigrationKind::Standard => true,
            MigrationKind::AddColumn { table, column } => !column_exists(conn, table, column)?,
        };

        if should_run {
            conn.execute_batch(migration.sql)
                .map_err(|e| DatabaseError::Migration {
                    version: migration.version,
                    reason: e.to_string(),
                })?;
        } else {
            log::info!(
                "Skipping migration v{} (column already present)",
                migration.version
            );
        }

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

/// Checks whether a column exists on a table using `PRAGMA table_info`.
fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DatabaseError::Migration {
            version: 0,
            reason: format!("Invalid table name: {}", table),
        });
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|r| r.map(|name| name == column).unwrap_or(false));
    Ok(exists)
}
