//! Message repository: operations on the ingest store's `emails` table.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// Stored layout used by earlier stores (`2024-03-01 09:15:00+01:00`).
const LEGACY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Data for a new message row. The body starts empty and is filled in
/// with [`update_body`] as parts are decoded.
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub external_id: &'a str,
    pub subject: &'a str,
    pub date: DateTime<Utc>,
    pub sender: Option<&'a str>,
    pub account: &'a str,
}

/// A raw message row from the database.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub external_id: String,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub body: Option<String>,
    pub sender: Option<String>,
    pub account: Option<String>,
}

/// Formats a timestamp the way it is stored in `email_date`.
pub fn format_stored_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses a stored `email_date` value (RFC 3339 or the legacy layout).
pub fn parse_stored_date(value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, LEGACY_DATE_FORMAT) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    Err(DatabaseError::InvalidValue {
        column: "email_date",
        value: value.to_string(),
    })
}

/// Returns the row id of the message with the given external id.
pub fn find_id_by_external_id(
    db: &Database,
    external_id: &str,
) -> Result<Option<i64>, DatabaseError> {
    db.with_conn(|conn| {
        let id = conn
            .query_row(
                "SELECT id FROM emails WHERE email_id = ?1",
                params![external_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id)
    })
}

/// Inserts a placeholder message row with an empty body.
///
/// Returns `false` if a row with the same external id already exists.
pub fn insert_placeholder(db: &Database, message: &NewMessage<'_>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO emails (email_subject, email_date, email_body, email_id, email_sender, account)
             VALUES (?1, ?2, '', ?3, ?4, ?5)",
            params![
                message.subject,
                format_stored_date(&message.date),
                message.external_id,
                message.sender,
                message.account,
            ],
        )?;
        Ok(inserted > 0)
    })
}

/// Replaces the body text of a message.
pub fn update_body(db: &Database, id: i64, body: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE emails SET email_body = ?1 WHERE id = ?2",
            params![body, id],
        )?;
        Ok(())
    })
}

/// Returns the latest stored message timestamp, if any message exists.
///
/// Rows whose date cannot be parsed are ignored with a warning.
pub fn latest_message_date(db: &Database) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    let values = db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT DISTINCT email_date FROM emails WHERE email_date IS NOT NULL")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    let mut latest: Option<DateTime<Utc>> = None;
    for value in values {
        match parse_stored_date(&value) {
            Ok(date) => {
                if latest.map_or(true, |current| date > current) {
                    latest = Some(date);
                }
            }
            Err(e) => log::warn!("Ignoring stored message date: {}", e),
        }
    }
    Ok(latest)
}

/// Counts all stored messages.
pub fn count_messages(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM emails", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Finds a message by external id.
pub fn find_message(db: &Database, external_id: &str) -> Result<Option<MessageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT id, email_id, email_subject, email_date, email_body, email_sender, account
                 FROM emails WHERE email_id = ?1",
                params![external_id],
                |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        external_id: row.get(1)?,
                        subject: row.get(2)?,
                        date: row.get(3)?,
                        body: row.get(4)?,
                        sender: row.get(5)?,
                        account: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    })
}
