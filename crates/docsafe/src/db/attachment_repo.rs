//! Attachment repository: operations on the ingest store's `attachments`
//! table and the PDF candidate query used by the normalizer.

use rusqlite::params;

use super::{Database, DatabaseError};

/// A PDF attachment joined with its owning message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfCandidateRow {
    pub filename: String,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub body: Option<String>,
    pub sender: Option<String>,
    pub external_id: Option<String>,
}

/// Inserts an attachment row. Returns `false` if the filename is already
/// recorded.
pub fn insert_attachment(
    db: &Database,
    filename: &str,
    message_id: i64,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO attachments (attachment_filename, email_id) VALUES (?1, ?2)",
            params![filename, message_id],
        )?;
        Ok(inserted > 0)
    })
}

/// Counts all stored attachments.
pub fn count_attachments(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM attachments", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Lists the attachment filenames recorded for a message.
pub fn filenames_for_message(db: &Database, message_id: i64) -> Result<Vec<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT attachment_filename FROM attachments WHERE email_id = ?1 ORDER BY id",
        )?;
        let names = stmt
            .query_map(params![message_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    })
}

/// Returns every attachment whose filename ends in `.pdf` (any case),
/// joined with the owning message's fields.
pub fn find_pdf_attachments(db: &Database) -> Result<Vec<PdfCandidateRow>, DatabaseError> {
    db.with_conn(|conn| {
        // LIKE is case-insensitive for ASCII in SQLite.
        let mut stmt = conn.prepare(
            "SELECT a.attachment_filename, e.email_subject, e.email_date, e.email_body,
                    e.email_sender, e.email_id
             FROM attachments a
             LEFT JOIN emails e ON a.email_id = e.id
             WHERE a.attachment_filename LIKE '%.pdf'
             ORDER BY a.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PdfCandidateRow {
                    filename: row.get(0)?,
                    subject: row.get(1)?,
                    date: row.get(2)?,
                    body: row.get(3)?,
                    sender: row.get(4)?,
                    external_id: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
