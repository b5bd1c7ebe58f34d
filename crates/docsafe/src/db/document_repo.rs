//! Normalized document repository: `xml_data` and `meta_data` in the
//! normalization store.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// Message fields copied alongside a normalized document.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata<'a> {
    pub subject: Option<&'a str>,
    pub date: Option<&'a str>,
    pub body: Option<&'a str>,
    pub sender: Option<&'a str>,
    pub external_id: Option<&'a str>,
}

/// A metadata row as read back from the store.
#[derive(Debug, Clone)]
pub struct MetadataRow {
    pub subject: Option<String>,
    pub date: Option<String>,
    pub body: Option<String>,
    pub sender: Option<String>,
    pub external_id: Option<String>,
    pub xml_content_id: i64,
}

/// Returns true if a document for `(filename, path)` was already stored.
pub fn exists(db: &Database, filename: &str, path: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM xml_data WHERE src_filename = ?1 AND src_path = ?2",
            params![filename, path],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// Inserts an XML content row and returns its id.
pub fn insert_xml(
    db: &Database,
    path: &str,
    filename: &str,
    content: &str,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO xml_data (src_path, src_filename, xml_content) VALUES (?1, ?2, ?3)",
            params![path, filename, content],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Inserts the metadata row for a stored XML document and returns its id.
pub fn insert_metadata(
    db: &Database,
    metadata: &DocumentMetadata<'_>,
    xml_content_id: i64,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO meta_data (email_subject, email_date, email_body, email_sender, email_id, xml_content_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                metadata.subject,
                metadata.date,
                metadata.body,
                metadata.sender,
                metadata.external_id,
                xml_content_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Counts stored XML documents.
pub fn count_documents(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM xml_data", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Counts stored metadata rows.
pub fn count_metadata(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM meta_data", [], |r| r.get(0))?;
        Ok(count)
    })
}

/// Returns the stored XML content for a source file.
pub fn find_xml_content(
    db: &Database,
    filename: &str,
    path: &str,
) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let content = conn
            .query_row(
                "SELECT xml_content FROM xml_data WHERE src_filename = ?1 AND src_path = ?2
                 ORDER BY id LIMIT 1",
                params![filename, path],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(content.flatten())
    })
}

/// Returns the metadata row attached to a stored XML document.
pub fn find_metadata(db: &Database, xml_content_id: i64) -> Result<Option<MetadataRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT email_subject, email_date, email_body, email_sender, email_id, xml_content_id
                 FROM meta_data WHERE xml_content_id = ?1",
                params![xml_content_id],
                |row| {
                    Ok(MetadataRow {
                        subject: row.get(0)?,
                        date: row.get(1)?,
                        body: row.get(2)?,
                        sender: row.get(3)?,
                        external_id: row.get(4)?,
                        xml_content_id: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    })
}
