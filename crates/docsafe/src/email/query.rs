//! Search query construction and the attachment extension allow-list.

use chrono::{DateTime, Utc};

/// Case-insensitive allow-list of attachment extensions.
///
/// Matching is by suffix, so multi-part extensions such as `tar.gz` work.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn accepts(&self, filename: &str) -> bool {
        let lower = filename.to_ascii_lowercase();
        self.extensions.iter().any(|ext| {
            lower
                .strip_suffix(ext.as_str())
                .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
        })
    }

    /// `(filename:pdf OR filename:png OR ...)`
    pub fn query_clause(&self) -> String {
        let terms: Vec<String> = self
            .extensions
            .iter()
            .map(|ext| format!("filename:{}", ext))
            .collect();
        format!("({})", terms.join(" OR "))
    }
}

/// Gmail search query for messages with allow-listed attachments received
/// after `from` and before `to`.
pub fn build_query(from: DateTime<Utc>, to: DateTime<Utc>, filter: &ExtensionFilter) -> String {
    format!(
        "has:attachment after:{} before:{} {}",
        from.format("%Y/%m/%d"),
        to.format("%Y/%m/%d"),
        filter.query_clause()
    )
}
