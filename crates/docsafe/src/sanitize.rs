//! Helpers for sanitizing data before it reaches the filesystem or a
//! tracing span.

use std::path::Path;

/// Longest error-body excerpt allowed into an error message.
const MAX_EXCERPT_CHARS: usize = 200;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Replaces path separators in an attachment name so it cannot escape the
/// attachment directory.
pub fn sanitize_filename(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Name under which an attachment is stored: `<message id>_<filename>`.
pub fn attachment_file_name(message_id: &str, filename: &str) -> String {
    sanitize_filename(&format!("{}_{}", message_id, filename))
}

/// Shortens text (e.g. an HTTP error body) for inclusion in an error.
pub fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_EXCERPT_CHARS).collect();
    format!("{}...", cut)
}
