use chrono::{DateTime, Local, Utc};

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max_chars` characters of `text`
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Render a persisted timestamp for display in the popup
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// True when `address` starts with one of the given scheme prefixes
pub fn has_restricted_scheme(address: &str, prefixes: &[String]) -> bool {
    let lower = address.trim_start().to_lowercase();
    prefixes
        .iter()
        .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
}
