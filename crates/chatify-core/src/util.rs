//! Shared utility functions used across multiple modules.

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Final path segment of a file name, URI, or path.
///
/// `file:///data/cache/photo.jpg` yields `photo.jpg`. Query and fragment are
/// only dropped from `http(s)://` URLs; in local names `?` and `#` are
/// ordinary characters. Falls back to `file` when nothing usable remains.
pub fn base_name(value: &str) -> &str {
    let value = value.trim();
    let value = if is_http_url(value) {
        value.split(['?', '#']).next().unwrap_or_default()
    } else {
        value
    };
    let trimmed = value.trim_end_matches(['/', '\\']);
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    if name.is_empty() {
        "file"
    } else {
        name
    }
}
