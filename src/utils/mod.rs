//! Small helpers shared by the archiver and the marketplace client.

use url::Url;

/// Longest filename (in characters) produced by [`sanitize_filename`].
const MAX_FILENAME_CHARS: usize = 100;

/// Sanitize a filename for safe filesystem storage.
///
/// Replaces path separators and characters that are invalid on common
/// filesystems with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim().trim_matches('_');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.chars().take(MAX_FILENAME_CHARS).collect()
    }
}

/// Derive a storage filename from an image URL.
///
/// Takes the last path segment, drops any query string or fragment and
/// sanitizes the rest. `index` is prefixed so that two URLs ending in the
/// same segment never collide inside one archive.
pub fn filename_from_url(url: &str, index: usize) -> String {
    let without_query = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/');
    let segment = without_query.rsplit('/').next().unwrap_or(without_query);
    format!("{:03}_{}", index, sanitize_filename(segment))
}

/// Resolve a possibly-relative URL against the marketplace origin.
///
/// Protocol-relative URLs (`//cdn.host/x.jpg`) inherit the origin's scheme.
pub fn resolve_url(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => base.join(raw).ok(),
        Err(_) => None,
    }
}

/// Lower-case text for case-insensitive search columns.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}
