//! Input validation for server URLs and download filenames.

use thiserror::Error;

use crate::models::PaperRecord;

/// Longest title portion kept in a direct-mode filename, in characters
pub const MAX_TITLE_CHARS: usize = 50;
/// Longest filename written to disk, in bytes
pub const MAX_FILENAME_BYTES: usize = 200;

/// Validation error types
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL contains potentially dangerous characters")]
    DangerousUrl,
}

/// Validate a server or endpoint URL
///
/// Only `http` and `https` are accepted. Loopback and private hosts are fine
/// here since relay servers commonly run on the local network.
pub fn validate_url(url: &str) -> Result<String, ValidationError> {
    let url = url.trim();

    if url.is_empty() {
        return Err(ValidationError::InvalidUrl("empty URL".to_string()));
    }

    if url.contains(['\n', '\r', '\0']) {
        return Err(ValidationError::DangerousUrl);
    }

    let parsed = url::Url::parse(url).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::InvalidUrl(format!(
                "invalid scheme: {}",
                other
            )))
        }
    }

    if parsed.host_str().is_none() {
        return Err(ValidationError::InvalidUrl("missing host".to_string()));
    }

    Ok(url.to_string())
}

/// Replace every character outside alphanumerics, space, `-`, `_` and `.` with `_`
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, ' ' | '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Direct-mode filename: `<id segment>_<title>.pdf`
///
/// The title is capped to [`MAX_TITLE_CHARS`] characters and the whole name
/// to [`MAX_FILENAME_BYTES`] bytes.
pub fn paper_file_name(record: &PaperRecord) -> String {
    let id = sanitize_filename(record.short_id());
    let title: String = sanitize_filename(record.title.trim())
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let title = title.trim();

    let stem = if title.is_empty() {
        id
    } else {
        format!("{}_{}", id, title)
    };

    let stem = truncate_to_bytes(&stem, MAX_FILENAME_BYTES - ".pdf".len());
    format!("{}.pdf", stem)
}

/// Proxied-mode filename: final path segment of the resolved link
///
/// Returns `None` when the link has no usable segment.
pub fn link_file_name(link: &str) -> Option<String> {
    let path = link.split(['?', '#']).next().unwrap_or(link);
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    let name = sanitize_filename(decoded.trim());
    let name = truncate_to_bytes(&name, MAX_FILENAME_BYTES);

    if name.trim_matches('.').is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char
fn truncate_to_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
