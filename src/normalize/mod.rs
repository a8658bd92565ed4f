//! Response normalizers.
//!
//! Both backends' responses end up as the same ordered `Vec<PaperRecord>`:
//! the arXiv Atom feed through [`feed`], the relay server's JSON envelope
//! through [`envelope`].

pub mod envelope;
pub mod feed;

pub use envelope::{
    failure_message, parse_download_envelope, parse_search_envelope, DownloadEnvelope,
};
pub use feed::parse_feed;

/// Errors raised while normalizing a response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// The document is not well-formed XML or JSON of the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Well-formed response reporting an application-level failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for NormalizeError {
    fn from(err: serde_json::Error) -> Self {
        NormalizeError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::Error> for NormalizeError {
    fn from(err: quick_xml::Error) -> Self {
        NormalizeError::Parse(format!("XML: {}", err))
    }
}
