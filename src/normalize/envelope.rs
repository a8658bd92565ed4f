//! Relay server JSON envelope normalizer.

use serde::Deserialize;

use super::NormalizeError;
use crate::models::{PaperRecord, PaperRecordBuilder};

/// Fallback message when a failed envelope carries none
const UNKNOWN_ERROR: &str = "unknown error";

/// `/search` response
#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    success: bool,
    #[serde(default)]
    papers: Option<Vec<WirePaper>>,
    #[serde(default)]
    error: Option<String>,
}

/// One paper as the relay server sends it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePaper {
    #[serde(alias = "id")]
    entry_id: String,
    title: String,
    authors: Vec<String>,
    summary: String,
    published: String,
    updated: String,
    categories: Vec<String>,
    doi: Option<String>,
    journal_ref: Option<String>,
    pdf_url: Option<String>,
}

impl From<WirePaper> for PaperRecord {
    fn from(wire: WirePaper) -> Self {
        let builder = PaperRecordBuilder::new(wire.entry_id, wire.title)
            .authors(wire.authors)
            .summary(wire.summary)
            .published_date(&wire.published)
            .updated_date(&wire.updated)
            .categories(wire.categories)
            .doi(wire.doi.unwrap_or_default())
            .journal_ref(wire.journal_ref.unwrap_or_default());

        match wire.pdf_url {
            Some(url) => builder.pdf_url(url).build(),
            None => builder.build(),
        }
    }
}

/// `/download` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DownloadEnvelope {
    pub success: bool,
    #[serde(default)]
    pub download_link: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DownloadEnvelope {
    /// The resolved link, or the reason there is none
    pub fn into_link(self) -> Result<String, NormalizeError> {
        if !self.success {
            return Err(NormalizeError::Backend(
                self.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            ));
        }

        self.download_link
            .filter(|link| !link.trim().is_empty())
            .ok_or_else(|| NormalizeError::Backend("response has no download_link".to_string()))
    }
}

/// Parse a `/search` envelope into records, preserving server order
pub fn parse_search_envelope(body: &[u8]) -> Result<Vec<PaperRecord>, NormalizeError> {
    let envelope: SearchEnvelope = serde_json::from_slice(body)?;

    if !envelope.success {
        return Err(NormalizeError::Backend(
            envelope.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        ));
    }

    Ok(envelope
        .papers
        .unwrap_or_default()
        .into_iter()
        .map(PaperRecord::from)
        .collect())
}

/// Parse a `/download` envelope
pub fn parse_download_envelope(body: &[u8]) -> Result<DownloadEnvelope, NormalizeError> {
    Ok(serde_json::from_slice(body)?)
}

/// Server message from a failed envelope, if `body` is one
///
/// Used to surface the server's explanation when it also sent an error status.
pub fn failure_message(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Failure {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    }

    serde_json::from_slice::<Failure>(body)
        .ok()
        .filter(|f| !f.success)
        .map(|f| f.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let body = br#"{
            "success": true,
            "papers": [
                {
                    "entry_id": "http://arxiv.org/abs/2301.00001v1",
                    "title": "First",
                    "authors": ["Alice", "Bob"],
                    "summary": "Abstract",
                    "published": "2023-01-15T10:00:00Z",
                    "updated": "2023-02-01",
                    "categories": ["cs.LG"],
                    "doi": "10.1000/x",
                    "pdf_url": "http://arxiv.org/pdf/2301.00001v1"
                },
                {"entry_id": "http://arxiv.org/abs/2301.00002v1", "title": "Second"}
            ]
        }"#;

        let records = parse_search_envelope(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "First");
        assert_eq!(records[0].authors, vec!["Alice", "Bob"]);
        assert_eq!(records[0].published_date, "2023-01-15");
        assert_eq!(records[0].doi, "10.1000/x");
        assert_eq!(records[0].journal_ref, "N/A");
        assert!(records[0].has_pdf());

        assert_eq!(records[1].title, "Second");
        assert_eq!(records[1].doi, "N/A");
        assert!(records[1].pdf_url.is_none());
    }

    #[test]
    fn test_failure_envelope() {
        let body = br#"{"success": false, "error": "bad query"}"#;
        assert_eq!(
            parse_search_envelope(body),
            Err(NormalizeError::Backend("bad query".to_string()))
        );

        let bare = br#"{"success": false}"#;
        assert_eq!(
            parse_search_envelope(bare),
            Err(NormalizeError::Backend(UNKNOWN_ERROR.to_string()))
        );
    }

    #[test]
    fn test_success_without_papers_is_empty() {
        assert!(parse_search_envelope(br#"{"success": true}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_invalid_envelopes() {
        for body in [
            &b"[1, 2, 3]"[..],
            b"{\"papers\": []}",
            b"not json",
            b"{\"success\": \"yes\"}",
        ] {
            assert!(matches!(
                parse_search_envelope(body),
                Err(NormalizeError::Parse(_))
            ));
        }
    }

    #[test]
    fn test_download_envelope() {
        let ok = parse_download_envelope(br#"{"success": true, "download_link": "files/x.pdf"}"#)
            .unwrap();
        assert_eq!(ok.into_link().unwrap(), "files/x.pdf");

        let missing = parse_download_envelope(br#"{"success": true}"#).unwrap();
        assert!(matches!(missing.into_link(), Err(NormalizeError::Backend(_))));

        let refused =
            parse_download_envelope(br#"{"success": false, "error": "not found"}"#).unwrap();
        assert_eq!(
            refused.into_link(),
            Err(NormalizeError::Backend("not found".to_string()))
        );
    }

    #[test]
    fn test_failure_message() {
        assert_eq!(
            failure_message(br#"{"success": false, "error": "invalid key"}"#).as_deref(),
            Some("invalid key")
        );
        assert_eq!(failure_message(br#"{"success": true}"#), None);
        assert_eq!(failure_message(b"<html>502</html>"), None);
    }
}
