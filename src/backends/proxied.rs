//! Relay server backend.
//!
//! The server exposes `POST /search` and `POST /download`. Downloads take two
//! steps: `/download` resolves a paper to a link, which is then fetched with
//! a plain GET carrying the same API key.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{is_success_status, Backend, DownloadTarget, Resolution, SearchFields};
use crate::config::{BackendConfig, BackendMode};
use crate::executor::{Completion, RequestExecutor, RequestSpec};
use crate::models::{DownloadFailure, PaperRecord, SearchCriteria};
use crate::normalize::{
    failure_message, parse_download_envelope, parse_search_envelope, NormalizeError,
};
use crate::utils::{link_file_name, paper_file_name};

/// Header carrying the relay server's API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Talks to a relay server
#[derive(Debug, Clone)]
pub struct ProxiedBackend {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl ProxiedBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key().to_string(),
            timeout: config.timeout(),
        }
    }

    /// Attach the API key (when configured) and the timeout
    fn authorize(&self, spec: RequestSpec) -> RequestSpec {
        let spec = spec.timeout(self.timeout);
        if self.api_key.is_empty() {
            spec
        } else {
            spec.header(API_KEY_HEADER, self.api_key.as_str())
        }
    }

    /// Same scheme, host and port as the relay server
    fn is_relay_origin(&self, url: &str) -> bool {
        match (url::Url::parse(&self.base_url), url::Url::parse(url)) {
            (Ok(base), Ok(target)) => base.origin() == target.origin(),
            _ => false,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Absolute links are used as-is; anything else is relative to the server
    pub fn resolve_link(&self, link: &str) -> String {
        let link = link.trim();
        match url::Url::parse(link) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => link.to_string(),
            _ => self.endpoint(link),
        }
    }

    fn resolution_from_response(
        &self,
        record: &PaperRecord,
        status: u16,
        body: &[u8],
    ) -> Resolution {
        if !is_success_status(status) {
            let failure = match failure_message(body) {
                Some(message) => DownloadFailure::Backend(message),
                None => DownloadFailure::Network(format!("HTTP {}", status)),
            };
            return Resolution::Fail(failure);
        }

        let link = parse_download_envelope(body).and_then(|envelope| envelope.into_link());
        match link {
            Ok(link) => {
                let url = self.resolve_link(&link);
                let file_name = link_file_name(&url).unwrap_or_else(|| paper_file_name(record));
                Resolution::Ready(DownloadTarget { url, file_name })
            }
            Err(NormalizeError::Parse(detail)) => Resolution::Fail(DownloadFailure::Parse(detail)),
            Err(NormalizeError::Backend(message)) => {
                Resolution::Fail(DownloadFailure::Backend(message))
            }
        }
    }
}

#[async_trait]
impl Backend for ProxiedBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Proxied
    }

    fn search_request(&self, criteria: &SearchCriteria) -> RequestSpec {
        let body = self
            .build_query(criteria)
            .fields()
            .map(SearchFields::to_json)
            .unwrap_or_default();
        self.authorize(RequestSpec::post_json(self.endpoint("search"), &body))
    }

    fn normalize(&self, body: &[u8]) -> Result<Vec<PaperRecord>, NormalizeError> {
        parse_search_envelope(body)
    }

    fn error_status_message(&self, body: &[u8]) -> Option<String> {
        failure_message(body)
    }

    async fn resolve_download_target(
        &self,
        record: &PaperRecord,
        executor: &RequestExecutor,
        cancel: &CancellationToken,
    ) -> Resolution {
        let body = json!({
            "paper_id": record.short_id(),
            "paper_title": record.title,
        });
        let spec = self.authorize(RequestSpec::post_json(self.endpoint("download"), &body));

        match executor.execute_with(spec, cancel).completion().await {
            Completion::Success { status, body } => {
                self.resolution_from_response(record, status, &body)
            }
            Completion::Failure(e) => Resolution::Fail(DownloadFailure::Network(e.to_string())),
            Completion::Cancelled => Resolution::Cancelled,
        }
    }

    fn fetch_request(&self, url: &str) -> RequestSpec {
        if self.is_relay_origin(url) {
            self.authorize(RequestSpec::get(url))
        } else {
            tracing::debug!(url, "Download link points off the relay server, sending without API key");
            RequestSpec::get(url).timeout(self.timeout)
        }
    }

    fn probe_request(&self) -> RequestSpec {
        self.authorize(RequestSpec::get(format!("{}/", self.base_url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkProfile;
    use crate::models::PaperRecordBuilder;
    use reqwest::Method;

    fn backend(key: &str) -> ProxiedBackend {
        ProxiedBackend::new(&BackendConfig::proxied(
            NetworkProfile::Local,
            "http://127.0.0.1:5000/",
            key,
        ))
    }

    fn record() -> PaperRecord {
        PaperRecordBuilder::new("http://arxiv.org/abs/2301.12345v1", "Graph Paper").build()
    }

    #[test]
    fn test_search_request_body_and_key() {
        let criteria = SearchCriteria::new("graph").start_year(2019).max_results(10);
        let spec = backend("secret").search_request(&criteria);

        assert_eq!(spec.method, Method::POST);
        assert_eq!(spec.url, "http://127.0.0.1:5000/search");
        assert_eq!(spec.header_value(API_KEY_HEADER), Some("secret"));

        let body: serde_json::Value = serde_json::from_slice(spec.body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "keywords": "graph",
                "search_mode": "precise",
                "max_results": 10,
                "start_year": 2019,
            })
        );
    }

    #[test]
    fn test_no_key_no_header() {
        let spec = backend("").search_request(&SearchCriteria::new("graph"));
        assert!(spec.header_value(API_KEY_HEADER).is_none());
    }

    #[test]
    fn test_resolve_link() {
        let backend = backend("");
        assert_eq!(
            backend.resolve_link("downloads/x.pdf"),
            "http://127.0.0.1:5000/downloads/x.pdf"
        );
        assert_eq!(
            backend.resolve_link("/downloads/x.pdf"),
            "http://127.0.0.1:5000/downloads/x.pdf"
        );
        assert_eq!(
            backend.resolve_link("https://cdn.example.org/x.pdf"),
            "https://cdn.example.org/x.pdf"
        );
    }

    #[test]
    fn test_resolution_from_response() {
        let backend = backend("");

        let ready = backend.resolution_from_response(
            &record(),
            200,
            br#"{"success": true, "download_link": "files/2301.12345v1.pdf"}"#,
        );
        assert_eq!(
            ready,
            Resolution::Ready(DownloadTarget {
                url: "http://127.0.0.1:5000/files/2301.12345v1.pdf".to_string(),
                file_name: "2301.12345v1.pdf".to_string(),
            })
        );

        assert_eq!(
            backend.resolution_from_response(
                &record(),
                200,
                br#"{"success": false, "error": "paper not found"}"#
            ),
            Resolution::Fail(DownloadFailure::Backend("paper not found".to_string()))
        );
        assert!(matches!(
            backend.resolution_from_response(&record(), 200, br#"{"success": true}"#),
            Resolution::Fail(DownloadFailure::Backend(_))
        ));
        assert!(matches!(
            backend.resolution_from_response(&record(), 200, b"<html>"),
            Resolution::Fail(DownloadFailure::Parse(_))
        ));
        assert_eq!(
            backend.resolution_from_response(&record(), 502, b"Bad Gateway"),
            Resolution::Fail(DownloadFailure::Network("HTTP 502".to_string()))
        );
        assert_eq!(
            backend.resolution_from_response(
                &record(),
                401,
                br#"{"success": false, "error": "invalid API key"}"#
            ),
            Resolution::Fail(DownloadFailure::Backend("invalid API key".to_string()))
        );
    }

    #[test]
    fn test_fetch_and_probe_carry_key() {
        let backend = backend("k");
        let fetch = backend.fetch_request("http://127.0.0.1:5000/files/x.pdf");
        assert_eq!(fetch.method, Method::GET);
        assert_eq!(fetch.header_value(API_KEY_HEADER), Some("k"));

        let probe = backend.probe_request();
        assert_eq!(probe.url, "http://127.0.0.1:5000/");
        assert_eq!(probe.header_value(API_KEY_HEADER), Some("k"));
    }

    #[test]
    fn test_key_stays_on_relay_origin() {
        let backend = backend("k");

        let foreign = backend.fetch_request("http://127.0.0.1:6000/files/x.pdf");
        assert!(foreign.header_value(API_KEY_HEADER).is_none());
        assert_eq!(foreign.timeout, Some(Duration::from_secs(30)));

        let other_host = backend.fetch_request("https://mirror.example.org/x.pdf");
        assert!(other_host.header_value(API_KEY_HEADER).is_none());

        let relative = backend.fetch_request(&backend.resolve_link("files/x.pdf"));
        assert_eq!(relative.header_value(API_KEY_HEADER), Some("k"));
    }
}
