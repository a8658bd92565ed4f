//! Direct arXiv API backend.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{Backend, DownloadTarget, Resolution};
use crate::config::{BackendConfig, BackendMode};
use crate::executor::{RequestExecutor, RequestSpec};
use crate::models::{PaperRecord, SearchCriteria};
use crate::normalize::{parse_feed, NormalizeError};
use crate::utils::paper_file_name;

/// Reason recorded for records that carry no PDF link
pub const NO_PDF_URL: &str = "no pdf url";

/// Talks to the public arXiv query endpoint
#[derive(Debug, Clone)]
pub struct DirectBackend {
    endpoint: String,
    timeout: Duration,
}

impl DirectBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            endpoint: config.base_url().to_string(),
            timeout: config.timeout(),
        }
    }

    /// Full search URL, sorted by submission date, newest first
    pub fn search_url(&self, criteria: &SearchCriteria) -> String {
        let query = self.build_query(criteria);
        format!(
            "{}?search_query={}&start=0&max_results={}&sortBy=submittedDate&sortOrder=descending",
            self.endpoint,
            urlencoding::encode(query.expression().unwrap_or_default()),
            criteria.max_results
        )
    }
}

#[async_trait]
impl Backend for DirectBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Direct
    }

    fn search_request(&self, criteria: &SearchCriteria) -> RequestSpec {
        RequestSpec::get(self.search_url(criteria)).timeout(self.timeout)
    }

    fn normalize(&self, body: &[u8]) -> Result<Vec<PaperRecord>, NormalizeError> {
        parse_feed(body)
    }

    async fn resolve_download_target(
        &self,
        record: &PaperRecord,
        _executor: &RequestExecutor,
        _cancel: &CancellationToken,
    ) -> Resolution {
        match record.pdf_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Resolution::Ready(DownloadTarget {
                url: url.to_string(),
                file_name: paper_file_name(record),
            }),
            _ => Resolution::Skip(NO_PDF_URL.to_string()),
        }
    }

    fn fetch_request(&self, url: &str) -> RequestSpec {
        RequestSpec::get(url).timeout(self.timeout)
    }

    fn probe_request(&self) -> RequestSpec {
        RequestSpec::get(format!(
            "{}?search_query=all:electron&start=0&max_results=1",
            self.endpoint
        ))
        .timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchMode, PaperRecordBuilder};
    use reqwest::Method;

    fn backend() -> DirectBackend {
        DirectBackend::new(&BackendConfig::direct().with_timeout_seconds(12))
    }

    #[test]
    fn test_search_request() {
        let criteria = SearchCriteria::new("neural nets")
            .match_mode(MatchMode::Any)
            .start_year(2015)
            .end_year(2020)
            .max_results(50);

        let spec = backend().search_request(&criteria);
        assert_eq!(spec.method, Method::GET);
        assert!(spec.body.is_none());
        assert_eq!(spec.timeout, Some(Duration::from_secs(12)));
        assert!(spec.header_value("X-API-Key").is_none());

        let expected_query = urlencoding::encode(
            "(ti:neural OR abs:neural) AND (ti:nets OR abs:nets) AND submittedDate:[20150101 TO 20201231]",
        )
        .into_owned();
        assert_eq!(
            spec.url,
            format!(
                "https://export.arxiv.org/api/query?search_query={}&start=0&max_results=50&sortBy=submittedDate&sortOrder=descending",
                expected_query
            )
        );
    }

    #[tokio::test]
    async fn test_resolve_with_and_without_pdf() {
        let executor = RequestExecutor::new().unwrap();
        let cancel = CancellationToken::new();
        let backend = backend();

        let with_pdf = PaperRecordBuilder::new("http://arxiv.org/abs/2301.1v1", "Graphs")
            .pdf_url("http://arxiv.org/pdf/2301.1v1")
            .build();
        assert_eq!(
            backend
                .resolve_download_target(&with_pdf, &executor, &cancel)
                .await,
            Resolution::Ready(DownloadTarget {
                url: "http://arxiv.org/pdf/2301.1v1".to_string(),
                file_name: "2301.1v1_Graphs.pdf".to_string(),
            })
        );

        let without_pdf = PaperRecordBuilder::new("http://arxiv.org/abs/2301.2v1", "T").build();
        assert_eq!(
            backend
                .resolve_download_target(&without_pdf, &executor, &cancel)
                .await,
            Resolution::Skip(NO_PDF_URL.to_string())
        );
    }

    #[test]
    fn test_probe_request() {
        let spec = backend().probe_request();
        assert!(spec.url.ends_with("?search_query=all:electron&start=0&max_results=1"));
    }
}
