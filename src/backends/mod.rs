//! Backend strategies.
//!
//! A [`Backend`] captures everything that differs between talking to the
//! public arXiv API ([`DirectBackend`]) and to a relay server
//! ([`ProxiedBackend`]): how a search request is built, how its response is
//! normalized, and how a record is resolved to a downloadable URL. One
//! backend is selected per orchestration call with [`for_config`].

mod direct;
mod proxied;
pub mod query;

pub use direct::DirectBackend;
pub use proxied::ProxiedBackend;
pub use query::{build as build_query, Query, SearchFields};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{BackendConfig, BackendMode};
use crate::executor::{RequestExecutor, RequestSpec};
use crate::models::{DownloadFailure, PaperRecord, SearchCriteria};
use crate::normalize::NormalizeError;

/// Where a record's bytes come from and what to call the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub url: String,
    pub file_name: String,
}

/// Result of resolving a record for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Ready to fetch
    Ready(DownloadTarget),
    /// Nothing to fetch for this record
    Skip(String),
    /// Resolution failed for this record only
    Fail(DownloadFailure),
    /// The caller cancelled while resolving
    Cancelled,
}

/// Capability interface implemented once per backend mode
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Mode this backend implements
    fn mode(&self) -> BackendMode;

    /// Backend-specific query for the criteria
    fn build_query(&self, criteria: &SearchCriteria) -> Query {
        query::build(criteria, self.mode())
    }

    /// The single request a search issues
    fn search_request(&self, criteria: &SearchCriteria) -> RequestSpec;

    /// Normalize a successful (2xx) search response body
    fn normalize(&self, body: &[u8]) -> Result<Vec<PaperRecord>, NormalizeError>;

    /// Server explanation carried in an error-status body, if any
    fn error_status_message(&self, _body: &[u8]) -> Option<String> {
        None
    }

    /// Resolve a record to a download target, issuing requests if needed
    async fn resolve_download_target(
        &self,
        record: &PaperRecord,
        executor: &RequestExecutor,
        cancel: &CancellationToken,
    ) -> Resolution;

    /// Request that fetches a resolved download URL
    fn fetch_request(&self, url: &str) -> RequestSpec;

    /// Lightweight request used by reachability diagnostics
    fn probe_request(&self) -> RequestSpec;
}

/// Select the backend for a configuration snapshot
pub fn for_config(config: &BackendConfig) -> Box<dyn Backend> {
    match config.mode() {
        BackendMode::Direct => Box::new(DirectBackend::new(config)),
        BackendMode::Proxied => Box::new(ProxiedBackend::new(config)),
    }
}

/// `true` for 2xx statuses
pub(crate) fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}
