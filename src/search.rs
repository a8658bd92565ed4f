//! Search orchestration.
//!
//! A search validates the criteria, picks the backend for the configuration
//! snapshot, issues exactly one request and normalizes the response.

use tokio_util::sync::CancellationToken;

use crate::backends::{self, is_success_status, Backend};
use crate::config::BackendConfig;
use crate::executor::{Completion, RequestExecutor};
use crate::models::{PaperRecord, SearchCriteria};
use crate::normalize::NormalizeError;

/// Search failure surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// The criteria were rejected before any request was made
    #[error("Invalid search: {0}")]
    Validation(String),

    /// Transport failure or HTTP error status
    #[error("Network error: {0}")]
    Network(String),

    /// The response could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The backend reported a failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// The caller cancelled the search
    #[error("Search cancelled")]
    Cancelled,
}

impl From<NormalizeError> for SearchError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Parse(detail) => SearchError::Parse(detail),
            NormalizeError::Backend(message) => SearchError::Backend(message),
        }
    }
}

/// Runs searches against whichever backend a [`BackendConfig`] selects
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    executor: RequestExecutor,
}

impl SearchOrchestrator {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Search with the records returned in backend order
    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        config: &BackendConfig,
    ) -> Result<Vec<PaperRecord>, SearchError> {
        self.search_with_cancel(criteria, config, &CancellationToken::new())
            .await
    }

    /// Search that can be aborted through `cancel`
    pub async fn search_with_cancel(
        &self,
        criteria: &SearchCriteria,
        config: &BackendConfig,
        cancel: &CancellationToken,
    ) -> Result<Vec<PaperRecord>, SearchError> {
        if !criteria.has_keywords() {
            return Err(SearchError::Validation(
                "at least one keyword is required".to_string(),
            ));
        }

        let backend = backends::for_config(config);
        let spec = backend.search_request(criteria);

        tracing::debug!(
            mode = %config.mode(),
            keywords = %criteria.keyword_line(),
            match_mode = %criteria.match_mode,
            max_results = criteria.max_results,
            "Starting search"
        );

        let completion = self.executor.execute_with(spec, cancel).completion().await;
        let records = finish_search(backend.as_ref(), completion)?;

        tracing::info!(count = records.len(), mode = %config.mode(), "Search completed");
        Ok(records)
    }
}

fn finish_search(
    backend: &dyn Backend,
    completion: Completion,
) -> Result<Vec<PaperRecord>, SearchError> {
    match completion {
        Completion::Success { status, body } if is_success_status(status) => {
            Ok(backend.normalize(&body)?)
        }
        Completion::Success { status, body } => {
            tracing::warn!(status, "Search request returned an error status");
            Err(match backend.error_status_message(&body) {
                Some(message) => SearchError::Backend(message),
                None => SearchError::Network(format!("HTTP {}", status)),
            })
        }
        Completion::Failure(e) => {
            tracing::warn!(error = %e, "Search request failed");
            Err(SearchError::Network(e.to_string()))
        }
        Completion::Cancelled => Err(SearchError::Cancelled),
    }
}
