//! Batch download orchestration.
//!
//! Records are processed one at a time, in input order. Each record moves
//! through `Resolving -> Fetching -> Done`, or stops at `Cancelled` when the
//! caller's token fires while a request is outstanding. Per-record failures
//! are recorded and the batch carries on; cancellation ends the batch and the
//! remaining records are left out of the report.

use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::backends::{self, is_success_status, Backend, DownloadTarget, Resolution};
use crate::config::BackendConfig;
use crate::executor::{Completion, RequestExecutor};
use crate::models::{BatchReport, DownloadFailure, DownloadOutcome, DownloadStatus, PaperRecord};

/// Progress callbacks for a running batch
///
/// Indexes are zero-based positions in the input selection.
pub trait DownloadObserver: Send + Sync {
    /// Work on a record is about to start
    fn record_started(&self, _index: usize, _total: usize, _record: &PaperRecord) {}

    /// A record reached a terminal outcome; `completed` counts saved files so far
    fn record_finished(
        &self,
        _index: usize,
        _total: usize,
        _outcome: &DownloadOutcome,
        _completed: usize,
    ) {
    }
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {}

/// Per-record state
#[derive(Debug)]
enum RecordState {
    Resolving,
    Fetching(DownloadTarget),
    Done(DownloadStatus),
    Cancelled,
}

/// Downloads selections of records into a directory
#[derive(Debug, Clone)]
pub struct DownloadOrchestrator {
    executor: RequestExecutor,
}

impl DownloadOrchestrator {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Download `records` into `destination`
    pub async fn download_batch(
        &self,
        records: &[PaperRecord],
        destination: &Path,
        config: &BackendConfig,
        cancel: &CancellationToken,
    ) -> BatchReport {
        self.download_batch_observed(records, destination, config, cancel, &NoopObserver)
            .await
    }

    /// Download `records` into `destination`, reporting progress to `observer`
    pub async fn download_batch_observed(
        &self,
        records: &[PaperRecord],
        destination: &Path,
        config: &BackendConfig,
        cancel: &CancellationToken,
        observer: &dyn DownloadObserver,
    ) -> BatchReport {
        let backend = backends::for_config(config);
        let total = records.len();
        let delay = config.request_delay();
        let mut report = BatchReport::new(total);

        tracing::info!(
            total,
            mode = %config.mode(),
            destination = %destination.display(),
            "Starting batch download"
        );

        for (index, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            observer.record_started(index, total, record);

            let Some(status) = self
                .download_record(backend.as_ref(), record, destination, cancel)
                .await
            else {
                tracing::info!(index, id = %record.id, "Download cancelled mid-request");
                report.cancelled = true;
                break;
            };

            if let DownloadStatus::Failed(failure) = &status {
                tracing::warn!(id = %record.id, error = %failure, "Download failed");
            }
            let skipped = matches!(status, DownloadStatus::Skipped(_));

            report.push(DownloadOutcome::new(record.clone(), status));
            if let Some(outcome) = report.outcomes.last() {
                observer.record_finished(index, total, outcome, report.completed);
            }

            // Fixed client-side pause; skipped records made no request
            if !skipped && index + 1 < total && !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        tracing::info!(
            completed = report.completed,
            requested = report.requested,
            failed = report.failed(),
            skipped = report.skipped(),
            cancelled = report.cancelled,
            "{}",
            report.summary()
        );

        report
    }

    /// Drive one record to a terminal status; `None` means cancelled
    async fn download_record(
        &self,
        backend: &dyn Backend,
        record: &PaperRecord,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Option<DownloadStatus> {
        let mut state = RecordState::Resolving;

        loop {
            state = match state {
                RecordState::Resolving => {
                    match backend
                        .resolve_download_target(record, &self.executor, cancel)
                        .await
                    {
                        Resolution::Ready(target) => RecordState::Fetching(target),
                        Resolution::Skip(reason) => {
                            RecordState::Done(DownloadStatus::Skipped(reason))
                        }
                        Resolution::Fail(failure) => {
                            RecordState::Done(DownloadStatus::Failed(failure))
                        }
                        Resolution::Cancelled => RecordState::Cancelled,
                    }
                }
                RecordState::Fetching(target) => {
                    self.fetch(backend, &target, destination, cancel).await
                }
                RecordState::Done(status) => return Some(status),
                RecordState::Cancelled => return None,
            };
        }
    }

    async fn fetch(
        &self,
        backend: &dyn Backend,
        target: &DownloadTarget,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> RecordState {
        let spec = backend.fetch_request(&target.url);

        match self.executor.execute_with(spec, cancel).completion().await {
            Completion::Success { status, body } if is_success_status(status) => {
                let status = match save_file(destination, &target.file_name, &body) {
                    Ok(path) => {
                        tracing::debug!(path = %path.display(), bytes = body.len(), "Saved file");
                        DownloadStatus::Saved(path)
                    }
                    Err(failure) => DownloadStatus::Failed(failure),
                };
                RecordState::Done(status)
            }
            Completion::Success { status, .. } => RecordState::Done(DownloadStatus::Failed(
                DownloadFailure::Network(format!("HTTP {}", status)),
            )),
            Completion::Failure(e) => RecordState::Done(DownloadStatus::Failed(
                DownloadFailure::Network(e.to_string()),
            )),
            Completion::Cancelled => RecordState::Cancelled,
        }
    }
}

/// Write `bytes` to `destination/file_name`, replacing any existing file
fn save_file(destination: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, DownloadFailure> {
    std::fs::create_dir_all(destination)?;
    let path = destination.join(file_name);
    std::fs::write(&path, bytes)?;
    Ok(path)
}
