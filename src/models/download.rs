//! Download outcome models.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::PaperRecord;

/// Why a single record could not be saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DownloadFailure {
    /// Transport failure or an HTTP error status
    #[error("Network error: {0}")]
    Network(String),

    /// The relay server answered with something that is not a valid envelope
    #[error("Parse error: {0}")]
    Parse(String),

    /// The relay server refused or could not resolve the paper
    #[error("Backend error: {0}")]
    Backend(String),

    /// Writing the file failed
    #[error("IO error: {0}")]
    FileIo(String),
}

impl From<std::io::Error> for DownloadFailure {
    fn from(err: std::io::Error) -> Self {
        DownloadFailure::FileIo(err.to_string())
    }
}

/// Terminal status of one attempted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum DownloadStatus {
    /// File written to this path
    Saved(PathBuf),
    /// Nothing to fetch for this record
    Skipped(String),
    /// The attempt failed; the batch carried on
    Failed(DownloadFailure),
}

/// Outcome for one attempted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// The record that was attempted
    pub record: PaperRecord,

    /// What happened to it
    pub status: DownloadStatus,
}

impl DownloadOutcome {
    /// Create a new outcome
    pub fn new(record: PaperRecord, status: DownloadStatus) -> Self {
        Self { record, status }
    }

    /// Whether the record's file was written
    pub fn is_saved(&self) -> bool {
        matches!(self.status, DownloadStatus::Saved(_))
    }

    /// Saved path, if any
    pub fn saved_path(&self) -> Option<&PathBuf> {
        match &self.status {
            DownloadStatus::Saved(path) => Some(path),
            _ => None,
        }
    }
}

/// Result of a batch download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// One outcome per attempted record, in input order
    pub outcomes: Vec<DownloadOutcome>,

    /// Number of records saved
    pub completed: usize,

    /// Number of records handed to the batch
    pub requested: usize,

    /// Whether the batch stopped because of user cancellation
    pub cancelled: bool,
}

impl BatchReport {
    /// Create an empty report for a batch of `requested` records
    pub fn new(requested: usize) -> Self {
        Self {
            outcomes: Vec::with_capacity(requested),
            completed: 0,
            requested,
            cancelled: false,
        }
    }

    /// Record an outcome, counting it when saved
    pub fn push(&mut self, outcome: DownloadOutcome) {
        if outcome.is_saved() {
            self.completed += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Number of failed records
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DownloadStatus::Failed(_)))
            .count()
    }

    /// Number of skipped records
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DownloadStatus::Skipped(_)))
            .count()
    }

    /// Nothing was saved
    pub fn is_failure(&self) -> bool {
        self.completed == 0
    }

    /// Some, but not all, requested records were saved
    pub fn is_partial(&self) -> bool {
        self.completed > 0 && self.completed < self.requested
    }

    /// Aggregate message, e.g. `"3 of 5 succeeded"`
    pub fn summary(&self) -> String {
        let mut msg = format!("{} of {} succeeded", self.completed, self.requested);
        if self.cancelled {
            msg.push_str(" (cancelled)");
        }
        msg
    }
}
