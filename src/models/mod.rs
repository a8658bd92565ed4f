//! Core data models for search criteria, paper records and download outcomes.

mod download;
mod paper;
mod search;

pub use download::{BatchReport, DownloadFailure, DownloadOutcome, DownloadStatus};
pub use paper::{date_portion, PaperRecord, PaperRecordBuilder, NOT_AVAILABLE};
pub use search::{MatchMode, SearchCriteria, DEFAULT_MAX_RESULTS, MAX_RESULTS, MIN_RESULTS};
