//! # paper-relay
//!
//! Search arXiv by keyword and date range, then batch-download the papers you
//! pick, either straight from the public API or through a private relay
//! server exposing `/search` and `/download`.
//!
//! ## Architecture
//!
//! - [`models`]: search criteria, normalized paper records and download outcomes
//! - [`config`]: the immutable [`BackendConfig`] snapshot and the persisted settings file
//! - [`backends`]: query construction and the per-mode [`Backend`] strategies
//! - [`normalize`]: Atom feed and JSON envelope normalizers
//! - [`executor`]: cancellable asynchronous HTTP requests
//! - [`search`] / [`download`]: the two orchestrators
//! - [`export`], [`diagnostics`], [`ui`], [`utils`]: collaborators used by the CLI
//!
//! ```rust,no_run
//! use paper_relay::{BackendConfig, RequestExecutor, SearchCriteria, SearchOrchestrator};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = SearchOrchestrator::new(RequestExecutor::new()?);
//! let criteria = SearchCriteria::new("graph neural networks").start_year(2020);
//! let papers = orchestrator.search(&criteria, &BackendConfig::direct()).await?;
//! println!("found {} papers", papers.len());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod diagnostics;
pub mod download;
pub mod executor;
pub mod export;
pub mod models;
pub mod normalize;
pub mod search;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use backends::Backend;
pub use config::{BackendConfig, BackendMode, NetworkProfile, SettingsFile};
pub use download::{DownloadObserver, DownloadOrchestrator};
pub use executor::{Completion, RequestExecutor, RequestHandle, RequestSpec, TransportError};
pub use models::{BatchReport, DownloadOutcome, DownloadStatus, MatchMode, PaperRecord, SearchCriteria};
pub use search::{SearchError, SearchOrchestrator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
