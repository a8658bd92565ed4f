//! Utility functions shared by the orchestrators and the CLI.
//!
//! - [`validate_url`]: check a relay server or endpoint URL before saving it
//! - [`sanitize_filename`]: map arbitrary text onto a filesystem-safe character set
//! - [`paper_file_name`] / [`link_file_name`]: derive download filenames
//!
//! ```rust
//! use paper_relay::models::PaperRecordBuilder;
//! use paper_relay::utils::paper_file_name;
//!
//! let record = PaperRecordBuilder::new("http://arxiv.org/abs/2301.12345v1", "A/B testing: a survey").build();
//! assert_eq!(paper_file_name(&record), "2301.12345v1_A_B testing_ a survey.pdf");
//! ```

mod validate;

pub use validate::{
    link_file_name, paper_file_name, sanitize_filename, validate_url, ValidationError,
    MAX_FILENAME_BYTES, MAX_TITLE_CHARS,
};
