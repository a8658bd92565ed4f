//! Result-set export: CSV, plain-text report and JSON.
//!
//! The JSON form is also the input for `paper-relay download --from`.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use crate::models::{PaperRecord, SearchCriteria, NOT_AVAILABLE};

/// CSV header row
pub const CSV_HEADERS: [&str; 11] = [
    "index",
    "title",
    "authors",
    "published",
    "updated",
    "categories",
    "doi",
    "journal_ref",
    "summary",
    "entry_link",
    "pdf_link",
];

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Nothing to export")]
    Empty,
}

/// A saved search: the criteria plus the records it returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Criteria that produced the records, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<SearchCriteria>,

    /// Records in display order
    pub papers: Vec<PaperRecord>,
}

impl ResultSet {
    pub fn new(criteria: Option<SearchCriteria>, papers: Vec<PaperRecord>) -> Self {
        Self { criteria, papers }
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a saved result set; a bare JSON array of records is also accepted
    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let content = std::fs::read_to_string(path)?;
        if content.trim_start().starts_with('[') {
            let papers: Vec<PaperRecord> = serde_json::from_str(&content)?;
            return Ok(Self::new(None, papers));
        }
        Ok(serde_json::from_str(&content)?)
    }
}

/// Render records as CSV; summaries are flattened to a single line
pub fn to_csv(records: &[PaperRecord]) -> Result<Vec<u8>, ExportError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(CSV_HEADERS)?;

    for (i, paper) in records.iter().enumerate() {
        let index = (i + 1).to_string();
        let authors = paper.author_line();
        let categories = paper.category_line();
        let summary = flatten(&paper.summary);

        wtr.write_record([
            index.as_str(),
            paper.title.as_str(),
            authors.as_str(),
            paper.published_date.as_str(),
            paper.updated_date.as_str(),
            categories.as_str(),
            paper.doi.as_str(),
            paper.journal_ref.as_str(),
            summary.as_str(),
            paper.id.as_str(),
            paper.pdf_url.as_deref().unwrap_or_default(),
        ])?;
    }

    wtr.into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// Write records to a CSV file
pub fn write_csv(path: &Path, records: &[PaperRecord]) -> Result<(), ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    std::fs::write(path, to_csv(records)?)?;
    Ok(())
}

/// Render the plain-text report
pub fn to_text(records: &[PaperRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Found {} matching papers:\n", records.len());

    for (i, paper) in records.iter().enumerate() {
        let _ = writeln!(out, "{}. Title: {}", i + 1, paper.title);
        let _ = writeln!(out, "   Authors: {}", paper.author_line());
        let _ = writeln!(out, "   Published: {}", paper.published_date);
        let _ = writeln!(out, "   Updated: {}", paper.updated_date);
        let _ = writeln!(out, "   Categories: {}", paper.category_line());
        if paper.doi != NOT_AVAILABLE {
            let _ = writeln!(out, "   DOI: {}", paper.doi);
        }
        if paper.journal_ref != NOT_AVAILABLE {
            let _ = writeln!(out, "   Journal ref: {}", paper.journal_ref);
        }
        let _ = writeln!(out, "   Summary: {}", paper.summary);
        let _ = writeln!(out, "   Entry link: {}", paper.id);
        let _ = writeln!(
            out,
            "   PDF link: {}",
            paper.pdf_url.as_deref().unwrap_or_default()
        );
        let _ = writeln!(out, "{}", "-".repeat(80));
    }

    out
}

/// Write the plain-text report to a file
pub fn write_text(path: &Path, records: &[PaperRecord]) -> Result<(), ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty);
    }
    std::fs::write(path, to_text(records))?;
    Ok(())
}

fn flatten(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperRecordBuilder;
    use tempfile::tempdir;

    fn sample() -> Vec<PaperRecord> {
        vec![
            PaperRecordBuilder::new("http://arxiv.org/abs/2301.00001v1", "First, with comma")
                .author("Alice")
                .author("Bob")
                .summary("Line one\nline two")
                .published_date("2023-01-15")
                .updated_date("2023-02-01")
                .categories(vec!["cs.LG".to_string(), "stat.ML".to_string()])
                .doi("10.1000/x")
                .pdf_url("http://arxiv.org/pdf/2301.00001v1")
                .build(),
            PaperRecordBuilder::new("http://arxiv.org/abs/2301.00002v1", "Second")
                .summary("Plain")
                .journal_ref("J. Test 1 (2023)")
                .build(),
        ]
    }

    #[test]
    fn test_csv_layout() {
        let bytes = to_csv(&sample()).unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());

        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, CSV_HEADERS);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(&rows[0][1], "First, with comma");
        assert_eq!(&rows[0][2], "Alice, Bob");
        assert_eq!(&rows[0][5], "cs.LG, stat.ML");
        assert_eq!(&rows[0][8], "Line one line two");
        assert_eq!(&rows[0][10], "http://arxiv.org/pdf/2301.00001v1");
        assert_eq!(&rows[1][6], "N/A");
        assert_eq!(&rows[1][10], "");
    }

    #[test]
    fn test_text_report() {
        let text = to_text(&sample());
        assert!(text.starts_with("Found 2 matching papers:\n\n"));
        assert!(text.contains("1. Title: First, with comma\n"));
        assert!(text.contains("   DOI: 10.1000/x\n"));
        assert!(text.contains("   Journal ref: J. Test 1 (2023)\n"));
        assert_eq!(text.matches("   DOI:").count(), 1);
        assert_eq!(text.matches("   Journal ref:").count(), 1);
        assert_eq!(text.matches(&"-".repeat(80)).count(), 2);
    }

    #[test]
    fn test_result_set_round_trip_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");

        let set = ResultSet::new(Some(SearchCriteria::new("graph")), sample());
        set.save(&path).unwrap();
        assert_eq!(ResultSet::load(&path).unwrap(), set);
    }

    #[test]
    fn test_load_bare_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("papers.json");
        std::fs::write(&path, serde_json::to_string(&sample()).unwrap()).unwrap();

        let set = ResultSet::load(&path).unwrap();
        assert!(set.criteria.is_none());
        assert_eq!(set.papers.len(), 2);
    }

    #[test]
    fn test_empty_exports_rejected() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            write_csv(&dir.path().join("a.csv"), &[]),
            Err(ExportError::Empty)
        ));
        assert!(matches!(
            write_text(&dir.path().join("a.txt"), &[]),
            Err(ExportError::Empty)
        ));
    }
}
