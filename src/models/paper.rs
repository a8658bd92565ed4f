//! Normalized paper record shared by both backends.

use serde::{Deserialize, Serialize};

/// Placeholder stored for DOI and journal reference when the backend has none
pub const NOT_AVAILABLE: &str = "N/A";

/// One search result, independent of the backend that produced it.
///
/// Records are created by the response normalizers and are never mutated
/// afterwards; callers clone them into selections for downloading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Opaque backend-scoped identifier, usually the abstract page URL
    pub id: String,

    /// Paper title
    pub title: String,

    /// Authors in the order the backend listed them
    pub authors: Vec<String>,

    /// Abstract text
    pub summary: String,

    /// Publication date (`YYYY-MM-DD`)
    pub published_date: String,

    /// Last updated date (`YYYY-MM-DD`)
    pub updated_date: String,

    /// Subject categories in backend order
    pub categories: Vec<String>,

    /// Digital Object Identifier or `"N/A"`
    pub doi: String,

    /// Journal reference or `"N/A"`
    pub journal_ref: String,

    /// Direct PDF link, when the backend supplied one
    pub pdf_url: Option<String>,
}

impl PaperRecord {
    /// Final path segment of the opaque id (`http://arxiv.org/abs/2301.12345v1` -> `2301.12345v1`)
    pub fn short_id(&self) -> &str {
        self.id
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.id)
    }

    /// Check if the record carries a downloadable PDF link
    pub fn has_pdf(&self) -> bool {
        self.pdf_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// Author names joined for display
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }

    /// Categories joined for display
    pub fn category_line(&self) -> String {
        self.categories.join(", ")
    }
}

/// Builder for constructing [`PaperRecord`] values
#[derive(Debug, Clone)]
pub struct PaperRecordBuilder {
    record: PaperRecord,
}

impl PaperRecordBuilder {
    /// Create a new builder with the identifying fields
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            record: PaperRecord {
                id: id.into(),
                title: title.into(),
                authors: Vec::new(),
                summary: String::new(),
                published_date: String::new(),
                updated_date: String::new(),
                categories: Vec::new(),
                doi: NOT_AVAILABLE.to_string(),
                journal_ref: NOT_AVAILABLE.to_string(),
                pdf_url: None,
            },
        }
    }

    /// Set authors
    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.record.authors = authors;
        self
    }

    /// Add a single author
    pub fn author(mut self, name: impl Into<String>) -> Self {
        self.record.authors.push(name.into());
        self
    }

    /// Set abstract
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.record.summary = summary.into();
        self
    }

    /// Set publication date; any time-of-day suffix is dropped
    pub fn published_date(mut self, date: impl AsRef<str>) -> Self {
        self.record.published_date = date_portion(date.as_ref());
        self
    }

    /// Set updated date; any time-of-day suffix is dropped
    pub fn updated_date(mut self, date: impl AsRef<str>) -> Self {
        self.record.updated_date = date_portion(date.as_ref());
        self
    }

    /// Set categories
    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.record.categories = categories;
        self
    }

    /// Set DOI; blank values keep the `"N/A"` placeholder
    pub fn doi(mut self, doi: impl AsRef<str>) -> Self {
        self.record.doi = or_not_available(doi.as_ref());
        self
    }

    /// Set journal reference; blank values keep the `"N/A"` placeholder
    pub fn journal_ref(mut self, journal_ref: impl AsRef<str>) -> Self {
        self.record.journal_ref = or_not_available(journal_ref.as_ref());
        self
    }

    /// Set PDF URL
    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.record.pdf_url = if url.trim().is_empty() { None } else { Some(url) };
        self
    }

    /// Build the record
    pub fn build(self) -> PaperRecord {
        self.record
    }
}

/// Strip a time-of-day suffix: `2023-04-12T12:34:56Z` -> `2023-04-12`
pub fn date_portion(raw: &str) -> String {
    let raw = raw.trim();
    raw.split(['T', ' ']).next().unwrap_or(raw).to_string()
}

fn or_not_available(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}
