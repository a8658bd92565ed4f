//! Search criteria models.

use serde::{Deserialize, Serialize};

/// Smallest accepted result limit
pub const MIN_RESULTS: usize = 1;
/// Largest accepted result limit
pub const MAX_RESULTS: usize = 1000;
/// Result limit used when the caller does not choose one
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// How keyword tokens must match a paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every token must appear in both the title and the abstract ("precise")
    #[default]
    All,
    /// Every token must appear in the title or the abstract ("fuzzy")
    Any,
}

impl MatchMode {
    /// Wire name used by the relay server
    pub fn wire_name(&self) -> &'static str {
        match self {
            MatchMode::All => "precise",
            MatchMode::Any => "fuzzy",
        }
    }
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Search criteria as entered by the user
///
/// An inverted year range is not rejected here; the backend simply returns
/// no matches for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Ordered, non-empty keyword tokens
    pub keywords: Vec<String>,

    /// Token matching mode
    pub match_mode: MatchMode,

    /// First year of the submission range (inclusive)
    pub start_year: Option<u16>,

    /// Last year of the submission range (inclusive)
    pub end_year: Option<u16>,

    /// Maximum number of results, within `1..=1000`
    pub max_results: usize,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            match_mode: MatchMode::All,
            start_year: None,
            end_year: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl SearchCriteria {
    /// Create criteria from raw keyword input, split on whitespace
    pub fn new(keywords: impl AsRef<str>) -> Self {
        Self::from_tokens(keywords.as_ref().split_whitespace())
    }

    /// Create criteria from already-split tokens; blank tokens are discarded
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Self {
            keywords,
            ..Default::default()
        }
    }

    /// Set the match mode
    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Set the first year of the range
    pub fn start_year(mut self, year: u16) -> Self {
        self.start_year = Some(year);
        self
    }

    /// Set the last year of the range
    pub fn end_year(mut self, year: u16) -> Self {
        self.end_year = Some(year);
        self
    }

    /// Set the result limit, clamped into `1..=1000`
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max.clamp(MIN_RESULTS, MAX_RESULTS);
        self
    }

    /// Keywords joined back into the raw form the relay server expects
    pub fn keyword_line(&self) -> String {
        self.keywords.join(" ")
    }

    /// Whether there is anything to search for
    pub fn has_keywords(&self) -> bool {
        !self.keywords.is_empty()
    }
}
