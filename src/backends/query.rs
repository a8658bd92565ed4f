//! Backend-specific query construction.
//!
//! Direct mode turns the criteria into an arXiv `search_query` expression;
//! proxied mode hands the raw fields to the relay server untouched.

use serde_json::{json, Value};

use crate::config::BackendMode;
use crate::models::{MatchMode, SearchCriteria};

/// Lower date bound used when no start year is given
const OPEN_START: &str = "00010101";
/// Upper date bound used when no end year is given
const OPEN_END: &str = "99991231";

/// Query produced for one backend
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// arXiv `search_query` expression (direct mode)
    Expression(String),
    /// Raw request fields (proxied mode)
    Fields(SearchFields),
}

impl Query {
    /// The expression, if this is a direct-mode query
    pub fn expression(&self) -> Option<&str> {
        match self {
            Query::Expression(expr) => Some(expr),
            Query::Fields(_) => None,
        }
    }

    /// The request fields, if this is a proxied-mode query
    pub fn fields(&self) -> Option<&SearchFields> {
        match self {
            Query::Expression(_) => None,
            Query::Fields(fields) => Some(fields),
        }
    }
}

/// Raw criteria fields sent to the relay server's `/search`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFields {
    pub keywords: String,
    pub search_mode: &'static str,
    pub max_results: usize,
    pub start_year: Option<u16>,
    pub end_year: Option<u16>,
}

impl SearchFields {
    /// JSON body; absent years are omitted rather than sent as `null`
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "keywords": self.keywords,
            "search_mode": self.search_mode,
            "max_results": self.max_results,
        });

        if let Some(year) = self.start_year {
            body["start_year"] = json!(year);
        }
        if let Some(year) = self.end_year {
            body["end_year"] = json!(year);
        }

        body
    }
}

/// Build the query for `mode`. Never fails; no keywords yields an empty expression.
pub fn build(criteria: &SearchCriteria, mode: BackendMode) -> Query {
    match mode {
        BackendMode::Direct => Query::Expression(build_expression(criteria)),
        BackendMode::Proxied => Query::Fields(SearchFields {
            keywords: criteria.keyword_line(),
            search_mode: criteria.match_mode.wire_name(),
            max_results: criteria.max_results,
            start_year: criteria.start_year,
            end_year: criteria.end_year,
        }),
    }
}

/// Build the arXiv search expression
pub fn build_expression(criteria: &SearchCriteria) -> String {
    let joiner = match criteria.match_mode {
        MatchMode::All => "AND",
        MatchMode::Any => "OR",
    };

    let clauses: Vec<String> = criteria
        .keywords
        .iter()
        .map(|k| format!("(ti:{k} {joiner} abs:{k})"))
        .collect();

    if clauses.is_empty() {
        return String::new();
    }

    let mut expression = clauses.join(" AND ");
    if let Some(range) = date_range(criteria.start_year, criteria.end_year) {
        expression.push_str(" AND ");
        expression.push_str(&range);
    }
    expression
}

/// `submittedDate` range clause, or `None` when neither year is set
pub fn date_range(start_year: Option<u16>, end_year: Option<u16>) -> Option<String> {
    if start_year.is_none() && end_year.is_none() {
        return None;
    }

    let from = start_year
        .map(|y| format!("{y:04}0101"))
        .unwrap_or_else(|| OPEN_START.to_string());
    let to = end_year
        .map(|y| format!("{y:04}1231"))
        .unwrap_or_else(|| OPEN_END.to_string());

    Some(format!("submittedDate:[{from} TO {to}]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precise_expression() {
        let criteria = SearchCriteria::new("quantum entanglement");
        assert_eq!(
            build_expression(&criteria),
            "(ti:quantum AND abs:quantum) AND (ti:entanglement AND abs:entanglement)"
        );
    }

    #[test]
    fn test_fuzzy_expression() {
        let criteria = SearchCriteria::new("quantum entanglement").match_mode(MatchMode::Any);
        assert_eq!(
            build_expression(&criteria),
            "(ti:quantum OR abs:quantum) AND (ti:entanglement OR abs:entanglement)"
        );
    }

    #[test]
    fn test_year_range_both() {
        let criteria = SearchCriteria::new("graph").start_year(2015).end_year(2020);
        assert_eq!(
            build_expression(&criteria),
            "(ti:graph AND abs:graph) AND submittedDate:[20150101 TO 20201231]"
        );
    }

    #[test]
    fn test_year_range_open_ends() {
        assert_eq!(
            date_range(Some(2015), None).as_deref(),
            Some("submittedDate:[20150101 TO 99991231]")
        );
        assert_eq!(
            date_range(None, Some(2020)).as_deref(),
            Some("submittedDate:[00010101 TO 20201231]")
        );
        assert_eq!(date_range(None, None), None);
    }

    #[test]
    fn test_no_year_no_clause() {
        let criteria = SearchCriteria::new("graph");
        assert!(!build_expression(&criteria).contains("submittedDate"));
    }

    #[test]
    fn test_empty_keywords_degrade() {
        let criteria = SearchCriteria::new("").start_year(2015);
        assert_eq!(build(&criteria, BackendMode::Direct).expression(), Some(""));
    }

    #[test]
    fn test_proxied_fields_pass_through() {
        let criteria = SearchCriteria::new("graph networks")
            .match_mode(MatchMode::Any)
            .start_year(2018)
            .max_results(25);

        let query = build(&criteria, BackendMode::Proxied);
        let fields = query.fields().unwrap();
        assert_eq!(fields.keywords, "graph networks");
        assert_eq!(fields.search_mode, "fuzzy");

        let body = fields.to_json();
        assert_eq!(body["max_results"], 25);
        assert_eq!(body["start_year"], 2018);
        assert!(body.get("end_year").is_none());
    }
}
