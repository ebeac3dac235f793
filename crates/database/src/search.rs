//! Search requests and bulk-operation reports.

use crate::error::{ErrorKind, Result};
use recordbase_query::{Filter, Query, Values};
use recordbase_record::Model;
use std::fmt;

/// What to fetch from a database.
///
/// Filter terms are the record style's search fields plus `name`, which every
/// backend resolves itself. A native [`Query`] replaces the style's filter
/// terms; it may still be narrowed by `name`. A keyword is a full-text search
/// over the record content (see [`Model::mentions`]) and stands alone: only
/// `name` may go with it.
///
/// [`Model::mentions`]: recordbase_record::Model::mentions
///
/// ```
/// use recordbase_database::Search;
///
/// let search = Search::new("widget").name(["w1", "w2"]).with("count", 3);
/// assert!(search.validate().is_ok());
/// assert_eq!(search.to_string(), "widget (count=3, name=w1|w2)");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Search {
    pub style: String,
    pub filter: Filter,
    pub query: Option<Query>,
    pub keyword: Option<String>,
    /// Rebuild cached metadata before searching (local backend only).
    pub refresh_cache: bool,
}

impl Search {
    pub fn new(style: impl Into<String>) -> Self {
        Self { style: style.into(), ..Self::default() }
    }

    pub fn name(mut self, names: impl Into<Values>) -> Self {
        self.filter.insert("name", names);
        self
    }

    pub fn with(mut self, field: impl Into<String>, values: impl Into<Values>) -> Self {
        self.filter.insert(field, values);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = Some(query);
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn refresh_cache(mut self, refresh: bool) -> Self {
        self.refresh_cache = refresh;
        self
    }

    /// The `name` constraint, if any.
    pub fn names(&self) -> Option<&Values> {
        self.filter.get("name")
    }

    /// Filter terms handed to the record style.
    pub fn terms(&self) -> Filter {
        self.filter.without_name()
    }

    /// Whether a record with this content passes the keyword, if any.
    pub fn keeps(&self, content: &Model) -> bool {
        self.keyword.as_deref().is_none_or(|keyword| content.mentions(keyword))
    }

    /// Reject a native query or keyword combined with style filter terms, and
    /// a keyword combined with a native query.
    pub fn validate(&self) -> Result<()> {
        if self.keyword.is_some() && self.query.is_some() {
            exn::bail!(ErrorKind::ConflictingArguments("a keyword cannot be combined with a native query".into()));
        }
        if self.keyword.is_some() && !self.terms().is_empty() {
            exn::bail!(ErrorKind::ConflictingArguments(format!(
                "a keyword cannot be combined with filter terms ({})",
                self.terms()
            )));
        }
        if self.query.is_some() && !self.terms().is_empty() {
            exn::bail!(ErrorKind::ConflictingArguments(format!(
                "a native query cannot be combined with filter terms ({})",
                self.terms()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.style)?;
        match (&self.query, self.filter.is_empty()) {
            (Some(query), true) => write!(f, " {query}")?,
            (Some(query), false) => write!(f, " ({}) {query}", self.filter)?,
            (None, false) => write!(f, " ({})", self.filter)?,
            (None, true) => {},
        }
        match &self.keyword {
            Some(keyword) => write!(f, " {keyword:?}"),
            None => Ok(()),
        }
    }
}

/// How [`Database::copy_records`](crate::Database::copy_records) treats the
/// destination. By default existing records are left alone and archives
/// travel with their records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace records (and archives) that already exist at the destination.
    pub overwrite: bool,
    pub include_archives: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self { overwrite: false, include_archives: true }
    }
}

/// Per-item outcome counts of a copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub archives_added: usize,
    pub archives_updated: usize,
    pub archives_skipped: usize,
    pub archives_failed: usize,
}

impl fmt::Display for CopyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records: {} added, {} updated, {} skipped, {} failed; archives: {} added, {} updated, {} skipped, {} failed",
            self.added,
            self.updated,
            self.skipped,
            self.failed,
            self.archives_added,
            self.archives_updated,
            self.archives_skipped,
            self.archives_failed,
        )
    }
}

/// Per-item outcome counts of a destroy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DestroyReport {
    pub deleted: usize,
    pub failed: usize,
    pub archives_deleted: usize,
    pub archives_failed: usize,
}

impl fmt::Display for DestroyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "records: {} deleted, {} failed; archives: {} deleted, {} failed",
            self.deleted, self.failed, self.archives_deleted, self.archives_failed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn query() -> Query {
        serde_json::from_value(json!({"content.widget.label": "a"})).unwrap()
    }

    #[test]
    fn test_query_with_terms_conflicts() {
        let err = Search::new("widget").with("label", "a").query(query()).validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ConflictingArguments(_)));
    }

    #[test]
    fn test_query_with_name_is_allowed() {
        let search = Search::new("widget").name("w1").query(query());
        assert!(search.validate().is_ok());
        assert!(search.terms().is_empty());
        assert_eq!(search.names().map(Values::len), Some(1));
    }

    #[rstest]
    #[case(Search::new("FAQ").keyword("sky").query(query()))]
    #[case(Search::new("FAQ").keyword("sky").with("question", "why"))]
    fn test_keyword_stands_alone(#[case] search: Search) {
        let err = search.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ConflictingArguments(msg) if msg.contains("keyword")));
    }

    #[test]
    fn test_keyword_with_name() {
        let search = Search::new("FAQ").name("q1").keyword("sky");
        assert!(search.validate().is_ok());
        assert_eq!(search.to_string(), r#"FAQ (name=q1) "sky""#);
        assert!(search.keeps(&Model::new("faq", json!({"question": "Sky?"}))));
        assert!(!search.keeps(&Model::new("faq", json!({"question": "Sea?"}))));
        assert!(Search::new("FAQ").keeps(&Model::new("faq", json!({}))));
    }

    #[test]
    fn test_copy_includes_archives_by_default() {
        let options = CopyOptions::default();
        assert!(options.include_archives);
        assert!(!options.overwrite);
    }

    #[test]
    fn test_report_display() {
        let report = CopyReport { added: 2, skipped: 1, ..CopyReport::default() };
        assert!(report.to_string().starts_with("records: 2 added, 0 updated, 1 skipped"));
    }
}
