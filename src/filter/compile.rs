//! Backend compilation
//!
//! The predicate tree is the same for every query kind. Compiling for a kind
//! checks the references that kind cannot filter on and yields a predicate
//! the executor evaluates over primary rows, joined with the text or vector
//! candidate set for search and similar queries.

use std::fmt;

use super::ast::{Condition, Filter};
use super::eval::evaluate;
use crate::errors::{OakError, OakResult};
use crate::path::RowView;

/// Per-row metrics exposed through ordering only
pub const RESERVED_METRICS: [&str; 4] = ["rank", "distance", "_rank", "_distance"];

/// The three query kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Fetch,
    Search,
    Similar,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Fetch => "fetch",
            QueryKind::Search => "search",
            QueryKind::Similar => "similar",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter compiled for one query kind
#[derive(Debug, Clone)]
pub struct BackendPredicate {
    kind: QueryKind,
    groups: Vec<Vec<Condition>>,
    match_all: bool,
}

impl BackendPredicate {
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn matches_all(&self) -> bool {
        self.match_all
    }

    /// True if any group has all of its conditions satisfied
    pub fn matches(&self, row: &RowView<'_>) -> bool {
        self.match_all
            || self
                .groups
                .iter()
                .any(|group| group.iter().all(|condition| evaluate(condition, row)))
    }
}

impl Filter {
    /// Compiles the tree for `kind`, rejecting references to derived metrics.
    pub fn to_backend(&self, kind: QueryKind) -> OakResult<BackendPredicate> {
        if let Some(condition) = self
            .conditions()
            .find(|c| RESERVED_METRICS.contains(&c.reference.as_str()))
        {
            return Err(OakError::malformed(
                &condition.reference,
                format!(
                    "'{}' is a derived metric and can only be used for ordering",
                    condition.reference
                ),
            ));
        }

        Ok(BackendPredicate {
            kind,
            match_all: self.matches_all(),
            groups: self
                .groups
                .iter()
                .map(|group| group.conditions.clone())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn row(value: &Value) -> RowView<'_> {
        RowView {
            key: "k",
            value,
            created: "2024-01-01T00:00:00.000000Z",
            updated: "2024-01-01T00:00:00.000000Z",
        }
    }

    #[test]
    fn test_reserved_metrics_rejected_for_every_kind() {
        for reference in RESERVED_METRICS {
            let mut expression = serde_json::Map::new();
            expression.insert(format!("{}__gt", reference), json!(0.5));
            let filter = Filter::parse(&Value::Object(expression)).unwrap();
            for kind in [QueryKind::Fetch, QueryKind::Search, QueryKind::Similar] {
                let err = filter.to_backend(kind).unwrap_err();
                assert_eq!(err.code(), "OAK_MALFORMED_FILTER");
            }
        }
    }

    #[test]
    fn test_nested_metric_name_is_a_document_field() {
        let filter = Filter::parse(&json!({"stats.rank": 1})).unwrap();
        let predicate = filter.to_backend(QueryKind::Search).unwrap();
        assert!(predicate.matches(&row(&json!({"stats": {"rank": 1}}))));
    }

    #[test]
    fn test_or_of_and_groups() {
        let filter = Filter::parse(&json!([
            {"score__gte": 30},
            {"score__lt": 15, "kind": "a"}
        ]))
        .unwrap();
        let predicate = filter.to_backend(QueryKind::Fetch).unwrap();

        assert!(predicate.matches(&row(&json!({"score": 40}))));
        assert!(predicate.matches(&row(&json!({"score": 10, "kind": "a"}))));
        assert!(!predicate.matches(&row(&json!({"score": 10, "kind": "b"}))));
        assert!(!predicate.matches(&row(&json!({"score": 20}))));
    }

    #[test]
    fn test_same_result_for_every_kind() {
        let filter = Filter::parse(&json!({"user.profile.age__gte": 21})).unwrap();
        let young = json!({"user": {"profile": {"age": 19}}});
        let adult = json!({"user": {"profile": {"age": 22}}});
        for kind in [QueryKind::Fetch, QueryKind::Search, QueryKind::Similar] {
            let predicate = filter.to_backend(kind).unwrap();
            assert_eq!(predicate.kind(), kind);
            assert!(!predicate.matches(&row(&young)));
            assert!(predicate.matches(&row(&adult)));
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let predicate = Filter::all().to_backend(QueryKind::Fetch).unwrap();
        assert!(predicate.matches_all());
        assert!(predicate.matches(&row(&json!(null))));
    }
}
