//! Query builder.
//!
//! Queries are immutable values; every method returns a new query.
//!
//! ```rust
//! use docvault_store::{Direction, FilterOp, Query};
//!
//! let query = Query::new()
//!     .filter("age", FilterOp::Gte, 18)
//!     .order_by("name", Direction::Asc)
//!     .limit(10);
//! assert_eq!(query.filters().len(), 1);
//! ```

use std::fmt;
use std::str::FromStr;

use docvault_validator::Value;

use crate::error::StoreError;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Filter operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    ArrayContains,
    ArrayContainsAny,
}

impl FilterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "in",
            Self::NotIn => "not-in",
            Self::ArrayContains => "array-contains",
            Self::ArrayContainsAny => "array-contains-any",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" => Self::Eq,
            "!=" => Self::NotEq,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "in" => Self::In,
            "not-in" => Self::NotIn,
            "array-contains" => Self::ArrayContains,
            "array-contains-any" => Self::ArrayContainsAny,
            other => return Err(StoreError::unsupported(format!("filter operator `{other}`"))),
        })
    }
}

/// `path op value` condition on a dot-separated field path.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub path: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub path: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    StartAt,
    StartAfter,
    EndBefore,
    EndAt,
}

/// Pagination cursor: values matched against the query's order fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub kind: CursorKind,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    First(usize),
    Last(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    ids: Vec<String>,
    filters: Vec<Filter>,
    order: Vec<Order>,
    start: Option<Cursor>,
    end: Option<Cursor>,
    limit: Option<Limit>,
    offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict results to the given document IDs.
    #[must_use = "builder methods must be chained or built"]
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn filter(mut self, path: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            path: path.into(),
            op,
            value: value.into(),
        });
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn order_by(mut self, path: impl Into<String>, direction: Direction) -> Self {
        self.order.push(Order {
            path: path.into(),
            direction,
        });
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn start_at(self, values: impl IntoIterator<Item = Value>) -> Self {
        self.with_start(CursorKind::StartAt, values)
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn start_after(self, values: impl IntoIterator<Item = Value>) -> Self {
        self.with_start(CursorKind::StartAfter, values)
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn end_before(self, values: impl IntoIterator<Item = Value>) -> Self {
        self.with_end(CursorKind::EndBefore, values)
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn end_at(self, values: impl IntoIterator<Item = Value>) -> Self {
        self.with_end(CursorKind::EndAt, values)
    }

    /// Keep the first `n` results. Replaces any `limit_to_last`.
    #[must_use = "builder methods must be chained or built"]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(Limit::First(n));
        self
    }

    /// Keep the last `n` results. Replaces any `limit`.
    #[must_use = "builder methods must be chained or built"]
    pub fn limit_to_last(mut self, n: usize) -> Self {
        self.limit = Some(Limit::Last(n));
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = n;
        self
    }

    fn with_start(mut self, kind: CursorKind, values: impl IntoIterator<Item = Value>) -> Self {
        self.start = Some(Cursor {
            kind,
            values: values.into_iter().collect(),
        });
        self
    }

    fn with_end(mut self, kind: CursorKind, values: impl IntoIterator<Item = Value>) -> Self {
        self.end = Some(Cursor {
            kind,
            values: values.into_iter().collect(),
        });
        self
    }

    // ===== accessors =====

    pub fn id_list(&self) -> &[String] {
        &self.ids
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> &[Order] {
        &self.order
    }

    pub fn start_cursor(&self) -> Option<&Cursor> {
        self.start.as_ref()
    }

    pub fn end_cursor(&self) -> Option<&Cursor> {
        self.end.as_ref()
    }

    pub fn limit_value(&self) -> Option<Limit> {
        self.limit
    }

    pub fn offset_value(&self) -> usize {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("==", FilterOp::Eq)]
    #[case("<=", FilterOp::Lte)]
    #[case("not-in", FilterOp::NotIn)]
    #[case("array-contains-any", FilterOp::ArrayContainsAny)]
    fn parses_operators(#[case] input: &str, #[case] op: FilterOp) {
        assert_eq!(input.parse::<FilterOp>().unwrap(), op);
        assert_eq!(op.to_string(), input);
    }

    #[test]
    fn unknown_operator_is_unsupported() {
        let err = "~=".parse::<FilterOp>().unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED");
    }

    #[test]
    fn limits_replace_each_other() {
        let query = Query::new().limit(3).limit_to_last(2);
        assert_eq!(query.limit_value(), Some(Limit::Last(2)));
        let query = query.limit(5);
        assert_eq!(query.limit_value(), Some(Limit::First(5)));
    }

    #[test]
    fn builder_accumulates() {
        let query = Query::new()
            .ids(["a", "b"])
            .filter("age", FilterOp::Gt, 20)
            .order_by("age", Direction::Desc)
            .start_after([Value::Int(30)])
            .offset(1);
        assert_eq!(query.id_list(), ["a", "b"]);
        assert_eq!(query.ordering()[0].direction, Direction::Desc);
        assert_eq!(
            query.start_cursor().map(|c| c.kind),
            Some(CursorKind::StartAfter)
        );
        assert_eq!(query.offset_value(), 1);
    }
}
