//! # Filter Predicates
//!
//! Caller-supplied `(column, operator, value)` triples are parsed into typed
//! predicates before any store call, then dispatched onto a request through
//! a single exhaustive operator table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use super::errors::{QueryError, QueryResult};
use super::value::FieldValue;
use crate::observability::Event;
use crate::store::TableRequest;

/// The closed set of filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    Is,
    In,
    Contains,
    ContainedBy,
    TextSearch,
}

/// Dispatch entry: forwards one predicate onto a request
type ApplyFn = fn(&mut dyn TableRequest, &str, Value);

impl Operator {
    /// Every operator accepted by select and update
    pub const ALL: [Operator; 13] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Gte,
        Operator::Lt,
        Operator::Lte,
        Operator::Like,
        Operator::Ilike,
        Operator::Is,
        Operator::In,
        Operator::Contains,
        Operator::ContainedBy,
        Operator::TextSearch,
    ];

    /// Operators accepted by delete
    pub const DELETE: [Operator; 3] = [Operator::Eq, Operator::Like, Operator::Ilike];

    /// Get the wire name of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Like => "like",
            Operator::Ilike => "ilike",
            Operator::Is => "is",
            Operator::In => "in",
            Operator::Contains => "contains",
            Operator::ContainedBy => "contained_by",
            Operator::TextSearch => "text_search",
        }
    }

    /// Parse a wire name, rejecting anything outside the closed set
    pub fn parse(name: &str, operation: &str) -> QueryResult<Operator> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == name)
            .ok_or_else(|| QueryError::InvalidOperator {
                operator: name.to_string(),
                operation: operation.to_string(),
            })
    }

    fn dispatch(&self) -> ApplyFn {
        match self {
            Operator::Eq => |q, c, v| q.eq(c, v),
            Operator::Neq => |q, c, v| q.neq(c, v),
            Operator::Gt => |q, c, v| q.gt(c, v),
            Operator::Gte => |q, c, v| q.gte(c, v),
            Operator::Lt => |q, c, v| q.lt(c, v),
            Operator::Lte => |q, c, v| q.lte(c, v),
            Operator::Like => |q, c, v| q.like(c, v),
            Operator::Ilike => |q, c, v| q.ilike(c, v),
            Operator::Is => |q, c, v| q.is(c, v),
            Operator::In => |q, c, v| q.in_(c, v),
            Operator::Contains => |q, c, v| q.contains(c, v),
            Operator::ContainedBy => |q, c, v| q.contained_by(c, v),
            Operator::TextSearch => |q, c, v| q.text_search(c, v),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::parse(s, "filter")
    }
}

/// A caller-supplied filter before validation
///
/// Deserializes from either `["status", "eq", "done"]` or
/// `{"column": "status", "operator": "eq", "value": "done"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawWhereFilter")]
pub struct WhereFilter {
    pub column: String,
    pub operator: String,
    pub value: FieldValue,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWhereFilter {
    Triple(String, String, FieldValue),
    Named {
        column: String,
        operator: String,
        #[serde(default)]
        value: FieldValue,
    },
}

impl From<RawWhereFilter> for WhereFilter {
    fn from(raw: RawWhereFilter) -> Self {
        match raw {
            RawWhereFilter::Triple(column, operator, value)
            | RawWhereFilter::Named {
                column,
                operator,
                value,
            } => WhereFilter {
                column,
                operator,
                value,
            },
        }
    }
}

impl WhereFilter {
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(column, Operator::Eq.as_str(), value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(column, Operator::Like.as_str(), pattern.into())
    }

    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(column, Operator::Ilike.as_str(), pattern.into())
    }
}

/// A validated filter ready to be applied
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPredicate {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl FilterPredicate {
    /// Validate a filter against the operators `operation` accepts
    pub fn parse(filter: &WhereFilter, allowed: &[Operator], operation: &str) -> QueryResult<Self> {
        let column = filter.column.trim();
        if column.is_empty() {
            return Err(QueryError::InvalidColumn(
                "filter column must not be empty".to_string(),
            ));
        }

        let operator = Operator::parse(filter.operator.trim(), operation)?;
        if !allowed.contains(&operator) {
            return Err(QueryError::InvalidOperator {
                operator: operator.as_str().to_string(),
                operation: operation.to_string(),
            });
        }

        filter.value.check_encodable(column)?;
        let value = filter.value.to_wire();
        match operator {
            Operator::In if !value.is_array() => {
                return Err(QueryError::InvalidArgument(format!(
                    "operator 'in' on column '{}' requires a list",
                    column
                )));
            }
            Operator::Is if !(value.is_null() || value.is_boolean()) => {
                return Err(QueryError::InvalidArgument(format!(
                    "operator 'is' on column '{}' accepts only null, true or false",
                    column
                )));
            }
            _ => {}
        }

        Ok(Self {
            column: column.to_string(),
            operator,
            value,
        })
    }

    /// Forward this predicate onto a request
    pub fn apply(&self, request: &mut dyn TableRequest) {
        trace!(
            event = Event::FilterApplied.as_str(),
            column = %self.column,
            operator = self.operator.as_str(),
        );
        (self.operator.dispatch())(request, &self.column, self.value.clone());
    }
}

/// Validate every filter, failing on the first invalid one
pub fn parse_filters(
    filters: &[WhereFilter],
    allowed: &[Operator],
    operation: &str,
) -> QueryResult<Vec<FilterPredicate>> {
    filters
        .iter()
        .map(|f| FilterPredicate::parse(f, allowed, operation))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_operators() {
        for op in Operator::ALL {
            assert_eq!(Operator::parse(op.as_str(), "select").unwrap(), op);
        }
        assert_eq!("contained_by".parse::<Operator>().unwrap(), Operator::ContainedBy);
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let err = Operator::parse("between", "select").unwrap_err();
        match err {
            QueryError::InvalidOperator { operator, operation } => {
                assert_eq!(operator, "between");
                assert_eq!(operation, "select");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_delete_whitelist() {
        let filter = WhereFilter::new("priority", "gt", 3);
        let err = FilterPredicate::parse(&filter, &Operator::DELETE, "delete").unwrap_err();
        assert!(matches!(err, QueryError::InvalidOperator { .. }));

        let filter = WhereFilter::ilike("name", "%draft%");
        assert!(FilterPredicate::parse(&filter, &Operator::DELETE, "delete").is_ok());
    }

    #[test]
    fn test_empty_column_checked_before_operator() {
        let filter = WhereFilter::new("  ", "between", 1);
        let err = FilterPredicate::parse(&filter, &Operator::ALL, "select").unwrap_err();
        assert!(matches!(err, QueryError::InvalidColumn(_)));
    }

    #[test]
    fn test_in_requires_list_and_is_requires_null_or_bool() {
        let bad_in = WhereFilter::new("id", "in", "1,2");
        assert!(matches!(
            FilterPredicate::parse(&bad_in, &Operator::ALL, "select"),
            Err(QueryError::InvalidArgument(_))
        ));

        let bad_is = WhereFilter::new("deleted_at", "is", "yesterday");
        assert!(matches!(
            FilterPredicate::parse(&bad_is, &Operator::ALL, "select"),
            Err(QueryError::InvalidArgument(_))
        ));

        let ok_is = WhereFilter::new("deleted_at", "is", FieldValue::Null);
        assert!(FilterPredicate::parse(&ok_is, &Operator::ALL, "select").is_ok());
    }

    #[test]
    fn test_where_filter_deserializes_from_triple_or_object() {
        let triple: WhereFilter = serde_json::from_value(json!(["status", "eq", "done"])).unwrap();
        let named: WhereFilter =
            serde_json::from_value(json!({"column": "status", "operator": "eq", "value": "done"}))
                .unwrap();
        assert_eq!(triple, named);
        assert_eq!(triple.value, FieldValue::from("done"));
    }

    #[test]
    fn test_parse_filters_stops_at_first_invalid() {
        let filters = vec![
            WhereFilter::eq("status", "done"),
            WhereFilter::new("id", "regex", ".*"),
        ];
        assert!(parse_filters(&filters, &Operator::ALL, "select").is_err());
        assert_eq!(parse_filters(&filters[..1], &Operator::ALL, "select").unwrap().len(), 1);
    }
}
