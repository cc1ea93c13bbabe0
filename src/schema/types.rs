//! Constraint schema types
//!
//! A table's constraints as reported by the introspection function: which
//! columns exist, which reject nulls, and the raw CHECK expressions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::check;
use crate::store::{StoreError, StoreResult};

/// A CHECK constraint attached to one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConstraint {
    pub column: String,
    pub expression: String,
}

impl CheckConstraint {
    pub fn new(column: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            expression: expression.into(),
        }
    }

    /// Members of the enumeration this CHECK encodes, if it encodes one
    pub fn allowed_values(&self) -> Option<Vec<String>> {
        check::enumeration_members(&self.expression)
    }
}

/// Constraint schema of one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConstraints {
    pub not_null: BTreeSet<String>,
    pub nullable: BTreeSet<String>,
    pub check: Vec<CheckConstraint>,
}

/// One row returned by the introspection function
#[derive(Debug, Deserialize)]
struct ColumnInfoRow {
    #[serde(default)]
    column_name: Option<String>,
    #[serde(default)]
    is_nullable: Option<String>,
    #[serde(default)]
    check_constraint: Option<String>,
}

impl TableConstraints {
    /// Build constraints from introspection rows
    ///
    /// Rows without a column name are skipped; an empty or null result
    /// yields empty constraints.
    pub fn from_rows(rows: &Value) -> StoreResult<Self> {
        let rows = match rows {
            Value::Null => return Ok(Self::default()),
            Value::Array(rows) => rows,
            other => {
                return Err(StoreError::malformed(format!(
                    "expected column info rows, got {}",
                    other
                )))
            }
        };

        let mut constraints = Self::default();
        for row in rows {
            let info: ColumnInfoRow = serde_json::from_value(row.clone())
                .map_err(|e| StoreError::malformed(format!("invalid column info row: {}", e)))?;

            let Some(column) = info.column_name.filter(|c| !c.is_empty()) else {
                continue;
            };

            let required = info
                .is_nullable
                .as_deref()
                .map_or(false, |n| n.eq_ignore_ascii_case("NO"));
            if required {
                constraints.nullable.remove(&column);
                constraints.not_null.insert(column.clone());
            } else if !constraints.not_null.contains(&column) {
                constraints.nullable.insert(column.clone());
            }

            if let Some(expression) = info.check_constraint.filter(|e| !e.trim().is_empty()) {
                constraints.check.push(CheckConstraint::new(column, expression));
            }
        }
        Ok(constraints)
    }

    /// Whether the column exists in the table
    pub fn has_column(&self, column: &str) -> bool {
        self.not_null.contains(column) || self.nullable.contains(column)
    }

    /// Whether the column rejects nulls
    pub fn is_required(&self, column: &str) -> bool {
        self.not_null.contains(column)
    }

    /// Every known column in sorted order
    pub fn columns(&self) -> Vec<&str> {
        self.not_null
            .union(&self.nullable)
            .map(String::as_str)
            .collect()
    }

    /// CHECK constraints attached to `column`
    pub fn checks_for<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a CheckConstraint> {
        self.check.iter().filter(move |c| c.column == column)
    }

    pub fn is_empty(&self) -> bool {
        self.not_null.is_empty() && self.nullable.is_empty()
    }
}
