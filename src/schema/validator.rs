//! Constraint validation for rows and column references
//!
//! - Every referenced column exists in the table
//! - NOT NULL columns never receive null
//! - Values fall inside CHECK enumerations (null passes, as in SQL)
//!
//! Validation is deterministic: columns are checked in sorted order and the
//! first violation is reported.

use super::check::matches_member;
use super::types::TableConstraints;
use crate::query::{FieldValue, QueryError, QueryResult, Row};

/// Validates input against one table's constraints
pub struct ConstraintValidator<'a> {
    table: &'a str,
    constraints: &'a TableConstraints,
}

impl<'a> ConstraintValidator<'a> {
    pub fn new(table: &'a str, constraints: &'a TableConstraints) -> Self {
        Self { table, constraints }
    }

    /// Every referenced column must exist
    pub fn check_columns<'c, I>(&self, columns: I) -> QueryResult<()>
    where
        I: IntoIterator<Item = &'c str>,
    {
        for column in columns {
            if !self.constraints.has_column(column) {
                return Err(QueryError::UnknownColumn {
                    table: self.table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Check a single value destined for `column`
    pub fn check_value(&self, column: &str, value: &FieldValue) -> QueryResult<()> {
        self.check_columns([column])?;

        if value.is_null() {
            if self.constraints.is_required(column) {
                return Err(QueryError::NullViolation {
                    table: self.table.to_string(),
                    column: column.to_string(),
                });
            }
            return Ok(());
        }

        let candidate = value.literal();
        for check in self.constraints.checks_for(column) {
            let Some(allowed) = check.allowed_values() else {
                continue;
            };
            if !allowed.iter().any(|member| matches_member(&candidate, member)) {
                return Err(QueryError::CheckViolation {
                    table: self.table.to_string(),
                    column: column.to_string(),
                    value: candidate,
                    allowed,
                });
            }
        }
        Ok(())
    }

    /// Check every field of a row
    pub fn check_row(&self, row: &Row) -> QueryResult<()> {
        row.iter()
            .try_for_each(|(column, value)| self.check_value(column, value))
    }
}
