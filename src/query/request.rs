//! # Query Requests
//!
//! Request values for each executor operation. They can be built fluently
//! or deserialized from JSON, and may carry a cancellation token.

use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use tokio_util::sync::CancellationToken;

use super::errors::{QueryError, QueryResult};
use super::filter::WhereFilter;
use super::value::Row;
use crate::store::{Returning, SortDirection};

/// Column selection for reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Fields {
    /// Every column (`*`)
    #[default]
    All,
    Columns(Vec<String>),
}

impl Fields {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.len() == 1 && columns[0] == "*" {
            Fields::All
        } else {
            Fields::Columns(columns)
        }
    }

    /// Reject an empty list or blank column names
    pub fn validate(&self) -> QueryResult<()> {
        match self {
            Fields::All => Ok(()),
            Fields::Columns(columns) if columns.is_empty() => Err(QueryError::InvalidArgument(
                "fields must be \"*\" or a non-empty list of columns".to_string(),
            )),
            Fields::Columns(columns) => {
                if columns.iter().any(|c| c.trim().is_empty()) {
                    return Err(QueryError::InvalidColumn(
                        "field names must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Columns referenced explicitly; `*` references none
    pub fn referenced(&self) -> impl Iterator<Item = &str> {
        let columns: &[String] = match self {
            Fields::All => &[],
            Fields::Columns(columns) => columns,
        };
        columns.iter().map(|c| c.trim())
    }

    /// Comma-separated select clause
    pub fn select_clause(&self) -> String {
        match self {
            Fields::All => "*".to_string(),
            Fields::Columns(columns) => columns
                .iter()
                .map(|c| c.trim())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Fields::All => serializer.serialize_str("*"),
            Fields::Columns(columns) => columns.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"*\" or a list of column names")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Fields, E> {
                if v.trim() == "*" {
                    Ok(Fields::All)
                } else {
                    Ok(Fields::columns(v.split(',').map(str::trim)))
                }
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Fields, A::Error> {
                let mut columns: Vec<String> = Vec::new();
                while let Some(column) = seq.next_element()? {
                    columns.push(column);
                }
                Ok(Fields::columns(columns))
            }
        }

        deserializer.deserialize_any(FieldsVisitor)
    }
}

/// One ordering term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,

    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// An embedded foreign table joined on `join_column = foreign_key`
///
/// Matching foreign rows are nested under the foreign table's name; base
/// rows without a match are dropped. Filters on `<foreign_table>.<column>`
/// narrow the embedded rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub foreign_table: String,

    /// Column of the base table
    pub join_column: String,

    /// Column of the foreign table
    pub foreign_key: String,
}

impl Join {
    pub fn new(
        foreign_table: impl Into<String>,
        join_column: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            foreign_table: foreign_table.into(),
            join_column: join_column.into(),
            foreign_key: foreign_key.into(),
        }
    }

    /// Reject blank table or column names
    pub fn validate(&self) -> QueryResult<()> {
        if self.foreign_table.trim().is_empty() {
            return Err(QueryError::InvalidArgument(
                "join foreign table must not be empty".to_string(),
            ));
        }
        if self.join_column.trim().is_empty() || self.foreign_key.trim().is_empty() {
            return Err(QueryError::InvalidColumn(
                "join columns must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The foreign column a `<foreign_table>.<column>` reference names
    pub fn embedded_column<'c>(&self, column: &'c str) -> Option<&'c str> {
        column
            .strip_prefix(self.foreign_table.trim())
            .and_then(|rest| rest.strip_prefix('.'))
    }
}

/// A read against one table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectQuery {
    pub table: String,

    #[serde(default)]
    pub fields: Fields,

    #[serde(default)]
    pub filters: Vec<WhereFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,

    #[serde(default)]
    pub order_by: Vec<OrderBy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<Join>,

    /// Check referenced columns against the table's constraint schema
    #[serde(default)]
    pub validate: bool,

    #[serde(skip)]
    pub cancel: Option<CancellationToken>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn filter(mut self, filter: WhereFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = WhereFilter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.join = Some(join);
        self
    }

    pub fn validated(mut self) -> Self {
        self.validate = true;
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

fn default_on_conflict() -> String {
    "id".to_string()
}

/// Accepts either a single row object or a list of rows
fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Row>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Row>),
        One(Row),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(rows) => rows,
        OneOrMany::One(row) => vec![row],
    })
}

/// A write of one or more rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertQuery {
    pub table: String,

    #[serde(deserialize_with = "one_or_many")]
    pub rows: Vec<Row>,

    #[serde(default)]
    pub upsert: bool,

    #[serde(default = "default_on_conflict")]
    pub on_conflict: String,

    #[serde(default)]
    pub ignore_duplicates: bool,

    #[serde(default)]
    pub returning: Returning,

    #[serde(default)]
    pub validate: bool,

    #[serde(skip)]
    pub cancel: Option<CancellationToken>,
}

impl InsertQuery {
    pub fn one(table: impl Into<String>, row: Row) -> Self {
        Self::many(table, vec![row])
    }

    pub fn many(table: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            table: table.into(),
            rows,
            upsert: false,
            on_conflict: default_on_conflict(),
            ignore_duplicates: false,
            returning: Returning::default(),
            validate: false,
            cancel: None,
        }
    }

    /// Resolve conflicts on `column` instead of failing
    pub fn upsert_on(mut self, column: impl Into<String>) -> Self {
        self.upsert = true;
        self.on_conflict = column.into();
        self
    }

    pub fn ignore_duplicates(mut self) -> Self {
        self.ignore_duplicates = true;
        self
    }

    pub fn returning(mut self, returning: Returning) -> Self {
        self.returning = returning;
        self
    }

    pub fn validated(mut self) -> Self {
        self.validate = true;
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A patch applied to filtered rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateQuery {
    pub table: String,
    pub fields: Row,

    #[serde(default)]
    pub filters: Vec<WhereFilter>,

    #[serde(default)]
    pub validate: bool,

    #[serde(skip)]
    pub cancel: Option<CancellationToken>,
}

impl UpdateQuery {
    pub fn new(table: impl Into<String>, fields: Row) -> Self {
        Self {
            table: table.into(),
            fields,
            ..Default::default()
        }
    }

    pub fn filter(mut self, filter: WhereFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn validated(mut self) -> Self {
        self.validate = true;
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A filtered delete
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteQuery {
    pub table: String,

    #[serde(default)]
    pub filters: Vec<WhereFilter>,

    #[serde(default)]
    pub returning: Returning,

    #[serde(skip)]
    pub cancel: Option<CancellationToken>,
}

impl DeleteQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn filter(mut self, filter: WhereFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn returning(mut self, returning: Returning) -> Self {
        self.returning = returning;
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
