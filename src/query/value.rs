//! # Field Values
//!
//! Typed values accepted in rows and filters, and their wire encoding.
//! Timestamps and dates become ISO-8601 strings; lists and maps are encoded
//! recursively.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use super::errors::{QueryError, QueryResult};

/// A single field value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
    /// Pre-encoded JSON passed through untouched
    Json(Value),
}

impl FieldValue {
    /// Encode for the store
    pub fn to_wire(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::Number((*i).into()),
            FieldValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Timestamp(ts) => {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            FieldValue::Uuid(u) => Value::String(u.to_string()),
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_wire).collect()),
            FieldValue::Map(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_wire()))
                    .collect(),
            ),
            FieldValue::Json(v) => v.clone(),
        }
    }

    /// Map decoded JSON onto a field value
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => n.as_f64().map_or(FieldValue::Null, FieldValue::Float),
            },
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from_json).collect())
            }
            Value::Object(fields) => FieldValue::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// True if a float anywhere inside is NaN or infinite
    pub fn has_non_finite(&self) -> bool {
        match self {
            FieldValue::Float(f) => !f.is_finite(),
            FieldValue::List(items) => items.iter().any(FieldValue::has_non_finite),
            FieldValue::Map(fields) => fields.values().any(FieldValue::has_non_finite),
            _ => false,
        }
    }

    /// Reject values JSON cannot carry
    pub fn check_encodable(&self, column: &str) -> QueryResult<()> {
        if self.has_non_finite() {
            return Err(QueryError::InvalidArgument(format!(
                "column '{}' holds a non-finite number",
                column
            )));
        }
        Ok(())
    }

    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Json(v) => v.is_null(),
            _ => false,
        }
    }

    /// Textual form compared against CHECK enumerations
    pub fn literal(&self) -> String {
        match self.to_wire() {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            other => f.write_str(&other.literal()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(FieldValue::from_json)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v.into())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        FieldValue::Date(v)
    }
}

impl From<Uuid> for FieldValue {
    fn from(v: Uuid) -> Self {
        FieldValue::Uuid(v)
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Json(v)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// A row payload keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, FieldValue>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.0.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<FieldValue> {
        self.0.remove(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject the row if any field cannot be encoded
    pub fn check_encodable(&self) -> QueryResult<()> {
        self.iter()
            .try_for_each(|(column, value)| value.check_encodable(column))
    }

    /// Encode every field for the store
    pub fn to_wire(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_wire()))
            .collect()
    }

    /// Build a row from a JSON object
    pub fn from_json(value: Value) -> QueryResult<Self> {
        match value {
            Value::Object(fields) => Ok(fields
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from_json(v)))
                .collect()),
            other => Err(QueryError::InvalidArgument(format!(
                "row must be a JSON object, got {}",
                other
            ))),
        }
    }
}

impl FromIterator<(String, FieldValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Row(iter.into_iter().collect())
    }
}

impl IntoIterator for Row {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_timestamp_wire_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(FieldValue::from(ts).to_wire(), json!("2024-03-01T12:30:00Z"));

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(FieldValue::from(date).to_wire(), json!("2024-03-01"));
    }

    #[test]
    fn test_nested_values_are_encoded_recursively() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let value = FieldValue::List(vec![
            FieldValue::Int(1),
            FieldValue::Map(BTreeMap::from([("at".to_string(), FieldValue::from(ts))])),
        ]);
        assert_eq!(value.to_wire(), json!([1, {"at": "2024-01-02T03:04:05Z"}]));
    }

    #[test]
    fn test_literal_forms() {
        assert_eq!(FieldValue::from("done").literal(), "done");
        assert_eq!(FieldValue::from(3).literal(), "3");
        assert_eq!(FieldValue::from(true).literal(), "true");
        assert!(FieldValue::Json(Value::Null).is_null());
    }

    #[test]
    fn test_row_round_trips_through_json() {
        let row = Row::new().with("name", "Ada").with("age", 36).with("email", None::<String>);
        let wire = Value::Object(row.to_wire());
        assert_eq!(wire, json!({"name": "Ada", "age": 36, "email": null}));
        assert_eq!(Row::from_json(wire).unwrap(), row);
        assert!(Row::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn test_non_finite_floats_are_not_encodable() {
        assert!(FieldValue::Float(1.5).check_encodable("score").is_ok());
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = FieldValue::Float(bad).check_encodable("score").unwrap_err();
            assert!(matches!(err, QueryError::InvalidArgument(ref m) if m.contains("score")));
        }

        let nested = FieldValue::List(vec![FieldValue::Int(1), FieldValue::Float(f64::NAN)]);
        assert!(nested.has_non_finite());
        assert!(!nested.is_null());

        let row = Row::new().with("name", "x").with("weights", vec![0.5, f64::INFINITY]);
        assert!(matches!(row.check_encodable(), Err(QueryError::InvalidArgument(_))));
    }
}
