//! Normalized operation results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::{StoreError, StoreResult};

/// A single returned row
pub type Record = Map<String, Value>;

/// Result of an insert or upsert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertResult {
    pub records: Vec<Record>,

    /// Rows the store reports as written
    pub count: usize,
}

/// Result of a delete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// The store accepted the delete
    pub success: bool,
    pub deleted_count: usize,
    pub records: Vec<Record>,
}

/// Normalize response data into a list of records
///
/// A list maps to its rows, a single object to one row and null to none.
pub fn records_from(data: Value) -> StoreResult<Vec<Record>> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Object(row) => Ok(vec![row]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(StoreError::malformed(format!(
                    "expected a row object, got {}",
                    other
                ))),
            })
            .collect(),
        other => Err(StoreError::malformed(format!(
            "expected rows, got {}",
            other
        ))),
    }
}
