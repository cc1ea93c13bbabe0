//! # Query Builder Capability
//!
//! Mirrors the chained builder exposed by hosted table APIs: pick an action,
//! narrow it with filter calls, then `execute()`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::StoreResult;

/// Sort direction for `order`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// What a write hands back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Returning {
    /// Return the affected rows
    #[default]
    Representation,
    /// Return nothing but the count
    Minimal,
}

/// Raw response of an executed request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreResponse {
    /// A list of rows, a single row, or null
    pub data: Value,

    /// Row count reported by the backend, when it reports one
    pub count: Option<usize>,
}

impl StoreResponse {
    pub fn new(data: Value) -> Self {
        Self { data, count: None }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

/// Per-operator filter calls
pub trait FilterTarget {
    fn eq(&mut self, column: &str, value: Value);
    fn neq(&mut self, column: &str, value: Value);
    fn gt(&mut self, column: &str, value: Value);
    fn gte(&mut self, column: &str, value: Value);
    fn lt(&mut self, column: &str, value: Value);
    fn lte(&mut self, column: &str, value: Value);
    fn like(&mut self, column: &str, value: Value);
    fn ilike(&mut self, column: &str, value: Value);
    fn is(&mut self, column: &str, value: Value);
    fn in_(&mut self, column: &str, value: Value);
    fn contains(&mut self, column: &str, value: Value);
    fn contained_by(&mut self, column: &str, value: Value);
    fn text_search(&mut self, column: &str, value: Value);
}

/// A request against a single table
#[async_trait]
pub trait TableRequest: FilterTarget + Send {
    /// Read the given comma-separated columns (`*` for all)
    fn select(&mut self, columns: &str);

    /// Insert rows
    fn insert(&mut self, rows: Vec<Value>, returning: Returning);

    /// Insert rows, resolving conflicts on `on_conflict`
    fn upsert(
        &mut self,
        rows: Vec<Value>,
        on_conflict: &str,
        ignore_duplicates: bool,
        returning: Returning,
    );

    /// Patch every row matched by the filters
    fn update(&mut self, patch: Map<String, Value>);

    /// Remove every row matched by the filters
    fn delete(&mut self, returning: Returning);

    /// Embed rows of `foreign_table` whose `foreign_key` equals `join_column`
    fn join(&mut self, foreign_table: &str, join_column: &str, foreign_key: &str);

    fn order(&mut self, column: &str, direction: SortDirection);
    fn limit(&mut self, count: usize);
    fn offset(&mut self, count: usize);

    /// Send the request
    async fn execute(self: Box<Self>) -> StoreResult<StoreResponse>;
}

/// A hosted table backend
#[async_trait]
pub trait Store: Send + Sync {
    /// Start a request against `name`
    fn table(&self, name: &str) -> Box<dyn TableRequest>;

    /// Call a stored function
    async fn rpc(&self, function: &str, params: Value) -> StoreResult<Value>;
}
