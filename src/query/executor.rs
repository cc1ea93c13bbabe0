//! # Query Executor
//!
//! Select, insert, update and delete against a named table, with input
//! validation against live constraints, operator-driven filtering, bounded
//! retry on transient failures and a single error taxonomy.

use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::errors::{QueryError, QueryResult};
use super::filter::{parse_filters, FilterPredicate, Operator};
use super::request::{DeleteQuery, InsertQuery, SelectQuery, UpdateQuery};
use super::result::{records_from, DeleteOutcome, InsertResult, Record};
use super::retry::RetryPolicy;
use crate::config::Config;
use crate::observability::{Event, MetricsRegistry, ObservationScope};
use crate::schema::{CacheLookup, ConstraintCache, ConstraintValidator, TableConstraints};
use crate::store::{SortDirection, Store, TableRequest, TABLE_INFO_FUNCTION};

/// Default cap on rows per insert
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

fn table_name(table: &str) -> QueryResult<&str> {
    let table = table.trim();
    if table.is_empty() {
        return Err(QueryError::InvalidArgument(
            "table name must not be empty".to_string(),
        ));
    }
    Ok(table)
}

fn column_name(column: &str) -> QueryResult<&str> {
    let column = column.trim();
    if column.is_empty() {
        return Err(QueryError::InvalidColumn(
            "column name must not be empty".to_string(),
        ));
    }
    Ok(column)
}

fn apply_all(request: &mut dyn TableRequest, predicates: &[FilterPredicate]) {
    for predicate in predicates {
        predicate.apply(request);
    }
}

/// Validated, cached and retried access to a [`Store`]
///
/// Shareable across tasks through `Arc`.
pub struct QueryExecutor {
    store: Arc<dyn Store>,
    cache: Arc<ConstraintCache>,
    retry: RetryPolicy,
    metrics: Arc<MetricsRegistry>,
    max_batch_size: usize,
    constraints_function: String,
}

impl QueryExecutor {
    /// Create an executor with default settings
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            cache: Arc::new(ConstraintCache::default()),
            retry: RetryPolicy::default(),
            metrics: Arc::new(MetricsRegistry::new()),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            constraints_function: TABLE_INFO_FUNCTION.to_string(),
        }
    }

    /// Create an executor from loaded configuration
    pub fn from_config(store: Arc<dyn Store>, config: &Config) -> Self {
        Self::new(store)
            .with_cache(Arc::new(ConstraintCache::new(config.cache_ttl())))
            .with_retry_policy(config.retry_policy())
            .with_max_batch_size(config.max_batch_size)
            .with_constraints_function(config.constraints_function.clone())
    }

    pub fn with_cache(mut self, cache: Arc<ConstraintCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }

    /// Name of the introspection function used to fetch constraints
    pub fn with_constraints_function(mut self, function: impl Into<String>) -> Self {
        self.constraints_function = function.into();
        self
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn cache(&self) -> &ConstraintCache {
        &self.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Wrap an operation in a lifecycle scope and count its outcome
    async fn observe<T, Fut>(&self, name: &str, subject: &str, work: Fut) -> QueryResult<T>
    where
        Fut: Future<Output = QueryResult<T>>,
    {
        let scope = ObservationScope::new(name, subject);
        match work.await {
            Ok(value) => {
                self.metrics.increment_queries_executed();
                scope.complete();
                Ok(value)
            }
            Err(err) => {
                if err.is_validation() {
                    self.metrics.increment_queries_rejected();
                    debug!(
                        event = Event::QueryRejected.as_str(),
                        operation = name,
                        subject,
                        code = err.code(),
                    );
                } else {
                    self.metrics.increment_queries_failed();
                }
                scope.fail(err.code(), &err.to_string());
                Err(err)
            }
        }
    }

    // ==================
    // Constraints
    // ==================

    /// Constraints for `table`, from cache or fetched through the retry envelope
    pub async fn get_table_constraints(&self, table: &str) -> QueryResult<Arc<TableConstraints>> {
        self.observe("GET_TABLE_CONSTRAINTS", table.trim(), async {
            let table = table_name(table)?;
            self.constraints_for(table, None).await
        })
        .await
    }

    /// Drop cached constraints so the next validated call refetches them
    pub fn invalidate_constraints(&self, table: &str) -> bool {
        let removed = self.cache.invalidate(table.trim());
        if removed {
            info!(event = Event::ConstraintsInvalidated.as_str(), table = table.trim());
        }
        removed
    }

    async fn constraints_for(
        &self,
        table: &str,
        cancel: Option<&CancellationToken>,
    ) -> QueryResult<Arc<TableConstraints>> {
        match self.cache.lookup(table) {
            CacheLookup::Hit(constraints) => {
                self.metrics.increment_cache_hits();
                debug!(event = Event::ConstraintsCacheHit.as_str(), table);
                return Ok(constraints);
            }
            CacheLookup::Expired => {
                self.metrics.increment_cache_evictions();
                debug!(event = Event::ConstraintsCacheExpired.as_str(), table);
            }
            CacheLookup::Miss => {}
        }
        self.metrics.increment_cache_misses();

        let params = json!({ "p_table_name": table });
        let constraints = self
            .retry
            .run("get_table_constraints", cancel, &self.metrics, || {
                let store = Arc::clone(&self.store);
                let function = self.constraints_function.clone();
                let params = params.clone();
                async move {
                    let rows = store.rpc(&function, params).await?;
                    TableConstraints::from_rows(&rows)
                }
            })
            .await?;

        self.metrics.increment_constraint_fetches();
        info!(
            event = Event::ConstraintsFetched.as_str(),
            table,
            not_null = constraints.not_null.len(),
            nullable = constraints.nullable.len(),
            checks = constraints.check.len(),
        );
        Ok(self.cache.insert(table, constraints))
    }

    // ==================
    // Select
    // ==================

    /// Read rows matching every filter, embedding joined rows if requested
    pub async fn select(&self, query: &SelectQuery) -> QueryResult<Vec<Record>> {
        self.observe("SELECT", query.table.trim(), self.run_select(query))
            .await
    }

    async fn run_select(&self, query: &SelectQuery) -> QueryResult<Vec<Record>> {
        let table = table_name(&query.table)?;
        query.fields.validate()?;
        let predicates = parse_filters(&query.filters, &Operator::ALL, "select")?;
        let order = query
            .order_by
            .iter()
            .map(|o| -> QueryResult<(String, SortDirection)> {
                Ok((column_name(&o.column)?.to_string(), o.direction))
            })
            .collect::<QueryResult<Vec<_>>>()?;

        let join = match &query.join {
            Some(join) => {
                join.validate()?;
                Some(join)
            }
            None => None,
        };

        if query.validate {
            let cancel = query.cancel.as_ref();
            let mut base: Vec<&str> = query.fields.referenced().collect();
            let mut foreign: Vec<&str> = Vec::new();
            for predicate in &predicates {
                match join.and_then(|j| j.embedded_column(&predicate.column)) {
                    Some(column) => foreign.push(column),
                    None => base.push(predicate.column.as_str()),
                }
            }
            base.extend(order.iter().map(|(column, _)| column.as_str()));

            let constraints = self.constraints_for(table, cancel).await?;
            if let Some(join) = join {
                base.push(join.join_column.trim());
                foreign.push(join.foreign_key.trim());
            }
            ConstraintValidator::new(table, &constraints).check_columns(base)?;

            if let Some(join) = join {
                let foreign_table = join.foreign_table.trim();
                let foreign_constraints = self.constraints_for(foreign_table, cancel).await?;
                ConstraintValidator::new(foreign_table, &foreign_constraints)
                    .check_columns(foreign)?;
            }
        }

        let columns = query.fields.select_clause();
        self.retry
            .run("select", query.cancel.as_ref(), &self.metrics, || {
                let mut request = self.store.table(table);
                request.select(&columns);
                if let Some(join) = join {
                    request.join(
                        join.foreign_table.trim(),
                        join.join_column.trim(),
                        join.foreign_key.trim(),
                    );
                }
                apply_all(request.as_mut(), &predicates);
                for (column, direction) in &order {
                    request.order(column, *direction);
                }
                if let Some(limit) = query.limit {
                    request.limit(limit);
                }
                if let Some(offset) = query.offset {
                    request.offset(offset);
                }
                async move {
                    let response = request.execute().await?;
                    records_from(response.data)
                }
            })
            .await
    }

    // ==================
    // Insert
    // ==================

    /// Insert (or upsert) one or more rows
    pub async fn insert(&self, query: &InsertQuery) -> QueryResult<InsertResult> {
        self.observe("INSERT", query.table.trim(), self.run_insert(query))
            .await
    }

    async fn run_insert(&self, query: &InsertQuery) -> QueryResult<InsertResult> {
        let table = table_name(&query.table)?;
        if query.rows.is_empty() {
            return Err(QueryError::InvalidArgument(
                "insert requires at least one row".to_string(),
            ));
        }
        if query.rows.len() > self.max_batch_size {
            return Err(QueryError::BatchTooLarge {
                size: query.rows.len(),
                max: self.max_batch_size,
            });
        }
        for row in &query.rows {
            row.check_encodable()?;
        }
        let on_conflict = if query.upsert {
            column_name(&query.on_conflict)?
        } else {
            ""
        };

        if query.validate {
            let constraints = self.constraints_for(table, query.cancel.as_ref()).await?;
            let validator = ConstraintValidator::new(table, &constraints);
            for row in &query.rows {
                validator.check_row(row)?;
            }
        }

        let payload: Vec<Value> = query
            .rows
            .iter()
            .map(|row| Value::Object(row.to_wire()))
            .collect();

        self.retry
            .run("insert", query.cancel.as_ref(), &self.metrics, || {
                let mut request = self.store.table(table);
                if query.upsert {
                    request.upsert(
                        payload.clone(),
                        on_conflict,
                        query.ignore_duplicates,
                        query.returning,
                    );
                } else {
                    request.insert(payload.clone(), query.returning);
                }
                async move {
                    let response = request.execute().await?;
                    let count = response.count;
                    let records = records_from(response.data)?;
                    Ok(InsertResult {
                        count: count.unwrap_or(records.len()),
                        records,
                    })
                }
            })
            .await
    }

    // ==================
    // Update
    // ==================

    /// Patch rows matching every filter; returns the first updated row
    pub async fn update(&self, query: &UpdateQuery) -> QueryResult<Option<Record>> {
        self.observe("UPDATE", query.table.trim(), self.run_update(query))
            .await
    }

    async fn run_update(&self, query: &UpdateQuery) -> QueryResult<Option<Record>> {
        let table = table_name(&query.table)?;
        if query.fields.is_empty() {
            return Err(QueryError::InvalidArgument(
                "update requires at least one field".to_string(),
            ));
        }
        if query.filters.is_empty() {
            return Err(QueryError::InvalidArgument(
                "update requires at least one filter".to_string(),
            ));
        }
        if query.fields.columns().any(|c| c.trim().is_empty()) {
            return Err(QueryError::InvalidColumn(
                "update field names must not be empty".to_string(),
            ));
        }
        query.fields.check_encodable()?;
        let predicates = parse_filters(&query.filters, &Operator::ALL, "update")?;

        if query.validate {
            let constraints = self.constraints_for(table, query.cancel.as_ref()).await?;
            let validator = ConstraintValidator::new(table, &constraints);
            validator.check_columns(predicates.iter().map(|p| p.column.as_str()))?;
            validator.check_row(&query.fields)?;
        }

        let patch = query.fields.to_wire();
        self.retry
            .run("update", query.cancel.as_ref(), &self.metrics, || {
                let mut request = self.store.table(table);
                request.update(patch.clone());
                apply_all(request.as_mut(), &predicates);
                async move {
                    let response = request.execute().await?;
                    Ok(records_from(response.data)?.into_iter().next())
                }
            })
            .await
    }

    // ==================
    // Delete
    // ==================

    /// Delete rows matching every filter
    ///
    /// All filters are combined into one compound delete. Deleting without
    /// a filter is always refused.
    pub async fn delete(&self, query: &DeleteQuery) -> QueryResult<DeleteOutcome> {
        self.observe("DELETE", query.table.trim(), self.run_delete(query))
            .await
    }

    async fn run_delete(&self, query: &DeleteQuery) -> QueryResult<DeleteOutcome> {
        if query.filters.is_empty() {
            return Err(QueryError::UnsafeDelete {
                table: query.table.clone(),
            });
        }
        let table = table_name(&query.table)?;
        let predicates = parse_filters(&query.filters, &Operator::DELETE, "delete")?;

        self.retry
            .run("delete", query.cancel.as_ref(), &self.metrics, || {
                let mut request = self.store.table(table);
                request.delete(query.returning);
                apply_all(request.as_mut(), &predicates);
                async move {
                    let response = request.execute().await?;
                    let count = response.count;
                    let records = records_from(response.data)?;
                    Ok(DeleteOutcome {
                        success: true,
                        deleted_count: count.unwrap_or(records.len()),
                        records,
                    })
                }
            })
            .await
    }

    // ==================
    // RPC
    // ==================

    /// Call a stored function
    pub async fn rpc(&self, function: &str, params: Value) -> QueryResult<Value> {
        self.rpc_with_cancel(function, params, None).await
    }

    /// Call a stored function, aborting when `cancel` fires
    pub async fn rpc_with_cancel(
        &self,
        function: &str,
        params: Value,
        cancel: Option<&CancellationToken>,
    ) -> QueryResult<Value> {
        self.observe("RPC", function.trim(), async {
            let function = function.trim();
            if function.is_empty() {
                return Err(QueryError::InvalidArgument(
                    "function name must not be empty".to_string(),
                ));
            }
            self.retry
                .run("rpc", cancel, &self.metrics, || {
                    let store = Arc::clone(&self.store);
                    let function = function.to_string();
                    let params = params.clone();
                    async move { store.rpc(&function, params).await }
                })
                .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Fields, OrderBy, Row, WhereFilter};
    use crate::store::{ColumnDef, MemoryStore, StoreError, TableDef};
    use std::time::Duration;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_table(
                "todos",
                TableDef::new(vec![
                    ColumnDef::required("id"),
                    ColumnDef::required("title"),
                    ColumnDef::optional("status")
                        .with_check("CHECK ((status = ANY (ARRAY['pending'::text, 'done'::text])))"),
                    ColumnDef::optional("created_at"),
                ])
                .with_rows(vec![
                    json!({"id": "a", "title": "first", "status": "pending"}),
                    json!({"id": "b", "title": "second", "status": "done"}),
                ]),
            )
            .unwrap();
        store
    }

    fn executor(store: &MemoryStore) -> QueryExecutor {
        QueryExecutor::new(Arc::new(store.clone()))
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_select_with_filter_and_order() {
        let store = store();
        let exec = executor(&store);

        let rows = exec
            .select(
                &SelectQuery::new("todos")
                    .fields(Fields::columns(["id", "status"]))
                    .order_by(OrderBy::desc("id")),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], "b");
        assert!(rows[0].get("title").is_none());

        let rows = exec
            .select(&SelectQuery::new("todos").filter(WhereFilter::eq("status", "pending")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_select_limit_zero_is_empty() {
        let store = store();
        let rows = executor(&store)
            .select(&SelectQuery::new("todos").limit(0))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_select_validation_rejects_unknown_column() {
        let store = store();
        let err = executor(&store)
            .select(&SelectQuery::new("todos").fields(Fields::columns(["nope"])).validated())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownColumn { .. }));
        assert_eq!(store.execute_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_table_name() {
        let store = store();
        let err = executor(&store).select(&SelectQuery::new("  ")).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_insert_counts_written_rows() {
        let store = store();
        let exec = executor(&store);
        let result = exec
            .insert(&InsertQuery::many(
                "todos",
                vec![Row::new().with("title", "x"), Row::new().with("title", "y")],
            ))
            .await
            .unwrap();
        assert_eq!(result.count, 2);
        assert_eq!(result.records.len(), 2);
        assert_eq!(exec.metrics().snapshot().queries_executed, 1);
    }

    #[tokio::test]
    async fn test_insert_rejected_by_store_is_not_retried() {
        let store = store();
        let err = executor(&store)
            .insert(&InsertQuery::one("todos", Row::new().with("id", "a").with("title", "dup")))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::OperationFailed { attempts: 1, .. }));
        assert_eq!(store.execute_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_returns_first_record() {
        let store = store();
        let exec = executor(&store);
        let record = exec
            .update(
                &UpdateQuery::new("todos", Row::new().with("status", "done"))
                    .filter(WhereFilter::eq("id", "a"))
                    .validated(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record["status"], "done");

        let none = exec
            .update(
                &UpdateQuery::new("todos", Row::new().with("status", "done"))
                    .filter(WhereFilter::eq("id", "zzz")),
            )
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_update_requires_fields_and_filters() {
        let store = store();
        let exec = executor(&store);
        let err = exec
            .update(&UpdateQuery::new("todos", Row::new()).filter(WhereFilter::eq("id", "a")))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));

        let err = exec
            .update(&UpdateQuery::new("todos", Row::new().with("status", "done")))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
        assert_eq!(store.execute_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_combines_filters() {
        let store = store();
        let outcome = executor(&store)
            .delete(
                &DeleteQuery::new("todos")
                    .filter(WhereFilter::like("title", "%s%"))
                    .filter(WhereFilter::eq("status", "pending")),
            )
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.deleted_count, 1);
        assert_eq!(outcome.records[0]["id"], "a");
        assert_eq!(store.rows("todos").len(), 1);
    }

    #[tokio::test]
    async fn test_constraints_are_cached() {
        let store = store();
        let exec = executor(&store);

        let first = exec.get_table_constraints("todos").await.unwrap();
        let second = exec.get_table_constraints("todos").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.rpc_calls(TABLE_INFO_FUNCTION), 1);
        assert_eq!(exec.metrics().snapshot().cache_hits, 1);

        assert!(exec.invalidate_constraints("todos"));
        exec.get_table_constraints("todos").await.unwrap();
        assert_eq!(store.rpc_calls(TABLE_INFO_FUNCTION), 2);
    }

    #[tokio::test]
    async fn test_rpc_passthrough_and_retry() {
        let store = store();
        store.register_rpc("echo", |params| Ok(params));
        store.fail_next(StoreError::timeout("slow"));

        let value = executor(&store).rpc("echo", json!({"x": 1})).await.unwrap();
        assert_eq!(value, json!({"x": 1}));
        assert_eq!(store.rpc_calls("echo"), 2);

        let err = executor(&store).rpc(" ", json!({})).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_cancelled_query() {
        let store = store();
        let token = CancellationToken::new();
        token.cancel();
        let err = executor(&store)
            .select(&SelectQuery::new("todos").cancel_on(token))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Cancelled { .. }));
        assert_eq!(store.execute_calls(), 0);
    }
}
