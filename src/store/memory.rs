//! # In-Memory Store
//!
//! A process-local table backend. Evaluates every filter operator, ordering,
//! pagination, projection, upserts and the table-introspection function, and
//! can inject failures or latency to exercise the retry envelope.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::errors::{StoreError, StoreResult};
use super::request::{FilterTarget, Returning, SortDirection, Store, StoreResponse, TableRequest};
use crate::query::Operator;

/// Introspection function served when no handler overrides it
pub const TABLE_INFO_FUNCTION: &str = "get_table_info";

/// Column declared on an in-memory table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,

    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// CHECK expression as the database would report it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDef {
    /// A NOT NULL column
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
            check: None,
        }
    }

    /// A nullable column
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: true,
            check: None,
        }
    }

    pub fn with_check(mut self, expression: impl Into<String>) -> Self {
        self.check = Some(expression.into());
        self
    }
}

/// Definition of an in-memory table, optionally with seed rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    pub columns: Vec<ColumnDef>,

    #[serde(default)]
    pub rows: Vec<Value>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl TableDef {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            primary_key: default_primary_key(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn with_rows(mut self, rows: Vec<Value>) -> Self {
        self.rows = rows;
        self
    }

    fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug)]
struct TableData {
    name: String,
    def: TableDef,
    rows: Vec<Map<String, Value>>,
}

impl TableData {
    /// Reject rows that reference undeclared columns or null out required ones
    fn check_fields(&self, row: &Map<String, Value>) -> StoreResult<()> {
        for (key, value) in row {
            let column = self.def.column(key).ok_or_else(|| {
                StoreError::rejected(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    key, self.name
                ))
            })?;
            if value.is_null() && !column.nullable {
                return Err(not_null_violation(&self.name, key));
            }
        }
        Ok(())
    }

    /// Fill server-assigned defaults and enforce NOT NULL on a new row
    fn prepare_new(&self, mut row: Map<String, Value>) -> StoreResult<Map<String, Value>> {
        self.check_fields(&row)?;

        let pk = &self.def.primary_key;
        if row.get(pk).map_or(true, Value::is_null) {
            row.insert(pk.clone(), Value::String(Uuid::new_v4().to_string()));
        }
        if self.def.column("created_at").is_some() && !row.contains_key("created_at") {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
            row.insert("created_at".to_string(), Value::String(now));
        }

        for column in self.def.columns.iter().filter(|c| !c.nullable) {
            if row.get(&column.name).map_or(true, Value::is_null) {
                return Err(not_null_violation(&self.name, &column.name));
            }
        }
        Ok(row)
    }

    fn position_of(&self, column: &str, key: &Value) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.get(column).map_or(false, |v| values_equal(v, key)))
    }
}

fn not_null_violation(table: &str, column: &str) -> StoreError {
    StoreError::rejected(format!(
        "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
        column, table
    ))
}

fn missing_relation(table: &str) -> StoreError {
    StoreError::rejected(format!("relation \"{}\" does not exist", table))
}

fn into_object(value: Value) -> StoreResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::rejected(format!(
            "row must be a JSON object, got {}",
            other
        ))),
    }
}

type RpcHandler = Arc<dyn Fn(Value) -> StoreResult<Value> + Send + Sync>;

struct Inner {
    tables: RwLock<HashMap<String, TableData>>,
    rpc_handlers: RwLock<HashMap<String, RpcHandler>>,
    table_info_function: RwLock<String>,
    faults: Mutex<VecDeque<StoreError>>,
    latency: Mutex<Option<Duration>>,
    execute_calls: AtomicUsize,
    rpc_calls: Mutex<HashMap<String, usize>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    /// Apply injected latency and failures ahead of a call
    async fn enter(&self) -> StoreResult<()> {
        let fault = lock(&self.faults).pop_front();
        let latency = *lock(&self.latency);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-memory implementation of [`Store`]
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(HashMap::new()),
                rpc_handlers: RwLock::new(HashMap::new()),
                table_info_function: RwLock::new(TABLE_INFO_FUNCTION.to_string()),
                faults: Mutex::new(VecDeque::new()),
                latency: Mutex::new(None),
                execute_calls: AtomicUsize::new(0),
                rpc_calls: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Build a store from a fixture of the form `{"tables": {"name": TableDef}}`
    pub fn from_fixture(fixture: &Value) -> StoreResult<Self> {
        let tables = fixture.get("tables").cloned().unwrap_or_else(|| json!({}));
        let defs: BTreeMap<String, TableDef> = serde_json::from_value(tables)
            .map_err(|e| StoreError::malformed(format!("invalid fixture: {}", e)))?;

        let store = Self::new();
        for (name, def) in defs {
            store.create_table(&name, def)?;
        }
        Ok(store)
    }

    /// Create (or replace) a table and load its seed rows
    pub fn create_table(&self, name: &str, def: TableDef) -> StoreResult<()> {
        let mut def = def;
        let seed = std::mem::take(&mut def.rows);
        let mut table = TableData {
            name: name.to_string(),
            def,
            rows: Vec::new(),
        };
        for row in seed {
            let row = table.prepare_new(into_object(row)?)?;
            table.rows.push(row);
        }
        write(&self.inner.tables).insert(name.to_string(), table);
        Ok(())
    }

    /// Serve the introspection function under a different name
    pub fn set_table_info_function(&self, name: impl Into<String>) {
        *write(&self.inner.table_info_function) = name.into();
    }

    /// Register a stored function
    pub fn register_rpc<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> StoreResult<Value> + Send + Sync + 'static,
    {
        write(&self.inner.rpc_handlers).insert(name.into(), Arc::new(handler));
    }

    /// Fail the next call (table request or RPC) with `error`
    pub fn fail_next(&self, error: StoreError) {
        lock(&self.inner.faults).push_back(error);
    }

    /// Fail the next `times` calls with `error`
    pub fn fail_times(&self, times: usize, error: StoreError) {
        let mut faults = lock(&self.inner.faults);
        for _ in 0..times {
            faults.push_back(error.clone());
        }
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.inner.latency) = latency;
    }

    /// Number of executed table requests
    pub fn execute_calls(&self) -> usize {
        self.inner.execute_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of calls made to `function`
    pub fn rpc_calls(&self, function: &str) -> usize {
        lock(&self.inner.rpc_calls).get(function).copied().unwrap_or(0)
    }

    /// Every call that reached the store
    pub fn total_calls(&self) -> usize {
        self.execute_calls() + lock(&self.inner.rpc_calls).values().sum::<usize>()
    }

    /// Snapshot of a table's rows in insertion order
    pub fn rows(&self, table: &str) -> Vec<Value> {
        read(&self.inner.tables)
            .get(table)
            .map(|t| t.rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    fn table_info(&self, params: &Value) -> Value {
        let table = params.get("p_table_name").and_then(Value::as_str).unwrap_or("");
        let tables = read(&self.inner.tables);
        let rows: Vec<Value> = tables
            .get(table)
            .map(|t| {
                t.def
                    .columns
                    .iter()
                    .map(|c| {
                        json!({
                            "column_name": c.name,
                            "is_nullable": if c.nullable { "YES" } else { "NO" },
                            "check_constraint": c.check,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Value::Array(rows)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn table(&self, name: &str) -> Box<dyn TableRequest> {
        Box::new(MemoryRequest {
            inner: Arc::clone(&self.inner),
            table: name.to_string(),
            action: None,
            conditions: Vec::new(),
            join: None,
            order: Vec::new(),
            limit: None,
            offset: None,
        })
    }

    async fn rpc(&self, function: &str, params: Value) -> StoreResult<Value> {
        *lock(&self.inner.rpc_calls)
            .entry(function.to_string())
            .or_insert(0) += 1;
        self.inner.enter().await?;

        let handler = read(&self.inner.rpc_handlers).get(function).cloned();
        if let Some(handler) = handler {
            return handler(params);
        }
        let is_table_info = read(&self.inner.table_info_function).as_str() == function;
        if is_table_info {
            return Ok(self.table_info(&params));
        }
        Err(StoreError::rejected(format!(
            "function {} does not exist",
            function
        )))
    }
}

#[derive(Debug, Clone)]
enum Action {
    Select(String),
    Insert {
        rows: Vec<Value>,
        returning: Returning,
    },
    Upsert {
        rows: Vec<Value>,
        on_conflict: String,
        ignore_duplicates: bool,
        returning: Returning,
    },
    Update(Map<String, Value>),
    Delete(Returning),
}

#[derive(Debug, Clone)]
struct Condition {
    column: String,
    operator: Operator,
    value: Value,
}

#[derive(Debug, Clone)]
struct JoinSpec {
    foreign_table: String,
    join_column: String,
    foreign_key: String,
}

struct MemoryRequest {
    inner: Arc<Inner>,
    table: String,
    action: Option<Action>,
    conditions: Vec<Condition>,
    join: Option<JoinSpec>,
    order: Vec<(String, SortDirection)>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl MemoryRequest {
    fn push(&mut self, column: &str, operator: Operator, value: Value) {
        self.conditions.push(Condition {
            column: column.to_string(),
            operator,
            value,
        });
    }

    /// Column of the joined table named by a `<foreign_table>.<column>` filter
    fn embedded<'c>(&self, column: &'c str) -> Option<&'c str> {
        let join = self.join.as_ref()?;
        column
            .strip_prefix(join.foreign_table.as_str())?
            .strip_prefix('.')
    }

    fn matches(&self, row: &Map<String, Value>) -> bool {
        self.conditions
            .iter()
            .filter(|c| self.embedded(&c.column).is_none())
            .all(|c| evaluate(c.operator, row.get(&c.column), &c.value))
    }

    fn matches_embedded(&self, row: &Map<String, Value>) -> bool {
        self.conditions.iter().all(|c| match self.embedded(&c.column) {
            Some(column) => evaluate(c.operator, row.get(column), &c.value),
            None => true,
        })
    }

    /// Joined rows for `row`, or `None` when nothing matches
    fn embed(
        &self,
        row: &Map<String, Value>,
        join: &JoinSpec,
        foreign: &TableData,
    ) -> Option<Vec<Value>> {
        let key = row.get(&join.join_column).filter(|v| !v.is_null())?;
        let embedded: Vec<Value> = foreign
            .rows
            .iter()
            .filter(|f| f.get(&join.foreign_key).map_or(false, |v| values_equal(v, key)))
            .filter(|f| self.matches_embedded(f))
            .map(|f| Value::Object(f.clone()))
            .collect();
        (!embedded.is_empty()).then_some(embedded)
    }

    fn run_select(&self, columns: &str) -> StoreResult<StoreResponse> {
        let tables = read(&self.inner.tables);
        let table = tables
            .get(&self.table)
            .ok_or_else(|| missing_relation(&self.table))?;

        let foreign = match &self.join {
            Some(join) => {
                let foreign = tables
                    .get(&join.foreign_table)
                    .ok_or_else(|| missing_relation(&join.foreign_table))?;
                for (data, column) in [(table, &join.join_column), (foreign, &join.foreign_key)] {
                    if data.def.column(column).is_none() {
                        return Err(StoreError::rejected(format!(
                            "column {}.{} does not exist",
                            data.name, column
                        )));
                    }
                }
                Some((join, foreign))
            }
            None => None,
        };

        let mut matched: Vec<(&Map<String, Value>, Option<Vec<Value>>)> = Vec::new();
        for row in table.rows.iter().filter(|r| self.matches(r)) {
            match foreign {
                None => matched.push((row, None)),
                Some((join, foreign)) => {
                    if let Some(embedded) = self.embed(row, join, foreign) {
                        matched.push((row, Some(embedded)));
                    }
                }
            }
        }
        let total = matched.len();

        matched.sort_by(|a, b| compare_rows(a.0, b.0, &self.order));

        let data: Vec<Value> = matched
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|(row, embedded)| {
                let mut value = project(row, columns);
                if let (Some(embedded), Some(join), Value::Object(fields)) =
                    (embedded, &self.join, &mut value)
                {
                    fields.insert(join.foreign_table.clone(), Value::Array(embedded));
                }
                value
            })
            .collect();

        Ok(StoreResponse::new(Value::Array(data)).with_count(total))
    }

    fn run_insert(&self, rows: Vec<Value>, returning: Returning) -> StoreResult<StoreResponse> {
        let mut tables = write(&self.inner.tables);
        let table = tables
            .get_mut(&self.table)
            .ok_or_else(|| missing_relation(&self.table))?;

        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            prepared.push(table.prepare_new(into_object(row)?)?);
        }

        let pk = table.def.primary_key.clone();
        for (i, row) in prepared.iter().enumerate() {
            let key = row.get(&pk).cloned().unwrap_or(Value::Null);
            let in_batch = prepared[..i]
                .iter()
                .any(|other| other.get(&pk).map_or(false, |v| values_equal(v, &key)));
            if in_batch || table.position_of(&pk, &key).is_some() {
                return Err(StoreError::rejected(format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    table.name
                )));
            }
        }

        table.rows.extend(prepared.iter().cloned());
        Ok(written(prepared, returning))
    }

    fn run_upsert(
        &self,
        rows: Vec<Value>,
        on_conflict: &str,
        ignore_duplicates: bool,
        returning: Returning,
    ) -> StoreResult<StoreResponse> {
        enum Plan {
            Merge(usize, Map<String, Value>),
            Insert(Map<String, Value>),
        }

        let mut tables = write(&self.inner.tables);
        let table = tables
            .get_mut(&self.table)
            .ok_or_else(|| missing_relation(&self.table))?;
        if table.def.column(on_conflict).is_none() {
            return Err(StoreError::rejected(format!(
                "there is no unique constraint matching column \"{}\"",
                on_conflict
            )));
        }

        let mut plans = Vec::with_capacity(rows.len());
        let mut seen: Vec<Value> = Vec::new();
        for row in rows {
            let row = into_object(row)?;
            table.check_fields(&row)?;

            let key = row.get(on_conflict).cloned().unwrap_or(Value::Null);
            if !key.is_null() {
                if seen.iter().any(|k| values_equal(k, &key)) {
                    return Err(StoreError::rejected(
                        "ON CONFLICT DO UPDATE command cannot affect row a second time",
                    ));
                }
                seen.push(key.clone());
            }

            match table.position_of(on_conflict, &key) {
                Some(_) if ignore_duplicates => {}
                Some(idx) => plans.push(Plan::Merge(idx, row)),
                None => plans.push(Plan::Insert(table.prepare_new(row)?)),
            }
        }

        let mut affected = Vec::with_capacity(plans.len());
        for plan in plans {
            match plan {
                Plan::Merge(idx, patch) => {
                    let existing = &mut table.rows[idx];
                    for (k, v) in patch {
                        existing.insert(k, v);
                    }
                    affected.push(existing.clone());
                }
                Plan::Insert(row) => {
                    table.rows.push(row.clone());
                    affected.push(row);
                }
            }
        }
        Ok(written(affected, returning))
    }

    fn run_update(&self, patch: Map<String, Value>) -> StoreResult<StoreResponse> {
        let mut tables = write(&self.inner.tables);
        let table = tables
            .get_mut(&self.table)
            .ok_or_else(|| missing_relation(&self.table))?;
        table.check_fields(&patch)?;

        let mut updated = Vec::new();
        for row in table.rows.iter_mut() {
            if !self.matches(row) {
                continue;
            }
            for (k, v) in &patch {
                row.insert(k.clone(), v.clone());
            }
            updated.push(row.clone());
        }
        Ok(written(updated, Returning::Representation))
    }

    fn run_delete(&self, returning: Returning) -> StoreResult<StoreResponse> {
        let mut tables = write(&self.inner.tables);
        let table = tables
            .get_mut(&self.table)
            .ok_or_else(|| missing_relation(&self.table))?;

        let (removed, kept): (Vec<_>, Vec<_>) =
            table.rows.drain(..).partition(|row| self.matches(row));
        table.rows = kept;
        Ok(written(removed, returning))
    }
}

fn written(rows: Vec<Map<String, Value>>, returning: Returning) -> StoreResponse {
    let count = rows.len();
    let data = match returning {
        Returning::Representation => Value::Array(rows.into_iter().map(Value::Object).collect()),
        Returning::Minimal => Value::Null,
    };
    StoreResponse::new(data).with_count(count)
}

impl FilterTarget for MemoryRequest {
    fn eq(&mut self, column: &str, value: Value) {
        self.push(column, Operator::Eq, value);
    }

    fn neq(&mut self, column: &str, value: Value) {
        self.push(column, Operator::Neq, value);
    }

    fn gt(&mut self, column: &str, value: Value) {
        self.push(column, Operator::Gt, value);
    }

    fn gte(&mut self, column: &str, value: Value) {
        self.push(column, Operator::Gte, value);
    }

    fn lt(&mut self, column: &str, value: Value) {
        self.push(column, Operator::Lt, value);
    }

    fn lte(&mut self, column: &str, value: Value) {
        self.push(column, Operator::Lte, value);
    }

    fn like(&mut self, column: &str, value: Value) {
        self.push(column, Operator::Like, value);
    }

    fn ilike(&mut self, column: &str, value: Value) {
        self.push(column, Operator::Ilike, value);
    }

    fn is(&mut self, column: &str, value: Value) {
        self.push(column, Operator::Is, value);
    }

    fn in_(&mut self, column: &str, value: Value) {
        self.push(column, Operator::In, value);
    }

    fn contains(&mut self, column: &str, value: Value) {
        self.push(column, Operator::Contains, value);
    }

    fn contained_by(&mut self, column: &str, value: Value) {
        self.push(column, Operator::ContainedBy, value);
    }

    fn text_search(&mut self, column: &str, value: Value) {
        self.push(column, Operator::TextSearch, value);
    }
}

#[async_trait]
impl TableRequest for MemoryRequest {
    fn select(&mut self, columns: &str) {
        self.action = Some(Action::Select(columns.to_string()));
    }

    fn insert(&mut self, rows: Vec<Value>, returning: Returning) {
        self.action = Some(Action::Insert { rows, returning });
    }

    fn upsert(
        &mut self,
        rows: Vec<Value>,
        on_conflict: &str,
        ignore_duplicates: bool,
        returning: Returning,
    ) {
        self.action = Some(Action::Upsert {
            rows,
            on_conflict: on_conflict.to_string(),
            ignore_duplicates,
            returning,
        });
    }

    fn update(&mut self, patch: Map<String, Value>) {
        self.action = Some(Action::Update(patch));
    }

    fn delete(&mut self, returning: Returning) {
        self.action = Some(Action::Delete(returning));
    }

    fn join(&mut self, foreign_table: &str, join_column: &str, foreign_key: &str) {
        self.join = Some(JoinSpec {
            foreign_table: foreign_table.to_string(),
            join_column: join_column.to_string(),
            foreign_key: foreign_key.to_string(),
        });
    }

    fn order(&mut self, column: &str, direction: SortDirection) {
        self.order.push((column.to_string(), direction));
    }

    fn limit(&mut self, count: usize) {
        self.limit = Some(count);
    }

    fn offset(&mut self, count: usize) {
        self.offset = Some(count);
    }

    async fn execute(self: Box<Self>) -> StoreResult<StoreResponse> {
        self.inner.execute_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.inner.enter().await?;

        let mut request = *self;
        match request.action.take() {
            None => request.run_select("*"),
            Some(Action::Select(columns)) => request.run_select(&columns),
            Some(Action::Insert { rows, returning }) => request.run_insert(rows, returning),
            Some(Action::Upsert {
                rows,
                on_conflict,
                ignore_duplicates,
                returning,
            }) => request.run_upsert(rows, &on_conflict, ignore_duplicates, returning),
            Some(Action::Update(patch)) => request.run_update(patch),
            Some(Action::Delete(returning)) => request.run_delete(returning),
        }
    }
}

/// Keep only the requested comma-separated columns
fn project(row: &Map<String, Value>, columns: &str) -> Value {
    let columns = columns.trim();
    if columns.is_empty() || columns == "*" {
        return Value::Object(row.clone());
    }
    let wanted: HashSet<&str> = columns.split(',').map(str::trim).collect();
    let projected: Map<String, Value> = row
        .iter()
        .filter(|(k, _)| wanted.contains(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Value::Object(projected)
}

/// Row ordering with NULLs last ascending and first descending
fn compare_rows(
    a: &Map<String, Value>,
    b: &Map<String, Value>,
    order: &[(String, SortDirection)],
) -> Ordering {
    for (column, direction) in order {
        let va = a.get(column).filter(|v| !v.is_null());
        let vb = b.get(column).filter(|v| !v.is_null());
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ord = match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Order two scalar JSON values; timestamps compare as instants
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            compare_values(a, b) == Some(Ordering::Equal)
        }
        _ => a == b,
    }
}

/// Evaluate one predicate against a row's field
fn evaluate(operator: Operator, field: Option<&Value>, value: &Value) -> bool {
    let field = match field {
        Some(v) if !v.is_null() => v,
        _ => return operator == Operator::Is && is_null_literal(value),
    };

    match operator {
        Operator::Eq => values_equal(field, value),
        Operator::Neq => !values_equal(field, value),
        Operator::Gt => compare_values(field, value) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare_values(field, value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare_values(field, value) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare_values(field, value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Like => like_match(field, value, false),
        Operator::Ilike => like_match(field, value, true),
        Operator::Is => match value {
            Value::Bool(b) => field.as_bool() == Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => field.as_bool() == Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => field.as_bool() == Some(false),
            _ => false,
        },
        Operator::In => value
            .as_array()
            .map_or(false, |items| items.iter().any(|item| values_equal(field, item))),
        Operator::Contains => json_contains(field, value),
        Operator::ContainedBy => json_contains(value, field),
        Operator::TextSearch => text_search(field, value),
    }
}

fn is_null_literal(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.eq_ignore_ascii_case("null"),
        _ => false,
    }
}

/// jsonb-style containment: does `container` contain `contained`
fn json_contains(container: &Value, contained: &Value) -> bool {
    match (container, contained) {
        (Value::Array(items), Value::Array(wanted)) => wanted
            .iter()
            .all(|w| items.iter().any(|item| json_contains(item, w))),
        (Value::Array(items), scalar) if !scalar.is_object() => {
            items.iter().any(|item| values_equal(item, scalar))
        }
        (Value::Object(fields), Value::Object(wanted)) => wanted.iter().all(|(k, w)| {
            fields
                .get(k)
                .map_or(false, |field| json_contains(field, w))
        }),
        (a, b) => values_equal(a, b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LikeToken {
    Any,
    One,
    Literal(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::Any,
            '_' => LikeToken::One,
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            c => LikeToken::Literal(c),
        });
    }
    tokens
}

/// SQL LIKE with `%`, `_` and backslash escapes
fn like_match(field: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Some(text), Some(pattern)) = (field.as_str(), pattern.as_str()) else {
        return false;
    };
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.to_string())
    };

    let text: Vec<char> = text.chars().collect();
    let tokens = like_tokens(&pattern);

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::One) => {
                t += 1;
                p += 1;
            }
            Some(LikeToken::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            Some(LikeToken::Any) => {
                backtrack = Some((p, t));
                p += 1;
            }
            _ => match backtrack {
                Some((star, mark)) => {
                    p = star + 1;
                    t = mark + 1;
                    backtrack = Some((star, mark + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|tok| *tok == LikeToken::Any)
}

/// Every query term must appear as a word of the field
fn text_search(field: &Value, query: &Value) -> bool {
    let (Some(text), Some(query)) = (field.as_str(), query.as_str()) else {
        return false;
    };
    let words: HashSet<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    !terms.is_empty() && terms.iter().all(|term| words.contains(term))
}
