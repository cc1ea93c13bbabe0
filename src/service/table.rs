//! # Table Service
//!
//! A per-table CRUD repository over the query executor, keyed by an id
//! column, with helpers for alias side-tables.

use std::sync::Arc;

use tracing::debug;

use crate::query::{
    DeleteOutcome, DeleteQuery, Fields, InsertQuery, InsertResult, QueryError, QueryExecutor,
    QueryResult, Record, Row, SelectQuery, UpdateQuery, WhereFilter,
};

/// Column holding the alias text in alias tables
pub const ALIAS_NAME_COLUMN: &str = "alias_name";

/// CRUD operations bound to one table
#[derive(Clone)]
pub struct TableService {
    executor: Arc<QueryExecutor>,
    table: String,
    id_column: String,
    alias_parent_column: String,
    validate: bool,
}

impl TableService {
    /// Create a service for `table`
    ///
    /// Writes and listings are validated against the table's constraints by
    /// default.
    pub fn new(executor: Arc<QueryExecutor>, table: impl Into<String>) -> Self {
        Self {
            executor,
            table: table.into(),
            id_column: "id".to_string(),
            alias_parent_column: "parent_id".to_string(),
            validate: true,
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Foreign-key column in alias tables pointing at this table
    pub fn with_alias_parent_column(mut self, column: impl Into<String>) -> Self {
        self.alias_parent_column = column.into();
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// A select pre-bound to this table
    pub fn query(&self) -> SelectQuery {
        let query = SelectQuery::new(self.table.clone());
        if self.validate {
            query.validated()
        } else {
            query
        }
    }

    fn by_id(&self, id: &str) -> WhereFilter {
        WhereFilter::eq(self.id_column.clone(), id)
    }

    fn not_found(&self, id: &str) -> QueryError {
        QueryError::NotFound {
            table: self.table.clone(),
            id: id.to_string(),
        }
    }

    /// Insert one row
    pub async fn add(&self, row: Row) -> QueryResult<InsertResult> {
        self.add_many(vec![row]).await
    }

    /// Insert a batch of rows
    pub async fn add_many(&self, rows: Vec<Row>) -> QueryResult<InsertResult> {
        debug!(table = %self.table, rows = rows.len(), "adding records");
        let mut query = InsertQuery::many(self.table.clone(), rows);
        query.validate = self.validate;
        self.executor.insert(&query).await
    }

    /// Fetch one record by id, failing with `NotFound` if absent
    pub async fn get_by_id(&self, id: &str, fields: Fields) -> QueryResult<Record> {
        let query = SelectQuery::new(self.table.clone())
            .fields(fields)
            .filter(self.by_id(id))
            .limit(1);
        self.executor
            .select(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(id))
    }

    /// List records; the query's table is replaced with this service's table
    pub async fn get_all(&self, mut query: SelectQuery) -> QueryResult<Vec<Record>> {
        query.table = self.table.clone();
        self.executor.select(&query).await
    }

    /// Patch an existing record
    pub async fn update(&self, id: &str, fields: Row) -> QueryResult<Record> {
        self.get_by_id(id, Fields::columns([self.id_column.clone()]))
            .await?;

        let mut query = UpdateQuery::new(self.table.clone(), fields).filter(self.by_id(id));
        query.validate = self.validate;
        self.executor
            .update(&query)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    /// Delete an existing record
    pub async fn delete(&self, id: &str) -> QueryResult<DeleteOutcome> {
        self.get_by_id(id, Fields::columns([self.id_column.clone()]))
            .await?;

        let query = DeleteQuery::new(self.table.clone()).filter(self.by_id(id));
        self.executor.delete(&query).await
    }

    /// Aliases pointing at `parent_id`
    pub async fn get_aliases(&self, parent_id: &str, alias_table: &str) -> QueryResult<Vec<Record>> {
        let query = SelectQuery::new(alias_table)
            .filter(WhereFilter::eq(self.alias_parent_column.clone(), parent_id));
        self.executor.select(&query).await
    }

    /// Add an alias, failing with `Conflict` if it already exists
    pub async fn add_alias(
        &self,
        parent_id: &str,
        alias_name: &str,
        alias_table: &str,
    ) -> QueryResult<InsertResult> {
        if alias_name.trim().is_empty() {
            return Err(QueryError::InvalidArgument(
                "alias name must not be empty".to_string(),
            ));
        }

        let existing = SelectQuery::new(alias_table)
            .fields(Fields::columns(["id"]))
            .filter(WhereFilter::eq(self.alias_parent_column.clone(), parent_id))
            .filter(WhereFilter::eq(ALIAS_NAME_COLUMN, alias_name))
            .limit(1);
        if !self.executor.select(&existing).await?.is_empty() {
            return Err(QueryError::Conflict(format!(
                "alias '{}' already exists",
                alias_name
            )));
        }

        let row = Row::new()
            .with(self.alias_parent_column.clone(), parent_id)
            .with(ALIAS_NAME_COLUMN, alias_name);
        self.executor
            .insert(&InsertQuery::one(alias_table, row))
            .await
    }

    /// Remove an alias by its id
    pub async fn delete_alias(&self, alias_id: &str, alias_table: &str) -> QueryResult<DeleteOutcome> {
        if alias_id.trim().is_empty() {
            return Err(QueryError::InvalidArgument(
                "alias id must not be empty".to_string(),
            ));
        }

        let filter = WhereFilter::eq("id", alias_id);
        let existing = SelectQuery::new(alias_table)
            .fields(Fields::columns(["id"]))
            .filter(filter.clone())
            .limit(1);
        if self.executor.select(&existing).await?.is_empty() {
            return Err(QueryError::NotFound {
                table: alias_table.to_string(),
                id: alias_id.to_string(),
            });
        }

        self.executor
            .delete(&DeleteQuery::new(alias_table).filter(filter))
            .await
    }
}
