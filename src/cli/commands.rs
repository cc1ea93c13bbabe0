//! CLI command implementations
//!
//! Every command follows the same boot sequence: load configuration,
//! install logging, build the in-memory store from the fixture, then run
//! the command on a single-threaded runtime.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::config::Config;
use crate::observability::{init_logging, Event};
use crate::query::{
    DeleteQuery, InsertQuery, QueryError, QueryExecutor, QueryResult, SelectQuery, UpdateQuery,
};
use crate::store::MemoryStore;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// One operation accepted by `tablegate query`
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Select(SelectQuery),
    Insert(InsertQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
    Rpc {
        function: String,
        #[serde(default)]
        params: Value,
    },
}

/// Parse arguments and run
pub fn run() -> CliResult<()> {
    run_cli(Cli::parse_args())
}

/// Boot and run the given command line
pub fn run_cli(cli: Cli) -> CliResult<()> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config.log)?;
    let store = load_store(cli.fixture.as_deref(), &config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::boot_failed(format!("failed to start runtime: {}", e)))?;

    runtime.block_on(run_command(cli.command, &config, store))
}

/// Run the appropriate command against a booted store
pub async fn run_command(cmd: Command, config: &Config, store: MemoryStore) -> CliResult<()> {
    let executor = QueryExecutor::from_config(Arc::new(store), config);
    match cmd {
        Command::Constraints { table } => constraints(&executor, &table).await,
        Command::Query => query(&executor, read_request()?).await,
        Command::CheckConfig => write_response(serde_json::to_value(config)?),
    }
}

/// Load configuration from file, or defaults plus environment overrides
pub fn load_config(path: Option<&Path>) -> CliResult<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => {
            let mut config = Config::default();
            config.apply_env(std::env::vars())?;
            config.validate()?;
            Ok(config)
        }
    }
}

/// Build the in-memory store from a fixture file
///
/// Without a fixture the store has no tables.
pub fn load_store(path: Option<&Path>, config: &Config) -> CliResult<MemoryStore> {
    let store = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|e| {
                CliError::fixture_error(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let fixture: Value = serde_json::from_str(&content)
                .map_err(|e| CliError::fixture_error(format!("Invalid fixture JSON: {}", e)))?;
            MemoryStore::from_fixture(&fixture)?
        }
        None => MemoryStore::new(),
    };
    store.set_table_info_function(config.constraints_function.clone());
    Ok(store)
}

/// Print the constraint schema of `table`
pub async fn constraints(executor: &QueryExecutor, table: &str) -> CliResult<()> {
    let result = match executor.get_table_constraints(table).await {
        Ok(constraints) => serde_json::to_value(&*constraints).map_err(QueryError::from),
        Err(e) => Err(e),
    };
    respond(result)
}

/// Execute one JSON operation and write the response
pub async fn query(executor: &QueryExecutor, request: Value) -> CliResult<()> {
    respond(execute_operation(executor, request).await)
}

/// Decode and execute one operation
pub async fn execute_operation(executor: &QueryExecutor, request: Value) -> QueryResult<Value> {
    let operation: Operation = serde_json::from_value(request)?;
    let data = match operation {
        Operation::Select(query) => serde_json::to_value(executor.select(&query).await?)?,
        Operation::Insert(query) => serde_json::to_value(executor.insert(&query).await?)?,
        Operation::Update(query) => serde_json::to_value(executor.update(&query).await?)?,
        Operation::Delete(query) => serde_json::to_value(executor.delete(&query).await?)?,
        Operation::Rpc { function, params } => executor.rpc(&function, params).await?,
    };
    Ok(data)
}

fn respond(result: QueryResult<Value>) -> CliResult<()> {
    match result {
        Ok(data) => write_response(data),
        Err(e) => {
            warn!(event = Event::QueryRejected.as_str(), code = e.code(), error = %e);
            write_error(e.code(), &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::RetryPolicy;
    use serde_json::json;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn fixture() -> Value {
        json!({
            "tables": {
                "todos": {
                    "columns": [
                        {"name": "id", "nullable": false},
                        {"name": "title", "nullable": false},
                        {"name": "status", "check": "CHECK ((status = ANY (ARRAY['open'::text, 'done'::text])))"}
                    ],
                    "rows": [
                        {"id": "t1", "title": "write docs", "status": "open"},
                        {"id": "t2", "title": "ship", "status": "done"}
                    ]
                }
            }
        })
    }

    fn executor() -> QueryExecutor {
        let store = MemoryStore::from_fixture(&fixture()).unwrap();
        QueryExecutor::new(Arc::new(store))
            .with_retry_policy(RetryPolicy::new(1, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_select_operation() {
        let data = execute_operation(
            &executor(),
            json!({"op": "select", "table": "todos", "filters": [["status", "eq", "done"]]}),
        )
        .await
        .unwrap();
        assert_eq!(data.as_array().unwrap().len(), 1);
        assert_eq!(data[0]["id"], "t2");
    }

    #[tokio::test]
    async fn test_validated_insert_operation() {
        let err = execute_operation(
            &executor(),
            json!({"op": "insert", "table": "todos", "rows": {"title": "x", "status": "later"}, "validate": true}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, QueryError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_unfiltered_delete_operation_rejected() {
        let err = execute_operation(&executor(), json!({"op": "delete", "table": "todos"}))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::UnsafeDelete { .. }));
    }

    #[tokio::test]
    async fn test_unknown_op_is_invalid_argument() {
        let err = execute_operation(&executor(), json!({"op": "truncate", "table": "todos"}))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
    }

    #[test]
    fn test_load_store_from_fixture_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", fixture()).unwrap();

        let store = load_store(Some(file.path()), &Config::default()).unwrap();
        assert_eq!(store.rows("todos").len(), 2);
    }

    #[test]
    fn test_load_store_bad_fixture() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[not a fixture").unwrap();

        let err = load_store(Some(file.path()), &Config::default()).unwrap_err();
        assert_eq!(err.code_str(), "TABLEGATE_CLI_FIXTURE_ERROR");
    }
}
