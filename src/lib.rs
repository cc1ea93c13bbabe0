//! tablegate - validated, cached and retried access to hosted Postgres tables
//!
//! The core is [`query::QueryExecutor`]: every operation is checked
//! statically (table name, fields, operators), optionally validated against
//! the table's constraint schema (fetched once per TTL), and dispatched to
//! the [`store::Store`] inside a bounded retry envelope.

pub mod auth;
pub mod cli;
pub mod config;
pub mod file_storage;
pub mod observability;
pub mod query;
pub mod schema;
pub mod service;
pub mod store;

pub use config::{Config, ConfigError};
pub use query::{QueryError, QueryExecutor, QueryResult};
pub use service::TableService;
