//! Constrained query executor
//!
//! Validated, cached and retried access to a hosted table API.
//!
//! # Flow
//!
//! 1. Table name, fields and filter operators are validated (no I/O)
//! 2. Optionally, constraints are fetched (or served from cache) and rows
//!    and column references are checked against them
//! 3. Values are encoded for the wire and predicates dispatched onto the
//!    request builder
//! 4. The request runs inside the retry envelope
//! 5. The response is normalized into records and counts

mod errors;
mod executor;
mod filter;
mod request;
mod result;
mod retry;
mod value;

pub use errors::{QueryError, QueryResult};
pub use executor::{QueryExecutor, DEFAULT_MAX_BATCH_SIZE};
pub use filter::{parse_filters, FilterPredicate, Operator, WhereFilter};
pub use request::{DeleteQuery, Fields, InsertQuery, Join, OrderBy, SelectQuery, UpdateQuery};
pub use result::{records_from, DeleteOutcome, InsertResult, Record};
pub use retry::{
    RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS,
};
pub use value::{FieldValue, Row};
