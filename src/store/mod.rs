//! Backing store capability
//!
//! The executor talks to a hosted table API only through [`Store`]: a
//! chained request builder per table plus stored-function calls. The
//! in-memory implementation backs tests and the CLI.

mod errors;
mod memory;
mod request;

pub use errors::{StoreError, StoreErrorKind, StoreResult};
pub use memory::{ColumnDef, MemoryStore, TableDef, TABLE_INFO_FUNCTION};
pub use request::{FilterTarget, Returning, SortDirection, Store, StoreResponse, TableRequest};
