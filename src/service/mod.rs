//! Table-level services built on the query executor.

mod table;

pub use table::{TableService, ALIAS_NAME_COLUMN};
