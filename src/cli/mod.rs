//! CLI module for tablegate
//!
//! Provides command-line interface for:
//! - constraints: Print a table's constraint schema
//! - query: One-shot operation execution
//! - check-config: Validate configuration

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    constraints, execute_operation, load_config, load_store, query, run, run_cli, run_command,
    Operation,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
