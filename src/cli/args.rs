//! CLI argument definitions using clap
//!
//! Commands:
//! - tablegate constraints --table <name>
//! - tablegate query            (one JSON operation on stdin)
//! - tablegate check-config

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tablegate - validated, cached and retried table queries
#[derive(Parser, Debug)]
#[command(name = "tablegate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file; defaults plus TABLEGATE_* overrides if omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// JSON fixture describing the in-memory tables to serve
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the constraint schema of a table
    Constraints {
        #[arg(long)]
        table: String,
    },

    /// Execute a single JSON operation read from stdin and exit
    Query,

    /// Validate and print the effective configuration
    CheckConfig,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
