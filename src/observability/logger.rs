//! Structured logging setup
//!
//! Library code only emits `tracing` records. Binaries install a subscriber
//! once through [`init_logging`]; output goes to stderr so stdout stays
//! reserved for command results.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use super::{ObservabilityError, ObservabilityResult};

fn default_level() -> String {
    "info".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `tablegate=debug`
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit one JSON object per line instead of plain text
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Parse the configured level into a filter
    pub fn filter(&self) -> ObservabilityResult<EnvFilter> {
        EnvFilter::try_new(&self.level).map_err(|e| {
            ObservabilityError::new(format!("invalid log filter '{}': {}", self.level, e))
        })
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LogConfig) -> ObservabilityResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.filter()?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| ObservabilityError::new(format!("failed to install subscriber: {}", e)))
}
