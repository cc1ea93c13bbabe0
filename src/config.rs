//! Configuration
//!
//! Loaded from a JSON file; every field has a default, so `{}` is a valid
//! configuration. `TABLEGATE_*` environment variables override file values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::observability::{Event, LogConfig};
use crate::query::{RetryPolicy, DEFAULT_MAX_BATCH_SIZE};
use crate::store::TABLE_INFO_FUNCTION;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TABLEGATE_";

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        "TABLEGATE_CONFIG_ERROR"
    }
}

/// Retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-attempt bound; 0 disables it
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_attempt_timeout_secs() -> u64 {
    30
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Lifetime of cached table constraints
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum rows per insert
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Introspection function returning column info rows
    #[serde(default = "default_constraints_function")]
    pub constraints_function: String,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Maximum upload size in bytes
    #[serde(default = "default_upload_limit")]
    pub storage_upload_limit_bytes: u64,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}
fn default_constraints_function() -> String {
    TABLE_INFO_FUNCTION.to_string()
}
fn default_upload_limit() -> u64 {
    50 * 1024 * 1024
} // 50MB

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            max_batch_size: default_max_batch_size(),
            constraints_function: default_constraints_function(),
            retry: RetryConfig::default(),
            storage_upload_limit_bytes: default_upload_limit(),
            log: LogConfig::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has invalid value '{}'", key, value)))
}

impl Config {
    /// Load configuration from file, apply environment overrides and validate
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&content)?;
        config.apply_env(std::env::vars())?;
        if let Err(e) = config.validate() {
            warn!(event = Event::ConfigInvalid.as_str(), path = %path.display(), error = %e);
            return Err(e);
        }

        info!(event = Event::ConfigLoaded.as_str(), path = %path.display());
        Ok(config)
    }

    /// Parse configuration JSON without overrides or validation
    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Apply `TABLEGATE_*` overrides from the given variables
    pub fn apply_env<I>(&mut self, vars: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "CACHE_TTL_SECS" => self.cache_ttl_secs = parse_var(&key, &value)?,
                "MAX_BATCH_SIZE" => self.max_batch_size = parse_var(&key, &value)?,
                "CONSTRAINTS_FUNCTION" => self.constraints_function = value.trim().to_string(),
                "RETRY_MAX_ATTEMPTS" => self.retry.max_attempts = parse_var(&key, &value)?,
                "RETRY_BASE_DELAY_MS" => self.retry.base_delay_ms = parse_var(&key, &value)?,
                "STORAGE_UPLOAD_LIMIT_BYTES" => {
                    self.storage_upload_limit_bytes = parse_var(&key, &value)?
                }
                "LOG_LEVEL" => self.log.level = value.trim().to_string(),
                "LOG_JSON" => self.log.json = parse_var(&key, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache_ttl_secs must be > 0".into()));
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid("max_batch_size must be > 0".into()));
        }
        if self.constraints_function.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "constraints_function must not be empty".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be >= 1".into()));
        }
        if self.storage_upload_limit_bytes == 0 {
            return Err(ConfigError::Invalid(
                "storage_upload_limit_bytes must be > 0".into(),
            ));
        }
        self.log
            .filter()
            .map_err(|e| ConfigError::Invalid(e.message().to_string()))?;
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let timeout = match self.retry.attempt_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
        .with_attempt_timeout(timeout)
    }
}
