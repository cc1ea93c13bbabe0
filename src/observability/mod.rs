//! Observability subsystem for tablegate
//!
//! This module provides:
//! - Structured logging over `tracing` (plain or JSON)
//! - Atomic operational counters
//! - Lifecycle scopes for individual operations
//!
//! # Usage
//!
//! ```ignore
//! use tablegate::observability::{Event, MetricsRegistry, ObservationScope};
//!
//! tracing::info!(event = Event::ConstraintsFetched.as_str(), table = "todos");
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_queries_executed();
//!
//! let scope = ObservationScope::new("SELECT", "todos");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{init_logging, LogConfig};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

use thiserror::Error;

/// Observability error
///
/// Observability failures are reported but never abort an operation.
#[derive(Debug, Clone, Error)]
#[error("[{}] {message}", Self::CODE)]
pub struct ObservabilityError {
    message: String,
}

impl ObservabilityError {
    pub const CODE: &'static str = "TABLEGATE_OBSERVABILITY_FAILED";

    /// Create a new observability error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Get the error code
    pub fn code(&self) -> &'static str {
        Self::CODE
    }

    /// Get the message
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for observability operations
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observability_error_display() {
        let err = ObservabilityError::new("test message");
        let display = format!("{}", err);
        assert!(display.contains("TABLEGATE_OBSERVABILITY_FAILED"));
        assert!(display.contains("test message"));
        assert_eq!(err.code(), ObservabilityError::CODE);
    }
}
