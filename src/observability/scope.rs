//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` or `{name}_FAILED` with the elapsed time
//! - Logs `{name}_ABANDONED` if dropped unfinished (e.g. the future was dropped)

use std::cell::Cell;
use std::time::Instant;

use tracing::{debug, info, warn};

/// A scope that logs the lifecycle of one operation
///
/// # Usage
///
/// ```ignore
/// let scope = ObservationScope::new("SELECT", "todos");
/// // ... do work ...
/// scope.complete(); // logs SELECT_COMPLETE
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    subject: &'a str,
    started: Instant,
    finished: Cell<bool>,
}

impl<'a> ObservationScope<'a> {
    /// Create a new observation scope
    ///
    /// Logs `{name}_BEGIN` immediately.
    pub fn new(name: &'a str, subject: &'a str) -> Self {
        debug!(event = %format!("{}_BEGIN", name), subject);
        Self {
            name,
            subject,
            started: Instant::now(),
            finished: Cell::new(false),
        }
    }

    /// Milliseconds since the scope began
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.finished.set(true);
        info!(
            event = %format!("{}_COMPLETE", self.name),
            subject = self.subject,
            duration_ms = self.elapsed_ms(),
        );
    }

    /// Mark the scope as failed with a stable code and a reason
    pub fn fail(self, code: &str, reason: &str) {
        self.finished.set(true);
        warn!(
            event = %format!("{}_FAILED", self.name),
            subject = self.subject,
            duration_ms = self.elapsed_ms(),
            code,
            reason,
        );
    }

    /// Check if the scope has been finished
    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.finished.get() {
            warn!(
                event = %format!("{}_ABANDONED", self.name),
                subject = self.subject,
                duration_ms = self.elapsed_ms(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_complete() {
        let scope = ObservationScope::new("SELECT", "todos");
        assert!(!scope.is_finished());
        scope.complete();
    }

    #[test]
    fn test_scope_fail() {
        let scope = ObservationScope::new("DELETE", "todos");
        scope.fail("TABLEGATE_UNSAFE_DELETE", "no filters");
    }

    #[test]
    fn test_scope_drop_without_finish() {
        // Logs a warning but does not panic
        let scope = ObservationScope::new("INSERT", "todos");
        drop(scope);
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let scope = ObservationScope::new("SELECT", "todos");
        let first = scope.elapsed_ms();
        assert!(scope.elapsed_ms() >= first);
        scope.complete();
    }
}
