//! Observable events for tablegate
//!
//! Events are explicit and typed. Each is emitted as the `event` field of a
//! `tracing` record.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,
    /// Configuration rejected
    ConfigInvalid,

    // Query processing
    /// Predicate forwarded to the store
    FilterApplied,
    /// Query rejected before any store call
    QueryRejected,
    /// An attempt failed and will be retried
    QueryRetry,
    /// An attempt failed with a non-transient error
    QueryAttemptFailed,
    /// Retry series cancelled by the caller
    QueryCancelled,

    // Constraint cache
    /// Constraints served from cache
    ConstraintsCacheHit,
    /// Cached constraints outlived the TTL
    ConstraintsCacheExpired,
    /// Constraints fetched from the store
    ConstraintsFetched,
    /// Cached constraints dropped on request
    ConstraintsInvalidated,

    // Auth
    AuthSignUp,
    AuthSignIn,
    AuthSignOut,
    AuthSessionRefreshed,
    AuthUserUpdated,

    // File storage
    StorageUpload,
    StorageDownload,
    StorageRemove,
    StorageBucketCreated,
    StorageBucketDeleted,
}

impl Event {
    /// Get the event name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ConfigInvalid => "CONFIG_INVALID",
            Event::FilterApplied => "FILTER_APPLIED",
            Event::QueryRejected => "QUERY_REJECTED",
            Event::QueryRetry => "QUERY_RETRY",
            Event::QueryAttemptFailed => "QUERY_ATTEMPT_FAILED",
            Event::QueryCancelled => "QUERY_CANCELLED",
            Event::ConstraintsCacheHit => "CONSTRAINTS_CACHE_HIT",
            Event::ConstraintsCacheExpired => "CONSTRAINTS_CACHE_EXPIRED",
            Event::ConstraintsFetched => "CONSTRAINTS_FETCHED",
            Event::ConstraintsInvalidated => "CONSTRAINTS_INVALIDATED",
            Event::AuthSignUp => "AUTH_SIGN_UP",
            Event::AuthSignIn => "AUTH_SIGN_IN",
            Event::AuthSignOut => "AUTH_SIGN_OUT",
            Event::AuthSessionRefreshed => "AUTH_SESSION_REFRESHED",
            Event::AuthUserUpdated => "AUTH_USER_UPDATED",
            Event::StorageUpload => "STORAGE_UPLOAD",
            Event::StorageDownload => "STORAGE_DOWNLOAD",
            Event::StorageRemove => "STORAGE_REMOVE",
            Event::StorageBucketCreated => "STORAGE_BUCKET_CREATED",
            Event::StorageBucketDeleted => "STORAGE_BUCKET_DELETED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_screaming_snake() {
        for event in [Event::QueryRetry, Event::ConstraintsCacheHit, Event::AuthSignIn] {
            let name = event.as_str();
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(format!("{}", Event::QueryRetry), "QUERY_RETRY");
    }
}
