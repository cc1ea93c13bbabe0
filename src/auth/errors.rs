//! # Auth Errors
//!
//! Error types for the authentication facade.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    // ==================
    // Argument Errors
    // ==================
    /// Email or password empty
    #[error("Email and password are required")]
    MissingCredentials,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Password does not meet requirements
    #[error("Password does not meet requirements: {0}")]
    WeakPassword(String),

    /// User update with no fields set
    #[error("Nothing to update")]
    NothingToUpdate,

    // ==================
    // Authentication Errors
    // ==================
    /// Unknown email or wrong password (generic - don't leak which)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Email already registered
    #[error("Email already registered")]
    EmailAlreadyExists,

    // ==================
    // Session Errors
    // ==================
    #[error("No active session")]
    NoActiveSession,

    /// Access token unknown, expired or signed out
    #[error("Session expired or invalid")]
    SessionInvalid,

    /// Refresh token is invalid or already used
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    // ==================
    // Internal Errors
    // ==================
    #[error("Internal error: password hashing failed")]
    HashingFailed,

    /// Provider failure not covered above
    #[error("Auth provider error: {0}")]
    Provider(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            AuthError::MissingCredentials => 400,
            AuthError::InvalidEmail(_) => 400,
            AuthError::WeakPassword(_) => 400,
            AuthError::NothingToUpdate => 400,

            // 401 Unauthorized
            AuthError::InvalidCredentials => 401,
            AuthError::NoActiveSession => 401,
            AuthError::SessionInvalid => 401,
            AuthError::InvalidRefreshToken => 401,

            // 409 Conflict
            AuthError::EmailAlreadyExists => 409,

            // 500 Internal Server Error
            AuthError::HashingFailed => 500,
            AuthError::Provider(_) => 500,
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self.status_code() {
            400 => "TABLEGATE_AUTH_INVALID_ARGUMENT",
            401 => "TABLEGATE_AUTH_AUTHENTICATION",
            409 => "TABLEGATE_AUTH_CONFLICT",
            _ => "TABLEGATE_AUTH_PROVIDER",
        }
    }

    /// Returns whether this error should be logged at warn level
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
