//! # Auth Provider
//!
//! The hosted auth backend as a capability. Implementations own user
//! records and issue sessions; the facade only validates and tracks the
//! current session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::AuthResult;

/// A registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Changes to the signed-in user; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Replaces the stored metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl UserUpdate {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Default::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none() && self.metadata.is_none()
    }
}

/// Tokens issued on sign-in or refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    /// Single-use
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthUser>;

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession>;

    /// Revoke the session owning `access_token`
    async fn sign_out(&self, access_token: &str) -> AuthResult<()>;

    async fn get_user(&self, access_token: &str) -> AuthResult<AuthUser>;

    /// Exchange a refresh token for a new session, revoking the old one
    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession>;

    /// Apply `update` to the user owning `access_token`
    async fn update_user(&self, access_token: &str, update: &UserUpdate) -> AuthResult<AuthUser>;
}
