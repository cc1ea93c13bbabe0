//! In-memory auth provider
//!
//! Passwords are stored as Argon2id hashes and tokens as SHA-256 digests.
//! Used by tests and the CLI.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::crypto::{generate_token, hash_password, hash_token, tokens_match, verify_password};
use super::errors::{AuthError, AuthResult};
use super::provider::{AuthProvider, AuthSession, AuthUser, UserUpdate};

#[derive(Debug, Clone)]
struct StoredUser {
    user: AuthUser,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct StoredSession {
    user_id: Uuid,
    refresh_token_hash: String,
    expires_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    /// Keyed by lowercased email
    users: HashMap<String, StoredUser>,
    /// Keyed by access token hash
    sessions: HashMap<String, StoredSession>,
}

#[derive(Debug)]
pub struct MemoryAuthProvider {
    state: RwLock<State>,
    session_ttl: Duration,
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            session_ttl: Duration::hours(1),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Number of live (unrevoked) sessions
    pub fn session_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions
            .len()
    }

    fn issue(&self, state: &mut State, user: AuthUser) -> AuthSession {
        let access_token = generate_token();
        let refresh_token = generate_token();
        let expires_at = Utc::now() + self.session_ttl;

        state.sessions.insert(
            hash_token(&access_token),
            StoredSession {
                user_id: user.id,
                refresh_token_hash: hash_token(&refresh_token),
                expires_at,
            },
        );

        AuthSession {
            access_token,
            refresh_token,
            expires_at,
            user,
        }
    }

    /// Owner of a live session; expired sessions are dropped
    fn session_owner(state: &mut State, access_token: &str) -> AuthResult<Uuid> {
        let key = hash_token(access_token);
        let session = state
            .sessions
            .get(&key)
            .cloned()
            .ok_or(AuthError::SessionInvalid)?;

        if Utc::now() >= session.expires_at {
            state.sessions.remove(&key);
            return Err(AuthError::SessionInvalid);
        }
        Ok(session.user_id)
    }

    fn user_by_id(state: &State, id: Uuid) -> Option<AuthUser> {
        state
            .users
            .values()
            .find(|stored| stored.user.id == id)
            .map(|stored| stored.user.clone())
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        let key = email.to_lowercase();
        let password_hash = hash_password(password)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.users.contains_key(&key) {
            return Err(AuthError::EmailAlreadyExists);
        }

        let now = Utc::now();
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: now,
            updated_at: now,
            metadata: None,
        };
        state.users.insert(
            key,
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let user = match state.users.get(&email.to_lowercase()) {
            Some(stored) if verify_password(password, &stored.password_hash) => {
                stored.user.clone()
            }
            _ => return Err(AuthError::InvalidCredentials),
        };
        Ok(self.issue(&mut state, user))
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state
            .sessions
            .remove(&hash_token(access_token))
            .map(|_| ())
            .ok_or(AuthError::SessionInvalid)
    }

    async fn get_user(&self, access_token: &str) -> AuthResult<AuthUser> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let user_id = Self::session_owner(&mut state, access_token)?;
        Self::user_by_id(&state, user_id).ok_or(AuthError::SessionInvalid)
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let presented = hash_token(refresh_token);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let key = state
            .sessions
            .iter()
            .find(|(_, session)| tokens_match(&session.refresh_token_hash, &presented))
            .map(|(key, _)| key.clone())
            .ok_or(AuthError::InvalidRefreshToken)?;

        // Single-use: the old session goes away whether or not the user still exists
        let old = state
            .sessions
            .remove(&key)
            .ok_or(AuthError::InvalidRefreshToken)?;
        let user = Self::user_by_id(&state, old.user_id).ok_or(AuthError::InvalidRefreshToken)?;
        Ok(self.issue(&mut state, user))
    }

    async fn update_user(&self, access_token: &str, update: &UserUpdate) -> AuthResult<AuthUser> {
        let password_hash = update.password.as_deref().map(hash_password).transpose()?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let user_id = Self::session_owner(&mut state, access_token)?;

        let old_key = state
            .users
            .iter()
            .find(|(_, stored)| stored.user.id == user_id)
            .map(|(key, _)| key.clone())
            .ok_or(AuthError::SessionInvalid)?;
        let new_key = update
            .email
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| old_key.clone());
        if new_key != old_key && state.users.contains_key(&new_key) {
            return Err(AuthError::EmailAlreadyExists);
        }

        let mut stored = state
            .users
            .remove(&old_key)
            .ok_or(AuthError::SessionInvalid)?;
        if let Some(email) = &update.email {
            stored.user.email = email.clone();
        }
        if let Some(hash) = password_hash {
            stored.password_hash = hash;
        }
        if let Some(metadata) = &update.metadata {
            stored.user.metadata = Some(metadata.clone());
        }
        stored.user.updated_at = Utc::now();

        let user = stored.user.clone();
        state.users.insert(new_key, stored);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let provider = MemoryAuthProvider::new();
        let user = provider.sign_up("Ada@Example.com", "password1").await.unwrap();

        let session = provider.sign_in("ada@example.com", "password1").await.unwrap();
        assert_eq!(session.user.id, user.id);
        assert_eq!(provider.get_user(&session.access_token).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let provider = MemoryAuthProvider::new();
        provider.sign_up("ada@example.com", "password1").await.unwrap();
        let err = provider.sign_up("ADA@example.com", "password2").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyExists));
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let provider = MemoryAuthProvider::new();
        provider.sign_up("ada@example.com", "password1").await.unwrap();

        let wrong = provider.sign_in("ada@example.com", "nope").await.unwrap_err();
        let unknown = provider.sign_in("bob@example.com", "password1").await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_refresh_token_single_use() {
        let provider = MemoryAuthProvider::new();
        provider.sign_up("ada@example.com", "password1").await.unwrap();
        let first = provider.sign_in("ada@example.com", "password1").await.unwrap();

        let second = provider.refresh_session(&first.refresh_token).await.unwrap();
        assert_ne!(second.access_token, first.access_token);
        assert!(matches!(
            provider.refresh_session(&first.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(matches!(
            provider.get_user(&first.access_token).await,
            Err(AuthError::SessionInvalid)
        ));
        assert_eq!(provider.session_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let provider = MemoryAuthProvider::new().with_session_ttl(Duration::seconds(-1));
        provider.sign_up("ada@example.com", "password1").await.unwrap();
        let session = provider.sign_in("ada@example.com", "password1").await.unwrap();

        assert!(matches!(
            provider.get_user(&session.access_token).await,
            Err(AuthError::SessionInvalid)
        ));
        assert_eq!(provider.session_count(), 0);
    }

    #[tokio::test]
    async fn test_update_user_changes_email_and_password() {
        let provider = MemoryAuthProvider::new();
        provider.sign_up("ada@example.com", "password1").await.unwrap();
        provider.sign_up("bob@example.com", "password1").await.unwrap();
        let session = provider.sign_in("ada@example.com", "password1").await.unwrap();

        let taken = UserUpdate::default().with_email("BOB@example.com");
        assert!(matches!(
            provider.update_user(&session.access_token, &taken).await,
            Err(AuthError::EmailAlreadyExists)
        ));

        let update = UserUpdate::password("password2")
            .with_email("lovelace@example.com")
            .with_metadata(serde_json::json!({"team": "engines"}));
        let user = provider.update_user(&session.access_token, &update).await.unwrap();
        assert_eq!(user.email, "lovelace@example.com");
        assert_eq!(user.metadata, Some(serde_json::json!({"team": "engines"})));
        assert!(user.updated_at >= user.created_at);

        assert!(provider.sign_in("ada@example.com", "password1").await.is_err());
        assert!(provider.sign_in("lovelace@example.com", "password1").await.is_err());
        assert!(provider.sign_in("lovelace@example.com", "password2").await.is_ok());
        assert!(matches!(
            provider.update_user("bogus", &update).await,
            Err(AuthError::SessionInvalid)
        ));
    }

    #[tokio::test]
    async fn test_sign_out_revokes() {
        let provider = MemoryAuthProvider::new();
        provider.sign_up("ada@example.com", "password1").await.unwrap();
        let session = provider.sign_in("ada@example.com", "password1").await.unwrap();

        provider.sign_out(&session.access_token).await.unwrap();
        assert!(provider.get_user(&session.access_token).await.is_err());
        assert!(matches!(
            provider.sign_out(&session.access_token).await,
            Err(AuthError::SessionInvalid)
        ));
    }
}
