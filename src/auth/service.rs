//! # Auth Service
//!
//! Argument checks and current-session tracking over an [`AuthProvider`].

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use super::crypto::{validate_email, PasswordPolicy};
use super::errors::{AuthError, AuthResult};
use super::provider::{AuthProvider, AuthSession, AuthUser, UserUpdate};
use crate::observability::Event;

pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    policy: PasswordPolicy,
    current: RwLock<Option<AuthSession>>,
}

fn require_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok(())
}

impl AuthService {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            provider,
            policy: PasswordPolicy::default(),
            current: RwLock::new(None),
        }
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The session established by the last sign-in or refresh
    pub fn session(&self) -> Option<AuthSession> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session().is_some()
    }

    fn set_session(&self, session: Option<AuthSession>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn current_session(&self) -> AuthResult<AuthSession> {
        self.session().ok_or(AuthError::NoActiveSession)
    }

    /// Register a new user; does not sign in
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthUser> {
        require_credentials(email, password)?;
        let email = email.trim();
        validate_email(email)?;
        self.policy.validate(password)?;

        let user = self.provider.sign_up(email, password).await?;
        info!(event = Event::AuthSignUp.as_str(), user_id = %user.id);
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        require_credentials(email, password)?;

        match self.provider.sign_in(email.trim(), password).await {
            Ok(session) => {
                info!(event = Event::AuthSignIn.as_str(), user_id = %session.user.id);
                self.set_session(Some(session.clone()));
                Ok(session)
            }
            Err(e) => {
                warn!(event = Event::AuthSignIn.as_str(), error = %e, "sign-in rejected");
                Err(e)
            }
        }
    }

    /// Sign out the current session
    ///
    /// Without a session this is a no-op. The local session is dropped even
    /// when the provider no longer recognizes the token.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let Some(session) = self.session() else {
            return Ok(());
        };
        self.set_session(None);

        match self.provider.sign_out(&session.access_token).await {
            Ok(()) | Err(AuthError::SessionInvalid) => {
                info!(event = Event::AuthSignOut.as_str(), user_id = %session.user.id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// The user behind the current session, as the provider sees it
    pub async fn current_user(&self) -> AuthResult<AuthUser> {
        let session = self.current_session()?;
        let result = self.provider.get_user(&session.access_token).await;
        if matches!(result, Err(AuthError::SessionInvalid)) {
            self.set_session(None);
        }
        result
    }

    /// Change the signed-in user's email, password or metadata
    pub async fn update_user(&self, mut update: UserUpdate) -> AuthResult<AuthUser> {
        if update.is_empty() {
            return Err(AuthError::NothingToUpdate);
        }
        if let Some(email) = update.email.as_mut() {
            *email = email.trim().to_string();
            validate_email(email)?;
        }
        if let Some(password) = &update.password {
            self.policy.validate(password)?;
        }
        let session = self.current_session()?;

        match self.provider.update_user(&session.access_token, &update).await {
            Ok(user) => {
                info!(
                    event = Event::AuthUserUpdated.as_str(),
                    user_id = %user.id,
                    password_changed = update.password.is_some(),
                );
                self.set_session(Some(AuthSession {
                    user: user.clone(),
                    ..session
                }));
                Ok(user)
            }
            Err(e) => {
                if matches!(e, AuthError::SessionInvalid) {
                    self.set_session(None);
                }
                Err(e)
            }
        }
    }

    /// Replace the signed-in user's password
    pub async fn update_password(&self, new_password: &str) -> AuthResult<()> {
        if new_password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        self.update_user(UserUpdate::password(new_password))
            .await
            .map(|_| ())
    }

    /// Exchange the current refresh token for a new session
    pub async fn refresh_session(&self) -> AuthResult<AuthSession> {
        let session = self.current_session()?;
        match self.provider.refresh_session(&session.refresh_token).await {
            Ok(refreshed) => {
                info!(
                    event = Event::AuthSessionRefreshed.as_str(),
                    user_id = %refreshed.user.id
                );
                self.set_session(Some(refreshed.clone()));
                Ok(refreshed)
            }
            Err(e) => {
                if e.is_client_error() {
                    self.set_session(None);
                }
                Err(e)
            }
        }
    }
}
