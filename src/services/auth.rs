//! Account service — sign in, sign up, sign out.
//!
//! Authentication itself happens on the backend. This side validates the
//! form fields, calls the unauthenticated endpoints, and keeps the returned
//! bearer token and user profile in the store where `HttpGateway` reads them.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{ErrorCode, ValidationError};
use crate::gateway::types::{AuthReply, AuthUser, Credentials, Registration};
use crate::gateway::{AuthGateway, GatewayError};
use crate::store::{self, StoreError, Storage, TOKEN_KEY, USER_KEY};

/// Shortest password accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("could not save session: {0}")]
    Store(#[from] StoreError),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::Gateway(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Gateway(e) if e.retryable())
    }
}

pub struct Authenticator {
    gateway: Arc<dyn AuthGateway>,
    storage: Arc<dyn Storage>,
}

impl Authenticator {
    pub fn new(gateway: Arc<dyn AuthGateway>, storage: Arc<dyn Storage>) -> Self {
        Self { gateway, storage }
    }

    /// # Errors
    ///
    /// [`ValidationError::MissingFields`] for blank input, otherwise the
    /// gateway or store failure.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ValidationError::MissingFields.into());
        }
        let credentials = Credentials { email: email.trim().to_owned(), password: password.to_owned() };
        let reply = self.gateway.sign_in(&credentials).await?;
        self.remember(reply)
    }

    /// # Errors
    ///
    /// [`ValidationError::MissingFields`] or
    /// [`ValidationError::PasswordTooShort`] before any request, otherwise
    /// the gateway or store failure.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(ValidationError::MissingFields.into());
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN }.into());
        }
        let registration = Registration {
            name: name.trim().to_owned(),
            email: email.trim().to_owned(),
            password: password.to_owned(),
        };
        let reply = self.gateway.sign_up(&registration).await?;
        self.remember(reply)
    }

    /// Forget the stored token and profile.
    ///
    /// # Errors
    ///
    /// Returns the store failure if the token could not be removed.
    pub fn sign_out(&self) -> Result<(), StoreError> {
        self.storage.remove(TOKEN_KEY)?;
        if let Err(e) = self.storage.remove(USER_KEY) {
            warn!(error = %e, "auth: could not remove stored profile");
        }
        info!("auth: signed out");
        Ok(())
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self.storage.get(TOKEN_KEY), Ok(Some(token)) if !token.trim().is_empty())
    }

    #[must_use]
    pub fn current_user(&self) -> Option<AuthUser> {
        store::load_json(self.storage.as_ref(), USER_KEY)
    }

    fn remember(&self, reply: AuthReply) -> Result<AuthUser, AuthError> {
        self.storage.set(TOKEN_KEY, &reply.token)?;
        store::save_json(self.storage.as_ref(), USER_KEY, &reply.user);
        info!(user_id = %reply.user.id, "auth: signed in");
        Ok(reply.user)
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
