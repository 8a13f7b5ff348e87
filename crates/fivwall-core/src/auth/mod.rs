//! Credential handling for cloud sync.
//!
//! The [`TokenStore`] owns the current credential and decides when it needs
//! refreshing. Talking to the authorization backend and persisting the
//! credential are delegated to the [`AuthBackend`] and
//! [`CredentialPersistence`] ports.

mod http;
mod token_store;

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Credential, Profile, RefreshedToken, TokenGrant};

pub use http::HttpAuthBackend;
pub use token_store::TokenStore;

/// Message shown when the session cannot be renewed.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please sign in again";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("{}", SESSION_EXPIRED_MESSAGE)]
    SessionExpired,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

impl AuthError {
    /// Whether the session is gone and the user has to sign in again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::SessionExpired)
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Authorization backend: code exchange, refresh and revocation.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn exchange_code(&self, code: &str, redirect_uri: Option<&str>)
        -> AuthResult<TokenGrant>;

    async fn refresh_token(&self, refresh_token: &str) -> AuthResult<RefreshedToken>;

    async fn revoke_token(&self, access_token: &str) -> AuthResult<()>;

    async fn fetch_profile(&self, _access_token: &str) -> AuthResult<Option<Profile>> {
        Ok(None)
    }
}

/// Durable storage for the signed-in credential.
pub trait CredentialPersistence: Send + Sync {
    fn load_credential(&self) -> AuthResult<Option<Credential>>;
    fn save_credential(&self, credential: &Credential) -> AuthResult<()>;
    fn clear_credential(&self) -> AuthResult<()>;
}

/// Process-local credential storage.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialPersistence for MemoryCredentialStore {
    fn load_credential(&self) -> AuthResult<Option<Credential>> {
        Ok(self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_credential(&self, credential: &Credential) -> AuthResult<()> {
        *self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        Ok(())
    }

    fn clear_credential(&self) -> AuthResult<()> {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        assert!(store.load_credential().unwrap().is_none());

        let credential = Credential {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: 1,
            profile: None,
        };
        store.save_credential(&credential).unwrap();
        assert_eq!(store.load_credential().unwrap(), Some(credential));

        store.clear_credential().unwrap();
        assert!(store.load_credential().unwrap().is_none());
    }

    #[test]
    fn session_expired_message_is_user_facing() {
        assert_eq!(
            AuthError::SessionExpired.to_string(),
            "Session expired, please sign in again"
        );
        assert!(AuthError::SessionExpired.is_terminal());
        assert!(!AuthError::Api("boom".to_string()).is_terminal());
    }
}
