use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::Mutex;

use super::{AuthBackend, AuthError, AuthResult, CredentialPersistence};
use crate::models::{Credential, Profile};
use crate::util::unix_millis_now;

/// Holds the current credential and serializes token refreshes.
///
/// Reads are in-memory and never touch the network. Every refresh goes
/// through one async gate; a caller that waited on the gate re-checks the
/// credential first, so concurrent callers share a single refresh outcome.
///
/// Writes to durable storage happen under the in-memory write guard, so a
/// refresh that completes while [`TokenStore::clear`] runs can never bring
/// the credential back.
pub struct TokenStore {
    backend: Arc<dyn AuthBackend>,
    persistence: Arc<dyn CredentialPersistence>,
    lookahead: Duration,
    credential: RwLock<Option<Credential>>,
    refresh_gate: Mutex<()>,
}

impl TokenStore {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        persistence: Arc<dyn CredentialPersistence>,
        lookahead: Duration,
    ) -> Self {
        Self {
            backend,
            persistence,
            lookahead,
            credential: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AuthBackend> {
        &self.backend
    }

    /// Store a new credential, superseding any previous one.
    pub fn set_credential(&self, credential: Credential) -> AuthResult<()> {
        let mut slot = self.write_slot();
        self.persistence.save_credential(&credential)?;
        *slot = Some(credential);
        Ok(())
    }

    /// Load the persisted credential into memory.
    pub fn restore(&self) -> AuthResult<Option<Credential>> {
        let mut slot = self.write_slot();
        let credential = self.persistence.load_credential()?;
        slot.clone_from(&credential);
        Ok(credential)
    }

    pub fn credential(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_access_token(&self) -> Option<String> {
        self.credential().map(|credential| credential.access_token)
    }

    pub fn profile(&self) -> Option<Profile> {
        self.credential().and_then(|credential| credential.profile)
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Return a usable access token, refreshing it first when it is about
    /// to expire.
    pub async fn ensure_fresh(&self) -> AuthResult<String> {
        let credential = self.credential().ok_or(AuthError::NotAuthenticated)?;
        if !self.needs_refresh(&credential) {
            return Ok(credential.access_token);
        }

        let _gate = self.refresh_gate.lock().await;
        let credential = self.credential().ok_or(AuthError::NotAuthenticated)?;
        if !self.needs_refresh(&credential) {
            return Ok(credential.access_token);
        }
        self.refresh_locked(credential).await
    }

    /// Refresh after the remote store rejected `rejected_token`.
    ///
    /// Returns the replacement right away when a concurrent caller already
    /// refreshed past the rejected token.
    pub async fn refresh_after_rejection(&self, rejected_token: &str) -> AuthResult<String> {
        let _gate = self.refresh_gate.lock().await;
        let credential = self.credential().ok_or(AuthError::NotAuthenticated)?;
        if credential.access_token != rejected_token {
            return Ok(credential.access_token);
        }
        if !credential.can_refresh() {
            tracing::warn!("Access token rejected and no refresh token is available");
            self.clear_quietly();
            return Err(AuthError::SessionExpired);
        }
        self.refresh_locked(credential).await
    }

    /// Forget the credential in memory and in durable storage.
    pub fn clear(&self) -> AuthResult<()> {
        let mut slot = self.write_slot();
        *slot = None;
        self.persistence.clear_credential()
    }

    fn needs_refresh(&self, credential: &Credential) -> bool {
        credential.can_refresh() && credential.expires_within(self.lookahead, unix_millis_now())
    }

    async fn refresh_locked(&self, credential: Credential) -> AuthResult<String> {
        let Some(refresh_token) = credential.refresh_token.clone() else {
            self.clear_quietly();
            return Err(AuthError::SessionExpired);
        };

        match self.backend.refresh_token(&refresh_token).await {
            Ok(refreshed) => {
                let renewed = credential.with_refreshed(refreshed, unix_millis_now());
                let access_token = renewed.access_token.clone();

                let mut slot = self.write_slot();
                // Signed out or replaced while the request was in flight.
                match slot.as_ref() {
                    Some(current) if current.access_token == credential.access_token => {}
                    Some(current) => return Ok(current.access_token.clone()),
                    None => return Err(AuthError::NotAuthenticated),
                }
                if let Err(error) = self.persistence.save_credential(&renewed) {
                    tracing::warn!("Failed to persist refreshed credential: {}", error);
                }
                *slot = Some(renewed);
                drop(slot);

                tracing::debug!("Access token refreshed");
                Ok(access_token)
            }
            Err(error) => {
                tracing::warn!("Token refresh failed: {}", error);
                self.clear_quietly();
                Err(AuthError::SessionExpired)
            }
        }
    }

    fn clear_quietly(&self) {
        if let Err(error) = self.clear() {
            tracing::warn!("Failed to clear stored credential: {}", error);
        }
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Option<Credential>> {
        self.credential
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::testing::{credential_expiring_in, FakeAuthBackend};

    fn store_with(backend: &Arc<FakeAuthBackend>) -> (TokenStore, Arc<MemoryCredentialStore>) {
        let persistence = Arc::new(MemoryCredentialStore::new());
        let store = TokenStore::new(
            backend.clone(),
            persistence.clone(),
            Duration::from_secs(300),
        );
        (store, persistence)
    }

    #[tokio::test]
    async fn ensure_fresh_without_credential_is_not_authenticated() {
        let backend = Arc::new(FakeAuthBackend::default());
        let (store, _) = store_with(&backend);
        assert!(matches!(
            store.ensure_fresh().await,
            Err(AuthError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn ensure_fresh_keeps_token_outside_lookahead() {
        let backend = Arc::new(FakeAuthBackend::default());
        let (store, _) = store_with(&backend);
        store
            .set_credential(credential_expiring_in("access", Some("refresh"), 3_600))
            .unwrap();

        assert_eq!(store.ensure_fresh().await.unwrap(), "access");
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ensure_fresh_refreshes_inside_lookahead_and_persists() {
        let backend = Arc::new(FakeAuthBackend::default());
        let (store, persistence) = store_with(&backend);
        store
            .set_credential(credential_expiring_in("access", Some("refresh"), 60))
            .unwrap();

        let token = store.ensure_fresh().await.unwrap();
        assert_eq!(token, "refreshed-1");
        assert_eq!(store.current_access_token().as_deref(), Some("refreshed-1"));

        let persisted = persistence.load_credential().unwrap().unwrap();
        assert_eq!(persisted.access_token, "refreshed-1");
        assert_eq!(persisted.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn ensure_fresh_without_refresh_token_is_a_no_op() {
        let backend = Arc::new(FakeAuthBackend::default());
        let (store, _) = store_with(&backend);
        store
            .set_credential(credential_expiring_in("access", None, -10))
            .unwrap();

        assert_eq!(store.ensure_fresh().await.unwrap(), "access");
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refresh_failure_clears_credential() {
        let backend = Arc::new(FakeAuthBackend::default());
        backend.fail_refresh.store(true, Ordering::SeqCst);
        let (store, persistence) = store_with(&backend);
        store
            .set_credential(credential_expiring_in("access", Some("refresh"), 0))
            .unwrap();

        assert!(matches!(
            store.ensure_fresh().await,
            Err(AuthError::SessionExpired)
        ));
        assert!(!store.is_authenticated());
        assert!(persistence.load_credential().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let backend = Arc::new(FakeAuthBackend::with_refresh_delay(Duration::from_millis(50)));
        let (store, _) = store_with(&backend);
        store
            .set_credential(credential_expiring_in("access", Some("refresh"), 0))
            .unwrap();

        let (first, second, third) = tokio::join!(
            store.ensure_fresh(),
            store.ensure_fresh(),
            store.refresh_after_rejection("access"),
        );

        assert_eq!(first.unwrap(), "refreshed-1");
        assert_eq!(second.unwrap(), "refreshed-1");
        assert_eq!(third.unwrap(), "refreshed-1");
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejection_of_stale_token_returns_current_one() {
        let backend = Arc::new(FakeAuthBackend::default());
        let (store, _) = store_with(&backend);
        store
            .set_credential(credential_expiring_in("current", Some("refresh"), 3_600))
            .unwrap();

        assert_eq!(store.refresh_after_rejection("old").await.unwrap(), "current");
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejection_without_refresh_token_expires_session() {
        let backend = Arc::new(FakeAuthBackend::default());
        let (store, _) = store_with(&backend);
        store
            .set_credential(credential_expiring_in("access", None, 3_600))
            .unwrap();

        assert!(matches!(
            store.refresh_after_rejection("access").await,
            Err(AuthError::SessionExpired)
        ));
        assert!(!store.is_authenticated());
    }

    /// Persistence whose saves block the calling thread for a while.
    struct SlowSaves {
        inner: MemoryCredentialStore,
        delay: std::sync::Mutex<Option<Duration>>,
    }

    impl CredentialPersistence for SlowSaves {
        fn load_credential(&self) -> AuthResult<Option<Credential>> {
            self.inner.load_credential()
        }

        fn save_credential(&self, credential: &Credential) -> AuthResult<()> {
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
            self.inner.save_credential(credential)
        }

        fn clear_credential(&self) -> AuthResult<()> {
            self.inner.clear_credential()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn logout_during_refresh_save_stays_signed_out() {
        let persistence = Arc::new(SlowSaves {
            inner: MemoryCredentialStore::new(),
            delay: std::sync::Mutex::new(None),
        });
        let store = Arc::new(TokenStore::new(
            Arc::new(FakeAuthBackend::default()),
            persistence.clone(),
            Duration::from_secs(300),
        ));
        store
            .set_credential(credential_expiring_in("access", Some("refresh"), 0))
            .unwrap();
        *persistence.delay.lock().unwrap() = Some(Duration::from_millis(300));

        let refreshing = tokio::spawn({
            let store = store.clone();
            async move { store.ensure_fresh().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.clear().unwrap();
        let _ = refreshing.await.unwrap();

        assert!(!store.is_authenticated());
        assert!(persistence.load_credential().unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_loads_persisted_credential() {
        let backend = Arc::new(FakeAuthBackend::default());
        let (store, persistence) = store_with(&backend);
        persistence
            .save_credential(&credential_expiring_in("saved", Some("refresh"), 3_600))
            .unwrap();

        assert!(!store.is_authenticated());
        let restored = store.restore().unwrap().unwrap();
        assert_eq!(restored.access_token, "saved");
        assert_eq!(store.current_access_token().as_deref(), Some("saved"));

        store.clear().unwrap();
        assert!(store.current_access_token().is_none());
        assert!(persistence.load_credential().unwrap().is_none());
    }
}
