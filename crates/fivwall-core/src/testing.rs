//! In-memory fakes for the auth backend and the remote object store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::{AuthBackend, AuthError, AuthResult, MemoryCredentialStore, TokenStore};
use crate::drive::{RemoteError, RemoteObjectStore, RemoteResult};
use crate::models::{Credential, NewNote, Profile, RefreshedToken, Snapshot, TokenGrant};
use crate::util::unix_millis_now;

pub fn credential_expiring_in(
    access_token: &str,
    refresh_token: Option<&str>,
    seconds: i64,
) -> Credential {
    Credential {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        expires_at: unix_millis_now() + seconds * 1_000,
        profile: None,
    }
}

pub fn grant(access_token: &str) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_string(),
        refresh_token: Some("refresh".to_string()),
        expires_in: 3_600,
    }
}

pub fn new_note(title: &str) -> NewNote {
    NewNote {
        title: title.to_string(),
        ..NewNote::default()
    }
}

pub fn token_store(backend: Arc<FakeAuthBackend>) -> Arc<TokenStore> {
    Arc::new(TokenStore::new(
        backend,
        Arc::new(MemoryCredentialStore::new()),
        Duration::from_secs(300),
    ))
}

#[derive(Default)]
pub struct FakeAuthBackend {
    pub fail_refresh: AtomicBool,
    pub refresh_calls: AtomicUsize,
    pub revoke_calls: AtomicUsize,
    refresh_delay: Option<Duration>,
}

impl FakeAuthBackend {
    pub fn with_refresh_delay(delay: Duration) -> Self {
        Self {
            refresh_delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AuthBackend for FakeAuthBackend {
    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: Option<&str>,
    ) -> AuthResult<TokenGrant> {
        Ok(grant(&format!("access-for-{code}")))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> AuthResult<RefreshedToken> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AuthError::Api("invalid_grant (400)".to_string()));
        }
        Ok(RefreshedToken {
            access_token: format!("refreshed-{call}"),
            expires_in: 3_600,
        })
    }

    async fn revoke_token(&self, _access_token: &str) -> AuthResult<()> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_profile(&self, _access_token: &str) -> AuthResult<Option<Profile>> {
        Ok(Some(Profile {
            email: Some("user@example.com".to_string()),
            ..Profile::default()
        }))
    }
}

#[derive(Default)]
struct FakeDrive {
    containers: HashMap<String, String>,
    objects: HashMap<String, (String, String, Vec<u8>)>,
    next_id: usize,
}

impl FakeDrive {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

/// Remote object store kept in memory, with injectable failures.
#[derive(Default)]
pub struct FakeObjectStore {
    drive: Mutex<FakeDrive>,
    rejected_tokens: Mutex<HashSet<String>>,
    /// Upcoming discovery calls that fail with a server error
    pub discovery_failures: AtomicUsize,
    /// Upcoming writes that fail with a server error
    pub write_failures: AtomicUsize,
    /// Every call, successful or not
    pub calls: AtomicUsize,
    /// Write attempts, successful or not
    pub writes: AtomicUsize,
    write_delay: Mutex<Option<Duration>>,
}

impl FakeObjectStore {
    pub fn reject_token(&self, token: &str) {
        self.rejected_tokens
            .lock()
            .unwrap()
            .insert(token.to_string());
    }

    /// Make every following write take `delay` before it lands.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }

    pub fn seed(&self, container: &str, object: &str, snapshot: &Snapshot) {
        self.seed_bytes(container, object, snapshot.to_bytes().unwrap());
    }

    pub fn seed_bytes(&self, container: &str, object: &str, bytes: Vec<u8>) {
        let mut drive = self.drive.lock().unwrap();
        let container_id = drive.allocate_id("folder");
        drive
            .containers
            .insert(container.to_string(), container_id.clone());
        let object_id = drive.allocate_id("file");
        drive
            .objects
            .insert(object_id, (container_id, object.to_string(), bytes));
    }

    pub fn stored_snapshot(&self) -> Option<Snapshot> {
        let drive = self.drive.lock().unwrap();
        drive
            .objects
            .values()
            .next()
            .and_then(|(_, _, bytes)| Snapshot::from_remote_bytes(bytes, 0))
    }

    pub fn object_count(&self) -> usize {
        self.drive.lock().unwrap().objects.len()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn begin(&self, token: &str) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected_tokens.lock().unwrap().contains(token) {
            return Err(RemoteError::Unauthorized);
        }
        Ok(())
    }

    fn injected(counter: &AtomicUsize) -> RemoteResult<()> {
        let took = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if took {
            Err(RemoteError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteObjectStore for FakeObjectStore {
    async fn find_or_create_container(&self, token: &str, name: &str) -> RemoteResult<String> {
        self.begin(token)?;
        Self::injected(&self.discovery_failures)?;
        let mut drive = self.drive.lock().unwrap();
        if let Some(id) = drive.containers.get(name) {
            return Ok(id.clone());
        }
        let id = drive.allocate_id("folder");
        drive.containers.insert(name.to_string(), id.clone());
        Ok(id)
    }

    async fn find_object(
        &self,
        token: &str,
        container_id: &str,
        name: &str,
    ) -> RemoteResult<Option<String>> {
        self.begin(token)?;
        Self::injected(&self.discovery_failures)?;
        let drive = self.drive.lock().unwrap();
        Ok(drive
            .objects
            .iter()
            .find(|(_, (parent, object_name, _))| parent == container_id && object_name == name)
            .map(|(id, _)| id.clone()))
    }

    async fn read_object(&self, token: &str, object_id: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.begin(token)?;
        Self::injected(&self.discovery_failures)?;
        let drive = self.drive.lock().unwrap();
        Ok(drive
            .objects
            .get(object_id)
            .map(|(_, _, bytes)| bytes.clone()))
    }

    async fn write_object(
        &self,
        token: &str,
        container_id: &str,
        object_id: Option<&str>,
        name: &str,
        bytes: Vec<u8>,
    ) -> RemoteResult<String> {
        self.begin(token)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::injected(&self.write_failures)?;
        let mut drive = self.drive.lock().unwrap();
        let id = match object_id {
            Some(id) => id.to_string(),
            None => drive.allocate_id("file"),
        };
        drive
            .objects
            .insert(id.clone(), (container_id.to_string(), name.to_string(), bytes));
        Ok(id)
    }
}
