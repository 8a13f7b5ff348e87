//! Sync state machine.
//!
//! Pushes are debounced on the trailing edge and retried a bounded number of
//! times. Pushes and pulls never overlap: both run under one exchange lock.
//! Logout bumps a session epoch that every in-flight cycle re-checks after
//! each await, so abandoned cycles stop touching state.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{
    FirstContact, FirstContactChoice, RemoteGateway, SyncError, SyncResult, SyncSessionState,
    SyncStatus,
};
use crate::auth::{TokenStore, SESSION_EXPIRED_MESSAGE};
use crate::config::SyncSettings;
use crate::drive::RemoteObjectStore;
use crate::models::{Credential, Profile, Snapshot, TokenGrant};
use crate::state::NoteStore;
use crate::util::unix_millis_now;

/// How a sign-in was reconciled with the remote copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Neither side has notes
    Idle,
    /// Remote was empty; local notes were pushed
    PushedLocal,
    /// Local was empty; remote notes were adopted
    PulledRemote,
    /// Both sides have notes; waiting for [`SyncOrchestrator::resolve_first_contact`]
    FirstContact {
        local_count: usize,
        remote_count: usize,
    },
    /// The remote copy could not be read; reconciliation reruns on focus
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    Unchanged,
    /// Retry budget exhausted; see the session state for the resulting status
    Failed,
    /// Not signed in, blocked on first contact, or abandoned by logout
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    Replaced,
    KeptLocal,
    RemoteAbsent,
    Failed,
    Skipped,
}

#[derive(Default)]
struct Debounce {
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    store: NoteStore,
    gateway: RemoteGateway,
    settings: SyncSettings,
    session: watch::Sender<SyncSessionState>,
    last_pushed: Mutex<Option<String>>,
    exchange: tokio::sync::Mutex<()>,
    debounce: Mutex<Debounce>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    epoch: AtomicU64,
    reconcile_pending: AtomicBool,
    last_snapshot_at: AtomicI64,
}

/// Drives synchronization between the local [`NoteStore`] and the remote copy.
///
/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    pub fn new(
        store: NoteStore,
        tokens: Arc<TokenStore>,
        remote: Arc<dyn RemoteObjectStore>,
        settings: SyncSettings,
    ) -> Self {
        let gateway = RemoteGateway::new(tokens, remote, &settings);
        let (session, _) = watch::channel(SyncSessionState::default());
        Self {
            inner: Arc::new(Inner {
                store,
                gateway,
                settings,
                session,
                last_pushed: Mutex::new(None),
                exchange: tokio::sync::Mutex::new(()),
                debounce: Mutex::new(Debounce::default()),
                watcher: Mutex::new(None),
                epoch: AtomicU64::new(0),
                reconcile_pending: AtomicBool::new(false),
                last_snapshot_at: AtomicI64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &NoteStore {
        &self.inner.store
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        self.inner.gateway.tokens()
    }

    pub fn session(&self) -> SyncSessionState {
        self.inner.session.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSessionState> {
        self.inner.session.subscribe()
    }

    /// Start watching the note store for local changes.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut changes = self.inner.store.subscribe();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.on_local_change();
            }
        });

        let previous = lock(&self.inner.watcher).replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop the change watcher and any pending debounce timer.
    pub fn shutdown(&self) {
        if let Some(watcher) = lock(&self.inner.watcher).take() {
            watcher.abort();
        }
        self.inner.cancel_debounce();
    }

    /// Store the credential from a completed sign-in and reconcile with the
    /// remote copy.
    pub async fn login(
        &self,
        grant: TokenGrant,
        profile: Option<Profile>,
    ) -> SyncResult<LoginOutcome> {
        let inner = &self.inner;
        inner.reconcile_pending.store(true, Ordering::SeqCst);
        inner.set_last_pushed(None);

        let credential = Credential::from_grant(grant, profile.clone(), unix_millis_now());
        if let Err(error) = inner.tokens().set_credential(credential) {
            inner.reconcile_pending.store(false, Ordering::SeqCst);
            return Err(error.into());
        }
        inner.session.send_modify(|session| {
            *session = SyncSessionState {
                signed_in: true,
                profile,
                ..SyncSessionState::default()
            };
        });
        tracing::info!("Signed in; reconciling with remote copy");

        inner.reconcile().await
    }

    /// Apply the user's answer to a first-contact prompt.
    pub async fn resolve_first_contact(&self, choice: FirstContactChoice) -> PushOutcome {
        let inner = &self.inner;
        let mut pending = None;
        inner.session.send_if_modified(|session| {
            pending = session.pending_first_contact.take();
            pending.is_some()
        });
        let Some(pending) = pending else {
            tracing::debug!("No first-contact choice pending");
            return PushOutcome::Skipped;
        };

        tracing::info!(?choice, "Resolving first contact");
        match choice {
            FirstContactChoice::Push => {
                let epoch = inner.epoch();
                inner.run_push_cycle(epoch, true).await
            }
            FirstContactChoice::Pull => {
                let _exchange = inner.exchange.lock().await;
                inner.adopt_remote(pending.remote_snapshot);
                PushOutcome::Unchanged
            }
        }
    }

    /// App regained focus or visibility.
    pub async fn on_focus(&self, online: bool) {
        let inner = &self.inner;
        if !online || !inner.signed_in() {
            return;
        }
        if inner.reconcile_pending.load(Ordering::SeqCst) {
            if let Err(error) = inner.reconcile().await {
                tracing::warn!("Deferred reconciliation failed: {}", error);
            }
            return;
        }
        self.pull().await;
    }

    /// Download the remote copy and adopt it when it is at least as new as
    /// the last sync.
    pub async fn pull(&self) -> PullOutcome {
        self.inner.pull().await
    }

    /// Reload a persisted credential and pull. Returns whether a session
    /// was restored.
    pub async fn restore_session(&self, last_synced_at: Option<i64>) -> SyncResult<bool> {
        if !self.resume(last_synced_at)? {
            return Ok(false);
        }
        self.inner.pull().await;
        Ok(true)
    }

    /// Reload a persisted credential without contacting the remote.
    pub fn resume(&self, last_synced_at: Option<i64>) -> SyncResult<bool> {
        let inner = &self.inner;
        let Some(credential) = inner.tokens().restore()? else {
            return Ok(false);
        };

        inner.session.send_modify(|session| {
            *session = SyncSessionState {
                signed_in: true,
                profile: credential.profile,
                last_synced_at,
                ..SyncSessionState::default()
            };
        });
        tracing::info!("Restored sync session");
        Ok(true)
    }

    /// Push now, even when nothing changed since the last push.
    pub async fn retry(&self) -> PushOutcome {
        let inner = &self.inner;
        inner.cancel_debounce();
        inner.run_push_cycle(inner.epoch(), true).await
    }

    /// Push pending or not yet noticed local changes right away and wait for
    /// in-flight work.
    pub async fn flush(&self) -> PushOutcome {
        let inner = &self.inner;
        if inner.cancel_debounce() || inner.has_unpushed_changes() {
            return inner.run_push_cycle(inner.epoch(), false).await;
        }
        let _exchange = inner.exchange.lock().await;
        PushOutcome::Skipped
    }

    /// Sign out. Safe to call at any point; leaves no timers or retry
    /// loops running.
    pub async fn logout(&self) {
        let inner = &self.inner;
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        inner.cancel_debounce();

        let access_token = inner.tokens().current_access_token();
        if let Err(error) = inner.tokens().clear() {
            tracing::warn!("Failed to clear stored credential: {}", error);
        }
        inner.set_last_pushed(None);
        inner.reconcile_pending.store(false, Ordering::SeqCst);
        inner.session.send_replace(SyncSessionState::default());

        if let Some(access_token) = access_token {
            if let Err(error) = inner.tokens().backend().revoke_token(&access_token).await {
                tracing::debug!("Token revocation failed: {}", error);
            }
            tracing::info!("Signed out");
        }
    }
}

impl Inner {
    fn tokens(&self) -> &Arc<TokenStore> {
        self.gateway.tokens()
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    fn signed_in(&self) -> bool {
        self.session.borrow().signed_in
    }

    /// Automatic exchanges are blocked until sign-in reconciliation is done.
    fn exchanges_allowed(&self) -> bool {
        let session = self.session.borrow();
        session.signed_in
            && session.pending_first_contact.is_none()
            && !self.reconcile_pending.load(Ordering::SeqCst)
    }

    fn last_pushed(&self) -> Option<String> {
        lock(&self.last_pushed).clone()
    }

    fn set_last_pushed(&self, fingerprint: Option<String>) {
        *lock(&self.last_pushed) = fingerprint;
    }

    fn set_syncing(&self) {
        self.session.send_if_modified(|session| {
            let changed = session.status != SyncStatus::Syncing || session.last_error.is_some();
            session.status = SyncStatus::Syncing;
            session.last_error = None;
            changed
        });
    }

    fn mark_synced(&self) {
        self.mark_synced_after(i64::MIN);
    }

    /// Mark synced at a time strictly later than `snapshot_timestamp`, so a
    /// later pull never mistakes our own upload for a newer remote copy.
    fn mark_synced_after(&self, snapshot_timestamp: i64) {
        let synced_at = unix_millis_now().max(snapshot_timestamp.saturating_add(1));
        self.session.send_modify(|session| {
            session.status = SyncStatus::Synced;
            session.last_synced_at = Some(synced_at);
            session.last_error = None;
        });
    }

    fn next_snapshot_timestamp(&self) -> i64 {
        let now = unix_millis_now();
        let previous = self
            .last_snapshot_at
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or(now);
        now.max(previous.saturating_add(1))
    }

    fn on_local_change(self: &Arc<Self>) {
        if !self.exchanges_allowed() {
            return;
        }
        if self.last_pushed().as_deref() == Some(self.store.fingerprint().as_str()) {
            return;
        }
        self.set_syncing();
        self.schedule_push();
    }

    /// (Re)start the trailing-edge debounce timer.
    fn schedule_push(self: &Arc<Self>) {
        let mut debounce = lock(&self.debounce);
        debounce.generation = debounce.generation.wrapping_add(1);
        if let Some(timer) = debounce.timer.take() {
            timer.abort();
        }

        let generation = debounce.generation;
        let epoch = self.epoch();
        let delay = self.settings.debounce;
        let weak: Weak<Self> = Arc::downgrade(self);
        debounce.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            {
                let mut debounce = lock(&inner.debounce);
                if debounce.generation != generation {
                    return;
                }
                // Fired: from here on the cycle is never aborted.
                debounce.timer = None;
            }
            inner.run_push_cycle(epoch, false).await;
        }));
    }

    /// Cancel a pending (not yet fired) debounce. Returns whether one was pending.
    fn cancel_debounce(&self) -> bool {
        let mut debounce = lock(&self.debounce);
        debounce.generation = debounce.generation.wrapping_add(1);
        match debounce.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    async fn run_push_cycle(self: &Arc<Self>, epoch: u64, force: bool) -> PushOutcome {
        let exchange = self.exchange.lock().await;
        if !self.is_current(epoch) || !self.exchanges_allowed() {
            return PushOutcome::Skipped;
        }

        let state = self.store.current();
        let fingerprint = state.fingerprint();
        if !force && self.last_pushed().as_deref() == Some(fingerprint.as_str()) {
            self.session.send_if_modified(|session| {
                if session.status != SyncStatus::Syncing {
                    return false;
                }
                session.status = if session.last_synced_at.is_some() {
                    SyncStatus::Synced
                } else {
                    SyncStatus::Idle
                };
                true
            });
            return PushOutcome::Unchanged;
        }

        self.set_syncing();
        let snapshot = state.to_snapshot(self.next_snapshot_timestamp());
        let attempts = self.settings.max_retries.saturating_add(1);
        let mut last_write_error = None;

        for attempt in 1..=attempts {
            let result = self.push_once(&snapshot).await;
            if !self.is_current(epoch) {
                return PushOutcome::Skipped;
            }

            match result {
                Ok(()) => {
                    self.set_last_pushed(Some(fingerprint.clone()));
                    self.mark_synced_after(snapshot.timestamp);
                    tracing::info!(notes = snapshot.notes.len(), attempt, "Pushed snapshot");
                    drop(exchange);

                    // Changes made while the push was in flight get their own cycle.
                    if self.store.fingerprint() != fingerprint && !self.has_pending_timer() {
                        self.set_syncing();
                        self.schedule_push();
                    }
                    return PushOutcome::Pushed;
                }
                Err(error) if error.is_terminal_auth() => {
                    self.expire_session();
                    return PushOutcome::Failed;
                }
                Err(error) => {
                    tracing::warn!(attempt, attempts, "Push attempt failed: {}", error);
                    if matches!(error, SyncError::Write(_)) {
                        last_write_error = Some(error.to_string());
                    }
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
                if !self.is_current(epoch) {
                    return PushOutcome::Skipped;
                }
            }
        }

        match last_write_error {
            Some(message) => {
                tracing::warn!("Push failed after {} attempts", attempts);
                self.session.send_modify(|session| {
                    session.status = SyncStatus::Error;
                    session.last_error = Some(message);
                });
            }
            None => {
                tracing::info!("Remote discovery keeps failing; push stays pending");
            }
        }
        PushOutcome::Failed
    }

    async fn push_once(&self, snapshot: &Snapshot) -> SyncResult<()> {
        let location = self.gateway.prepare().await?;
        self.gateway.commit(&location, snapshot).await?;
        Ok(())
    }

    fn has_unpushed_changes(&self) -> bool {
        self.exchanges_allowed()
            && self.last_pushed().as_deref() != Some(self.store.fingerprint().as_str())
    }

    fn has_pending_timer(&self) -> bool {
        lock(&self.debounce).timer.is_some()
    }

    async fn pull(self: &Arc<Self>) -> PullOutcome {
        let epoch = self.epoch();
        let _exchange = self.exchange.lock().await;
        if !self.is_current(epoch) || !self.exchanges_allowed() {
            return PullOutcome::Skipped;
        }

        let (previous_status, previous_error) = {
            let session = self.session.borrow();
            (session.status, session.last_error.clone())
        };
        self.set_syncing();

        let fetched = self.gateway.fetch().await;
        if !self.is_current(epoch) {
            return PullOutcome::Skipped;
        }

        let remote = match fetched {
            Ok(remote) => remote,
            Err(error) if error.is_terminal_auth() => {
                self.expire_session();
                return PullOutcome::Failed;
            }
            Err(error) => {
                tracing::warn!("Pull failed: {}", error);
                self.session.send_modify(|session| {
                    session.status = previous_status;
                    session.last_error = previous_error;
                });
                return PullOutcome::Failed;
            }
        };

        let Some(remote) = remote else {
            self.session
                .send_modify(|session| session.status = SyncStatus::Idle);
            return PullOutcome::RemoteAbsent;
        };

        let last_synced_at = self.session.borrow().last_synced_at.unwrap_or(0);
        if remote.timestamp >= last_synced_at {
            tracing::info!(
                remote_timestamp = remote.timestamp,
                last_synced_at,
                "Remote copy is newer; replacing local notes"
            );
            self.adopt_remote(remote);
            return PullOutcome::Replaced;
        }

        let local_fingerprint = self.store.fingerprint();
        if remote.fingerprint() == local_fingerprint {
            self.set_last_pushed(Some(local_fingerprint));
        }
        self.mark_synced();
        if self.last_pushed() != Some(self.store.fingerprint()) && !self.has_pending_timer() {
            self.set_syncing();
            self.schedule_push();
        }
        PullOutcome::KeptLocal
    }

    /// Replace local state with `remote`. Caller holds the exchange lock.
    fn adopt_remote(&self, remote: Snapshot) {
        self.set_last_pushed(Some(remote.fingerprint()));
        let remote_timestamp = remote.timestamp;
        self.last_snapshot_at
            .fetch_max(remote_timestamp, Ordering::SeqCst);
        self.store.replace(remote.into());
        self.mark_synced_after(remote_timestamp);
    }

    async fn reconcile(self: &Arc<Self>) -> SyncResult<LoginOutcome> {
        let epoch = self.epoch();
        let exchange = self.exchange.lock().await;
        if !self.is_current(epoch) {
            return Ok(LoginOutcome::Idle);
        }

        let remote = match self.fetch_with_retry(epoch).await {
            Ok(remote) => remote,
            Err(error) if error.is_terminal_auth() => {
                self.expire_session();
                return Err(error);
            }
            Err(error) => {
                tracing::warn!("Could not read remote copy; deferring reconciliation: {}", error);
                return Ok(LoginOutcome::Deferred);
            }
        };
        if !self.is_current(epoch) {
            return Ok(LoginOutcome::Idle);
        }

        self.reconcile_pending.store(false, Ordering::SeqCst);
        let remote = remote.filter(|snapshot| !snapshot.notes.is_empty());
        let local_count = self.store.note_count();

        match (remote, local_count) {
            (None, 0) => {
                self.session
                    .send_modify(|session| session.status = SyncStatus::Idle);
                Ok(LoginOutcome::Idle)
            }
            (None, _) => {
                drop(exchange);
                match self.run_push_cycle(epoch, true).await {
                    PushOutcome::Pushed => Ok(LoginOutcome::PushedLocal),
                    _ => Ok(LoginOutcome::Deferred),
                }
            }
            (Some(remote), 0) => {
                self.adopt_remote(remote);
                Ok(LoginOutcome::PulledRemote)
            }
            (Some(remote), local_count) => {
                let remote_count = remote.notes.len();
                tracing::info!(local_count, remote_count, "Both sides have notes; asking the user");
                self.session.send_modify(|session| {
                    session.status = SyncStatus::Idle;
                    session.pending_first_contact = Some(FirstContact {
                        local_count,
                        remote_count,
                        remote_snapshot: remote,
                    });
                });
                Ok(LoginOutcome::FirstContact {
                    local_count,
                    remote_count,
                })
            }
        }
    }

    async fn fetch_with_retry(&self, epoch: u64) -> SyncResult<Option<Snapshot>> {
        let attempts = self.settings.max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.gateway.fetch().await {
                Ok(remote) => return Ok(remote),
                Err(error) if error.is_terminal_auth() || attempt >= attempts => return Err(error),
                Err(error) => {
                    tracing::debug!(attempt, "Remote fetch failed: {}", error);
                }
            }
            attempt += 1;
            tokio::time::sleep(self.settings.retry_delay).await;
            if !self.is_current(epoch) {
                return Ok(None);
            }
        }
    }

    /// Terminal auth failure: sign out locally and tell the user.
    fn expire_session(&self) {
        tracing::warn!("Session expired; signing out");
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cancel_debounce();
        if let Err(error) = self.tokens().clear() {
            tracing::warn!("Failed to clear stored credential: {}", error);
        }
        self.set_last_pushed(None);
        self.reconcile_pending.store(false, Ordering::SeqCst);
        self.session.send_replace(SyncSessionState {
            status: SyncStatus::Error,
            last_error: Some(SESSION_EXPIRED_MESSAGE.to_string()),
            ..SyncSessionState::default()
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(watcher) = lock(&self.watcher).take() {
            watcher.abort();
        }
        if let Some(timer) = lock(&self.debounce).timer.take() {
            timer.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::Note;
    use crate::testing::{
        credential_expiring_in, grant, new_note, token_store, FakeAuthBackend, FakeObjectStore,
    };

    struct Harness {
        backend: Arc<FakeAuthBackend>,
        remote: Arc<FakeObjectStore>,
        store: NoteStore,
        sync: SyncOrchestrator,
    }

    fn harness() -> Harness {
        let backend = Arc::new(FakeAuthBackend::default());
        let remote = Arc::new(FakeObjectStore::default());
        let store = NoteStore::default();
        let sync = SyncOrchestrator::new(
            store.clone(),
            token_store(backend.clone()),
            remote.clone(),
            SyncSettings::default(),
        );
        sync.start();
        Harness {
            backend,
            remote,
            store,
            sync,
        }
    }

    async fn advance(millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    fn remote_snapshot(count: usize, timestamp: i64) -> Snapshot {
        let notes = (1..=count)
            .map(|index| {
                serde_json::from_value::<Note>(serde_json::json!({
                    "id": format!("remote-{index}"),
                    "title": format!("Remote {index}"),
                }))
                .unwrap()
            })
            .collect();
        Snapshot::new(notes, vec!["remote search".to_string()], timestamp)
    }

    fn titles(store: &NoteStore) -> Vec<String> {
        store
            .current()
            .notes
            .into_iter()
            .map(|note| note.title)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_changes_produces_one_push_with_latest_state() {
        let h = harness();
        assert_eq!(h.sync.login(grant("access"), None).await.unwrap(), LoginOutcome::Idle);

        h.store.add_note(new_note("a"));
        advance(1_000).await;
        assert_eq!(h.sync.session().status, SyncStatus::Syncing);
        h.store.add_note(new_note("b"));
        advance(1_000).await;
        h.store.add_note(new_note("c"));
        advance(2_000).await;
        assert_eq!(h.remote.write_count(), 0);

        advance(1_000).await;
        assert_eq!(h.remote.write_count(), 1);
        let pushed = h.remote.stored_snapshot().unwrap();
        assert_eq!(pushed.notes.len(), 3);

        let session = h.sync.session();
        assert_eq!(session.status, SyncStatus::Synced);
        assert!(session.last_synced_at.is_some());
        assert!(session.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_state_makes_no_network_calls() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        let note = h.store.add_note(new_note("a"));
        advance(3_000).await;
        assert_eq!(h.remote.write_count(), 1);
        let calls = h.remote.call_count();

        let extra = h.store.add_note(new_note("b"));
        advance(100).await;
        assert_eq!(h.sync.session().status, SyncStatus::Syncing);
        h.store.delete_note(&extra.id).unwrap();
        advance(3_000).await;

        assert_eq!(h.remote.call_count(), calls);
        assert_eq!(h.sync.session().status, SyncStatus::Synced);

        assert_eq!(h.sync.retry().await, PushOutcome::Pushed);
        assert_eq!(h.remote.write_count(), 2);
        assert_eq!(h.remote.stored_snapshot().unwrap().notes[0].id, note.id);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failures_past_budget_surface_an_error() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.remote.write_failures.store(3, Ordering::SeqCst);

        h.store.add_note(new_note("a"));
        advance(10_000).await;

        let session = h.sync.session();
        assert_eq!(h.remote.write_count(), 3);
        assert_eq!(session.status, SyncStatus::Error);
        assert!(session
            .last_error
            .as_deref()
            .is_some_and(|message| message.starts_with("Sync failed")));
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_failures_past_budget_stay_syncing() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.remote.discovery_failures.store(100, Ordering::SeqCst);

        h.store.add_note(new_note("a"));
        advance(10_000).await;

        let session = h.sync.session();
        assert_eq!(h.remote.write_count(), 0);
        assert_eq!(session.status, SyncStatus::Syncing);
        assert!(session.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_then_success_recovers() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.remote.write_failures.store(1, Ordering::SeqCst);

        h.store.add_note(new_note("a"));
        advance(10_000).await;

        assert_eq!(h.remote.write_count(), 2);
        assert_eq!(h.sync.session().status, SyncStatus::Synced);
        assert!(h.sync.session().last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_token_is_refreshed_transparently() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.remote.reject_token("access");

        h.store.add_note(new_note("a"));
        advance(3_000).await;

        let session = h.sync.session();
        assert_eq!(session.status, SyncStatus::Synced);
        assert!(session.last_error.is_none());
        assert!(session.signed_in);
        assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.remote.stored_snapshot().unwrap().notes.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_signs_out_with_session_expired() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.remote.reject_token("access");
        h.backend.fail_refresh.store(true, Ordering::SeqCst);

        h.store.add_note(new_note("a"));
        advance(10_000).await;

        let session = h.sync.session();
        assert!(!session.signed_in);
        assert_eq!(session.status, SyncStatus::Error);
        assert_eq!(
            session.last_error.as_deref(),
            Some("Session expired, please sign in again")
        );
        assert!(!h.sync.tokens().is_authenticated());
        assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 1);

        h.store.add_note(new_note("b"));
        advance(10_000).await;
        assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.remote.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_contact_waits_for_the_user_then_pushes() {
        let h = harness();
        for title in ["a", "b", "c"] {
            h.store.add_note(new_note(title));
        }
        h.remote
            .seed("FivWall", "fivwall-data.json", &remote_snapshot(5, 1_000));

        let outcome = h.sync.login(grant("access"), None).await.unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::FirstContact {
                local_count: 3,
                remote_count: 5
            }
        );
        let pending = h.sync.session().pending_first_contact.unwrap();
        assert_eq!((pending.local_count, pending.remote_count), (3, 5));

        let calls = h.remote.call_count();
        h.store.add_recent_search("while waiting");
        advance(10_000).await;
        assert_eq!(h.sync.pull().await, PullOutcome::Skipped);
        assert_eq!(h.remote.call_count(), calls);
        assert_eq!(h.store.note_count(), 3);

        assert_eq!(
            h.sync.resolve_first_contact(FirstContactChoice::Push).await,
            PushOutcome::Pushed
        );
        let remote = h.remote.stored_snapshot().unwrap();
        assert_eq!(remote.notes.len(), 3);
        assert_eq!(remote.recent_searches, vec!["while waiting".to_string()]);
        assert_eq!(h.sync.session().status, SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn first_contact_pull_replaces_local_without_pushing() {
        let h = harness();
        for title in ["a", "b", "c"] {
            h.store.add_note(new_note(title));
        }
        h.remote
            .seed("FivWall", "fivwall-data.json", &remote_snapshot(5, 1_000));
        h.sync.login(grant("access"), None).await.unwrap();

        h.sync.resolve_first_contact(FirstContactChoice::Pull).await;
        advance(10_000).await;

        assert_eq!(h.store.note_count(), 5);
        assert_eq!(titles(&h.store)[0], "Remote 1");
        assert_eq!(h.remote.write_count(), 0);
        let session = h.sync.session();
        assert_eq!(session.status, SyncStatus::Synced);
        assert!(session.pending_first_contact.is_none());
        assert!(session.last_synced_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn login_adopts_remote_or_pushes_local_when_one_side_is_empty() {
        let h = harness();
        h.remote
            .seed("FivWall", "fivwall-data.json", &remote_snapshot(2, 1_000));
        assert_eq!(
            h.sync.login(grant("access"), None).await.unwrap(),
            LoginOutcome::PulledRemote
        );
        assert_eq!(h.store.note_count(), 2);
        advance(5_000).await;
        assert_eq!(h.remote.write_count(), 0);

        let h = harness();
        h.store.add_note(new_note("local"));
        assert_eq!(
            h.sync.login(grant("access"), None).await.unwrap(),
            LoginOutcome::PushedLocal
        );
        assert_eq!(h.remote.stored_snapshot().unwrap().notes[0].title, "local");
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_remote_defers_reconciliation_until_focus() {
        let h = harness();
        h.store.add_note(new_note("local"));
        h.remote.discovery_failures.store(100, Ordering::SeqCst);

        assert_eq!(
            h.sync.login(grant("access"), None).await.unwrap(),
            LoginOutcome::Deferred
        );
        h.store.add_note(new_note("more"));
        advance(10_000).await;
        assert_eq!(h.remote.write_count(), 0);

        h.remote.discovery_failures.store(0, Ordering::SeqCst);
        h.sync.on_focus(true).await;
        assert_eq!(h.remote.write_count(), 1);
        assert_eq!(h.remote.stored_snapshot().unwrap().notes.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pull_replaces_local_only_when_remote_is_not_older() {
        let h = harness();
        h.sync
            .tokens()
            .set_credential(credential_expiring_in("access", Some("refresh"), 3_600))
            .unwrap();
        h.store.add_note(new_note("local"));
        h.remote
            .seed("FivWall", "fivwall-data.json", &remote_snapshot(2, 2_000));

        assert!(h.sync.restore_session(Some(2_000)).await.unwrap());
        assert_eq!(h.store.note_count(), 2);
        assert_eq!(h.sync.session().status, SyncStatus::Synced);

        let h = harness();
        h.sync
            .tokens()
            .set_credential(credential_expiring_in("access", Some("refresh"), 3_600))
            .unwrap();
        h.store.add_note(new_note("local"));
        h.remote
            .seed("FivWall", "fivwall-data.json", &remote_snapshot(2, 1_999));

        assert!(h.sync.restore_session(Some(2_000)).await.unwrap());
        assert_eq!(titles(&h.store), vec!["local".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn pull_right_after_push_keeps_newer_local_edits() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.store.add_note(new_note("a"));
        assert_eq!(h.sync.flush().await, PushOutcome::Pushed);

        let pushed_at = h.remote.stored_snapshot().unwrap().timestamp;
        assert!(h.sync.session().last_synced_at.unwrap() > pushed_at);

        h.store.add_note(new_note("b"));
        assert_eq!(h.sync.pull().await, PullOutcome::KeptLocal);
        assert_eq!(titles(&h.store), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn change_and_pull_during_push_are_ordered_behind_it() {
        let h = harness();
        h.remote.set_write_delay(Duration::from_secs(5));
        h.sync.login(grant("access"), None).await.unwrap();

        h.store.add_note(new_note("a"));
        advance(3_000).await;
        assert_eq!(h.remote.write_count(), 1);
        assert_eq!(h.sync.session().status, SyncStatus::Syncing);

        h.store.add_note(new_note("b"));
        let pull = tokio::spawn({
            let sync = h.sync.clone();
            async move { sync.pull().await }
        });
        advance(1_000).await;
        assert!(!pull.is_finished());
        assert_eq!(h.store.note_count(), 2);

        advance(20_000).await;
        assert_eq!(pull.await.unwrap(), PullOutcome::KeptLocal);
        assert_eq!(h.remote.write_count(), 2);
        assert_eq!(h.remote.stored_snapshot().unwrap().notes.len(), 2);
        assert_eq!(titles(&h.store), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(h.sync.session().status, SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_signs_in_without_remote_calls() {
        let h = harness();
        assert!(!h.sync.resume(None).unwrap());

        h.sync
            .tokens()
            .set_credential(credential_expiring_in("access", Some("refresh"), 3_600))
            .unwrap();
        assert!(h.sync.resume(Some(1_500)).unwrap());

        let session = h.sync.session();
        assert!(session.signed_in);
        assert_eq!(session.last_synced_at, Some(1_500));
        assert_eq!(h.remote.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_pull_restores_previous_status() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.store.add_note(new_note("a"));
        advance(3_000).await;
        assert_eq!(h.sync.session().status, SyncStatus::Synced);

        h.remote.discovery_failures.store(1, Ordering::SeqCst);
        assert_eq!(h.sync.pull().await, PullOutcome::Failed);
        assert_eq!(h.sync.session().status, SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_cancels_pending_push() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.store.add_note(new_note("a"));
        advance(1_000).await;
        assert_eq!(h.sync.session().status, SyncStatus::Syncing);

        h.sync.logout().await;
        advance(10_000).await;

        assert_eq!(h.remote.write_count(), 0);
        assert_eq!(h.sync.session(), SyncSessionState::default());
        assert!(!h.sync.tokens().is_authenticated());
        assert_eq!(h.backend.revoke_calls.load(Ordering::SeqCst), 1);

        h.sync.logout().await;
        assert_eq!(h.backend.revoke_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_abandons_retry_loop() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.remote.write_failures.store(1, Ordering::SeqCst);
        h.store.add_note(new_note("a"));
        advance(3_000).await;
        assert_eq!(h.remote.write_count(), 1);

        h.sync.logout().await;
        advance(10_000).await;
        assert_eq!(h.remote.write_count(), 1);
        assert_eq!(h.sync.session().status, SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_the_pending_push_immediately() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.store.add_note(new_note("a"));
        advance(100).await;

        assert_eq!(h.sync.flush().await, PushOutcome::Pushed);
        assert_eq!(h.remote.write_count(), 1);
        advance(5_000).await;
        assert_eq!(h.remote.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_pushes_changes_the_watcher_has_not_seen() {
        let h = harness();
        h.sync.login(grant("access"), None).await.unwrap();
        h.sync.shutdown();
        h.store.add_note(new_note("a"));

        assert_eq!(h.sync.flush().await, PushOutcome::Pushed);
        assert_eq!(h.remote.stored_snapshot().unwrap().notes.len(), 1);
        assert_eq!(h.sync.flush().await, PushOutcome::Skipped);
    }
}
