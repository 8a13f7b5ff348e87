use std::future::Future;
use std::sync::Arc;

use super::{SyncError, SyncResult};
use crate::auth::{AuthError, TokenStore};
use crate::config::SyncSettings;
use crate::drive::{RemoteError, RemoteObjectStore, RemoteResult};
use crate::models::{RemoteLocation, Snapshot};
use crate::util::unix_millis_now;

/// Authenticated access to the remote snapshot.
///
/// Discovery (`prepare`, `fetch`) and the authoritative write (`commit`)
/// report failures as different [`SyncError`] variants so callers can treat
/// them differently.
pub struct RemoteGateway {
    tokens: Arc<TokenStore>,
    remote: Arc<dyn RemoteObjectStore>,
    container_name: String,
    object_name: String,
}

impl RemoteGateway {
    pub fn new(
        tokens: Arc<TokenStore>,
        remote: Arc<dyn RemoteObjectStore>,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            tokens,
            remote,
            container_name: settings.container_name.clone(),
            object_name: settings.object_name.clone(),
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Locate the snapshot's container and object without writing it.
    pub async fn prepare(&self) -> SyncResult<RemoteLocation> {
        let container_id = self
            .authorized(SyncError::Discovery, {
                let name = self.container_name.clone();
                move |remote, token| {
                    let name = name.clone();
                    async move { remote.find_or_create_container(&token, &name).await }
                }
            })
            .await?;

        let object_id = self
            .authorized(SyncError::Discovery, {
                let container_id = container_id.clone();
                let name = self.object_name.clone();
                move |remote, token| {
                    let container_id = container_id.clone();
                    let name = name.clone();
                    async move { remote.find_object(&token, &container_id, &name).await }
                }
            })
            .await?;

        Ok(RemoteLocation {
            container_id,
            object_id,
        })
    }

    /// Write `snapshot`, updating in place when the object already exists.
    pub async fn commit(&self, location: &RemoteLocation, snapshot: &Snapshot) -> SyncResult<String> {
        let bytes = snapshot.to_bytes()?;
        let object_id = self
            .authorized(SyncError::Write, {
                let container_id = location.container_id.clone();
                let object_id = location.object_id.clone();
                let name = self.object_name.clone();
                move |remote, token| {
                    let container_id = container_id.clone();
                    let object_id = object_id.clone();
                    let name = name.clone();
                    let bytes = bytes.clone();
                    async move {
                        remote
                            .write_object(&token, &container_id, object_id.as_deref(), &name, bytes)
                            .await
                    }
                }
            })
            .await?;
        tracing::debug!(object_id = %object_id, notes = snapshot.notes.len(), "Committed snapshot");
        Ok(object_id)
    }

    /// Download the remote snapshot.
    ///
    /// `None` when nothing has been synced yet or the payload is unusable.
    pub async fn fetch(&self) -> SyncResult<Option<Snapshot>> {
        let location = self.prepare().await?;
        let Some(object_id) = location.object_id else {
            return Ok(None);
        };

        let bytes = self
            .authorized(SyncError::Discovery, move |remote, token| {
                let object_id = object_id.clone();
                async move { remote.read_object(&token, &object_id).await }
            })
            .await?;

        let snapshot = bytes.and_then(|bytes| Snapshot::from_remote_bytes(&bytes, unix_millis_now()));
        if snapshot.is_none() {
            tracing::warn!("Remote snapshot missing or unreadable; treating as no remote data");
        }
        Ok(snapshot)
    }

    /// Run `call` with a fresh token; on 401 refresh once and retry once.
    async fn authorized<T, F, Fut>(
        &self,
        classify: fn(RemoteError) -> SyncError,
        call: F,
    ) -> SyncResult<T>
    where
        F: Fn(Arc<dyn RemoteObjectStore>, String) -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let token = self.tokens.ensure_fresh().await?;
        match call(self.remote.clone(), token.clone()).await {
            Err(RemoteError::Unauthorized) => {}
            other => return other.map_err(classify),
        }

        tracing::debug!("Access token rejected; refreshing once");
        let token = self.tokens.refresh_after_rejection(&token).await?;
        match call(self.remote.clone(), token).await {
            Err(RemoteError::Unauthorized) => {
                tracing::warn!("Access token rejected after refresh");
                if let Err(error) = self.tokens.clear() {
                    tracing::warn!("Failed to clear stored credential: {}", error);
                }
                Err(SyncError::Auth(AuthError::SessionExpired))
            }
            other => other.map_err(classify),
        }
    }
}
