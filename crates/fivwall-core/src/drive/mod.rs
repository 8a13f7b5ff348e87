//! Remote object storage for the sync snapshot.

mod google;

use async_trait::async_trait;
use thiserror::Error;

pub use google::GoogleDriveStore;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The access token was rejected (HTTP 401).
    #[error("Remote storage rejected the access token")]
    Unauthorized,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote storage error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected remote storage response: {0}")]
    InvalidResponse(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Folder/file style object store holding one snapshot object per account.
///
/// The bearer token is passed per call; token lifetime is the caller's
/// concern.
#[async_trait]
pub trait RemoteObjectStore: Send + Sync {
    /// Id of the container called `name`, created when missing.
    async fn find_or_create_container(&self, token: &str, name: &str) -> RemoteResult<String>;

    async fn find_object(
        &self,
        token: &str,
        container_id: &str,
        name: &str,
    ) -> RemoteResult<Option<String>>;

    /// Object body, or `None` when the object no longer exists.
    async fn read_object(&self, token: &str, object_id: &str) -> RemoteResult<Option<Vec<u8>>>;

    /// Overwrite `object_id`, or create the object when it is `None`.
    /// Returns the id of the written object.
    async fn write_object(
        &self,
        token: &str,
        container_id: &str,
        object_id: Option<&str>,
        name: &str,
        bytes: Vec<u8>,
    ) -> RemoteResult<String>;
}
