//! Cloud sync engine.
//!
//! Local changes flow from the [`NoteStore`](crate::NoteStore) through the
//! [`SyncOrchestrator`], which debounces them and pushes whole snapshots via
//! the [`RemoteGateway`]. Pulls run on login, session restore and focus.

mod gateway;
mod orchestrator;
mod status;

use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::drive::RemoteError;
use crate::models::{Profile, Snapshot};

pub use gateway::RemoteGateway;
pub use orchestrator::{LoginOutcome, PullOutcome, PushOutcome, SyncOrchestrator};
pub use status::{format_last_synced, StatusProjection, SyncStatusView};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Read-only discovery failed; transient and retried silently.
    #[error("Remote discovery failed: {0}")]
    Discovery(RemoteError),
    /// The authoritative write failed.
    #[error("Sync failed: {0}")]
    Write(RemoteError),
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SyncError {
    #[must_use]
    pub const fn is_terminal_auth(&self) -> bool {
        matches!(self, Self::Auth(error) if error.is_terminal())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Synced,
    Error,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

/// Both sides hold notes right after sign-in; the user picks a direction.
#[derive(Debug, Clone, PartialEq)]
pub struct FirstContact {
    pub local_count: usize,
    pub remote_count: usize,
    pub remote_snapshot: Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstContactChoice {
    /// Overwrite the remote copy with the local notes
    Push,
    /// Replace the local notes with the remote copy
    Pull,
}

/// Observable state of the sync session.
///
/// `status == Error` always carries a `last_error`; entering `Syncing`
/// clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSessionState {
    pub signed_in: bool,
    pub profile: Option<Profile>,
    pub status: SyncStatus,
    pub last_synced_at: Option<i64>,
    pub last_error: Option<String>,
    pub pending_first_contact: Option<FirstContact>,
}
