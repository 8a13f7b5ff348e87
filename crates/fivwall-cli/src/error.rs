use std::io;

use fivwall_core::auth::AuthError;
use fivwall_core::config::ClientConfigError;
use fivwall_core::drive::RemoteError;
use fivwall_core::sync::SyncError;
use thiserror::Error;

use crate::config_profiles::ProfileConfigError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fivwall_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("Remote storage error: {0}")]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    ClientConfig(#[from] ClientConfigError),
    #[error(transparent)]
    Profiles(#[from] ProfileConfigError),
    #[error("No note title or content provided")]
    EmptyNote,
    #[error("Nothing to edit; pass --title, --content, --color, --tag, --x, --y or --front")]
    NothingToEdit,
    #[error("Nothing cleared; pass --yes to confirm without a prompt")]
    ClearNotConfirmed,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("The wall already has {0} notes; pass --mode replace or --mode append")]
    ImportModeRequired(usize),
    #[error("{0}")]
    SyncFailed(String),
    #[error("Not signed in. Run `fivwall auth login` first.")]
    NotSignedIn,
    #[error(
        "This device has {local} notes and Google Drive has {remote}; signed out again. Rerun `fivwall auth login --prefer push|pull`."
    )]
    FirstContactUnresolved { local: usize, remote: usize },
    #[error("Could not read the Google Drive copy; signed out again without changing anything. Try again later.")]
    ReconcileDeferred,
}
