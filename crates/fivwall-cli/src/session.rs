//! Per-invocation wiring of the local state file and the sync engine.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fivwall_core::auth::{CredentialPersistence, HttpAuthBackend, TokenStore};
use fivwall_core::config::SyncSettings;
use fivwall_core::drive::{GoogleDriveStore, RemoteObjectStore};
use fivwall_core::models::Credential;
use fivwall_core::state::StateFile;
use fivwall_core::sync::{SyncOrchestrator, SyncSessionState};
use fivwall_core::NoteStore;

use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::credentials::KeyringCredentialStore;
use crate::error::CliError;

const STATE_FILE_NAME: &str = "fivwall-state.json";

/// Global flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct CliContext {
    pub profile: Option<String>,
    pub state_path: Option<PathBuf>,
}

/// Profile selected for this invocation.
#[derive(Debug, Clone)]
pub struct ResolvedProfile {
    pub name: String,
    pub profile: CliProfile,
    pub state_path: PathBuf,
}

impl CliContext {
    pub fn resolve(&self) -> Result<ResolvedProfile, CliError> {
        let config = CliProfilesConfig::load()?;
        let name = config.resolve_profile_name(self.profile.as_deref());
        let profile = config.profile(&name).cloned().unwrap_or_default();
        let state_path = resolve_state_path(self.state_path.clone(), profile.state_path.clone())?;
        Ok(ResolvedProfile {
            name,
            profile,
            state_path,
        })
    }
}

impl ResolvedProfile {
    pub fn credential_store(&self) -> KeyringCredentialStore {
        KeyringCredentialStore::new(&self.name)
    }

    /// Stored credential, read without touching the network.
    pub fn stored_credential(&self) -> Result<Option<Credential>, CliError> {
        Ok(self.credential_store().load_credential()?)
    }
}

/// `--state-path`, then `FIVWALL_STATE_PATH`, then the profile, then the data dir.
pub fn resolve_state_path(
    cli_state_path: Option<PathBuf>,
    profile_state_path: Option<PathBuf>,
) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_state_path
        .or_else(|| env::var_os("FIVWALL_STATE_PATH").map(PathBuf::from))
        .or(profile_state_path)
    {
        return Ok(path);
    }
    default_state_path()
}

pub fn default_state_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("fivwall").join(STATE_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// The wall loaded from disk plus the sync engine driving it.
///
/// Call [`WallSession::finish`] before exiting so pending pushes are flushed
/// and the state file is written back.
pub struct WallSession {
    state_path: PathBuf,
    loaded_last_synced_at: Option<i64>,
    sync: SyncOrchestrator,
    signed_out: bool,
}

impl WallSession {
    pub fn open(resolved: &ResolvedProfile) -> Result<Self, CliError> {
        let client_config = resolved.profile.client_config()?;
        let settings = SyncSettings::from_env()?;
        let tokens = Arc::new(TokenStore::new(
            Arc::new(HttpAuthBackend::new(&client_config)?),
            Arc::new(resolved.credential_store()),
            settings.refresh_lookahead,
        ));
        let remote = Arc::new(GoogleDriveStore::new(&client_config)?);
        let file = StateFile::load_from_path(&resolved.state_path)?;
        Ok(Self::from_parts(
            resolved.state_path.clone(),
            file,
            tokens,
            remote,
            settings,
        ))
    }

    pub fn from_parts(
        state_path: PathBuf,
        file: StateFile,
        tokens: Arc<TokenStore>,
        remote: Arc<dyn RemoteObjectStore>,
        settings: SyncSettings,
    ) -> Self {
        let sync = SyncOrchestrator::new(NoteStore::new(file.state), tokens, remote, settings);
        sync.start();
        Self {
            state_path,
            loaded_last_synced_at: file.last_synced_at,
            sync,
            signed_out: false,
        }
    }

    /// Resume a stored sign-in and pull. Returns whether one was resumed.
    pub async fn restore(&self) -> bool {
        match self.sync.restore_session(self.loaded_last_synced_at).await {
            Ok(restored) => restored,
            Err(error) => {
                tracing::warn!("Could not restore sync session: {}", error);
                false
            }
        }
    }

    /// Resume a stored sign-in without contacting the remote.
    pub fn resume(&self) -> bool {
        match self.sync.resume(self.loaded_last_synced_at) {
            Ok(resumed) => resumed,
            Err(error) => {
                tracing::warn!("Could not resume sync session: {}", error);
                false
            }
        }
    }

    pub fn store(&self) -> &NoteStore {
        self.sync.store()
    }

    pub const fn sync(&self) -> &SyncOrchestrator {
        &self.sync
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub async fn logout(&mut self) {
        self.sync.logout().await;
        self.signed_out = true;
    }

    /// Flush pending pushes, stop background work and write the state file.
    pub async fn finish(self) -> Result<SyncSessionState, CliError> {
        if self.sync.session().signed_in {
            self.sync.flush().await;
        }
        self.sync.shutdown();

        let session = self.sync.session();
        let last_synced_at = if session.signed_in {
            session.last_synced_at
        } else if self.signed_out {
            None
        } else {
            self.loaded_last_synced_at
        };
        StateFile {
            state: self.sync.store().current(),
            last_synced_at,
        }
        .save_to_path(&self.state_path)?;
        Ok(session)
    }
}
