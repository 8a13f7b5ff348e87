//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fivwall_core::config::{ClientConfig, ClientConfigError};
use fivwall_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "cli-config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

const fn default_config_version() -> u32 {
    1
}

#[derive(Debug, Error)]
pub enum ProfileConfigError {
    #[error("Failed to resolve CLI config directory")]
    NoConfigDir,
    #[error("Failed to access config at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
}

pub fn default_config_path() -> Result<PathBuf, ProfileConfigError> {
    let dir = dirs::config_dir().ok_or(ProfileConfigError::NoConfigDir)?;
    Ok(dir.join("fivwall").join(CONFIG_FILE_NAME))
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(str::to_string))
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, ProfileConfigError> {
        Self::load_from_path(&default_config_path()?)
    }

    /// A missing file is an empty config.
    pub fn load_from_path(path: &Path) -> Result<Self, ProfileConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ProfileConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut config: Self =
            serde_json::from_str(&raw).map_err(|source| ProfileConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ProfileConfigError> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ProfileConfigError> {
        let mut normalized = self.clone();
        normalized.normalize();
        let serialized =
            serde_json::to_string_pretty(&normalized).map_err(ProfileConfigError::Serialize)?;

        let io_error = |source| ProfileConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, serialized).map_err(io_error)?;
        fs::rename(&temp_path, path).map_err(io_error)
    }

    /// Explicit name, then `FIVWALL_PROFILE`, then the active profile, then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(std::env::var("FIVWALL_PROFILE").ok().as_deref()))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Client endpoints from the environment with this profile's values on top.
    pub fn client_config(&self) -> Result<ClientConfig, ClientConfigError> {
        let config = ClientConfig::from_env()?
            .with_overrides(self.auth_url.clone(), self.redirect_uri.clone());
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.auth_url = normalize_text_option(self.auth_url.clone())
            .map(|url| url.trim_end_matches('/').to_string());
        self.redirect_uri = normalize_text_option(self.redirect_uri.clone());
        self.google_client_id = normalize_text_option(self.google_client_id.clone());
        self.state_path = self
            .state_path
            .take()
            .filter(|path| !path.as_os_str().is_empty());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
        assert_eq!(normalize_profile_name(Some(" work ")), Some("work".to_string()));
    }

    #[test]
    fn config_roundtrip_normalizes_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some(" default ".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "default".to_string(),
            CliProfile {
                auth_url: Some(" https://fivwall.example.com/ ".to_string()),
                redirect_uri: Some("  ".to_string()),
                google_client_id: Some(" client.apps.googleusercontent.com ".to_string()),
                state_path: None,
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.active_profile.as_deref(), Some("default"));
        assert_eq!(
            loaded.profile("default").unwrap(),
            &CliProfile {
                auth_url: Some("https://fivwall.example.com".to_string()),
                redirect_uri: None,
                google_client_id: Some("client.apps.googleusercontent.com".to_string()),
                state_path: None,
            }
        );
    }

    #[test]
    fn malformed_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let error = CliProfilesConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(error, ProfileConfigError::Parse { .. }));
        assert!(error.to_string().contains(CONFIG_FILE_NAME));
    }

    #[test]
    fn missing_config_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliProfilesConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("work".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(config.resolve_profile_name(Some("laptop")), "laptop");
        assert_eq!(config.resolve_profile_name(None), "work");
    }

    #[test]
    fn profile_overrides_client_endpoints() {
        let profile = CliProfile {
            auth_url: Some("https://fivwall.example.com".to_string()),
            ..CliProfile::default()
        };
        let config = profile.client_config().unwrap();
        assert_eq!(config.auth_backend_url, "https://fivwall.example.com");
    }
}
