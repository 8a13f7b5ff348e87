//! Client configuration.
//!
//! `ClientConfig` locates the authorization backend and the remote object
//! store; `SyncSettings` holds the sync engine's timing and naming knobs.
//! Both resolve from a lookup function so they can be fed from the process
//! environment or from tests.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_AUTH_BACKEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";
pub const DEFAULT_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
pub const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

pub const DEFAULT_CONTAINER_NAME: &str = "FivWall";
pub const DEFAULT_OBJECT_NAME: &str = "fivwall-data.json";

const DEFAULT_DEBOUNCE_MS: u64 = 2_500;
const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_REFRESH_LOOKAHEAD_SECS: u64 = 5 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientConfigError {
    #[error("Invalid client configuration: {0}")]
    Invalid(String),
}

/// Endpoints used by the sync client.
///
/// These are public URLs only. The OAuth client secret lives in the
/// authorization backend and must never be stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub auth_backend_url: String,
    pub drive_api_url: String,
    pub drive_upload_url: String,
    pub revoke_url: String,
    pub userinfo_url: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_backend_url: DEFAULT_AUTH_BACKEND_URL.to_string(),
            drive_api_url: DEFAULT_DRIVE_API_URL.to_string(),
            drive_upload_url: DEFAULT_DRIVE_UPLOAD_URL.to_string(),
            revoke_url: DEFAULT_REVOKE_URL.to_string(),
            userinfo_url: DEFAULT_USERINFO_URL.to_string(),
            redirect_uri: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ClientConfigError> {
        let values: HashMap<String, String> = std::env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientConfigError> {
        let config = Self {
            auth_backend_url: url_or_default(&lookup, "FIVWALL_AUTH_URL", DEFAULT_AUTH_BACKEND_URL)?,
            drive_api_url: url_or_default(&lookup, "FIVWALL_DRIVE_API_URL", DEFAULT_DRIVE_API_URL)?,
            drive_upload_url: url_or_default(
                &lookup,
                "FIVWALL_DRIVE_UPLOAD_URL",
                DEFAULT_DRIVE_UPLOAD_URL,
            )?,
            revoke_url: url_or_default(&lookup, "FIVWALL_REVOKE_URL", DEFAULT_REVOKE_URL)?,
            userinfo_url: url_or_default(&lookup, "FIVWALL_USERINFO_URL", DEFAULT_USERINFO_URL)?,
            redirect_uri: normalize_text_option(lookup("FIVWALL_REDIRECT_URI")),
        };
        config.validate()?;
        Ok(config)
    }

    /// Overlay non-empty values, e.g. from a stored CLI profile.
    #[must_use]
    pub fn with_overrides(
        mut self,
        auth_backend_url: Option<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        if let Some(url) = normalize_text_option(auth_backend_url) {
            self.auth_backend_url = url.trim_end_matches('/').to_string();
        }
        if let Some(uri) = normalize_text_option(redirect_uri) {
            self.redirect_uri = Some(uri);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ClientConfigError> {
        for (field, value) in [
            ("auth_backend_url", &self.auth_backend_url),
            ("drive_api_url", &self.drive_api_url),
            ("drive_upload_url", &self.drive_upload_url),
            ("revoke_url", &self.revoke_url),
            ("userinfo_url", &self.userinfo_url),
        ] {
            if !is_http_url(value) {
                return Err(ClientConfigError::Invalid(format!(
                    "{field} must start with http:// or https://"
                )));
            }
        }
        Ok(())
    }
}

/// Timing and naming parameters of the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Trailing-edge debounce between a local change and the push
    pub debounce: Duration,
    /// Fixed delay between push attempts
    pub retry_delay: Duration,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Refresh the access token when it expires within this window
    pub refresh_lookahead: Duration,
    /// Remote folder holding the snapshot
    pub container_name: String,
    /// Remote file name of the snapshot
    pub object_name: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            refresh_lookahead: Duration::from_secs(DEFAULT_REFRESH_LOOKAHEAD_SECS),
            container_name: DEFAULT_CONTAINER_NAME.to_string(),
            object_name: DEFAULT_OBJECT_NAME.to_string(),
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Result<Self, ClientConfigError> {
        let values: HashMap<String, String> = std::env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientConfigError> {
        let debounce_ms = parse_in_range(
            &lookup,
            "FIVWALL_SYNC_DEBOUNCE_MS",
            DEFAULT_DEBOUNCE_MS,
            100..=60_000,
        )?;
        let retry_delay_ms = parse_in_range(
            &lookup,
            "FIVWALL_SYNC_RETRY_DELAY_MS",
            DEFAULT_RETRY_DELAY_MS,
            0..=60_000,
        )?;
        let max_retries = parse_in_range(
            &lookup,
            "FIVWALL_SYNC_MAX_RETRIES",
            u64::from(DEFAULT_MAX_RETRIES),
            0..=10,
        )?;

        Ok(Self {
            debounce: Duration::from_millis(debounce_ms),
            retry_delay: Duration::from_millis(retry_delay_ms),
            max_retries: u32::try_from(max_retries).unwrap_or(DEFAULT_MAX_RETRIES),
            ..Self::default()
        })
    }
}

fn url_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> Result<String, ClientConfigError> {
    let value = normalize_text_option(lookup(name)).unwrap_or_else(|| default.to_string());
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(ClientConfigError::Invalid(format!(
            "{name} must start with http:// or https://"
        )))
    }
}

fn parse_in_range(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64, ClientConfigError> {
    let Some(raw) = normalize_text_option(lookup(name)) else {
        return Ok(default);
    };
    let invalid = || {
        ClientConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let value = raw.parse::<u64>().map_err(|_| invalid())?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid())
    }
}
