//! OAuth credential held by the token store.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Signed-in account details shown in the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Access credential for the remote object store.
///
/// A credential without a refresh token cannot be renewed; its expiry is
/// terminal for the session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token expiry (Unix ms)
    pub expires_at: i64,
    #[serde(default)]
    pub profile: Option<Profile>,
}

impl Credential {
    /// Build a credential from a fresh authorization-code exchange.
    #[must_use]
    pub fn from_grant(grant: TokenGrant, profile: Option<Profile>, now_ms: i64) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: expiry_from(now_ms, grant.expires_in),
            profile,
        }
    }

    /// Copy of this credential carrying a refreshed access token.
    #[must_use]
    pub fn with_refreshed(&self, refreshed: RefreshedToken, now_ms: i64) -> Self {
        Self {
            access_token: refreshed.access_token,
            refresh_token: self.refresh_token.clone(),
            expires_at: expiry_from(now_ms, refreshed.expires_in),
            profile: self.profile.clone(),
        }
    }

    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }

    /// Whether the access token expires within `lookahead` of `now_ms`.
    #[must_use]
    pub fn expires_within(&self, lookahead: Duration, now_ms: i64) -> bool {
        let lookahead_ms = i64::try_from(lookahead.as_millis()).unwrap_or(i64::MAX);
        self.expires_at <= now_ms.saturating_add(lookahead_ms)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("profile", &self.profile)
            .finish()
    }
}

/// Result of exchanging an authorization code.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Result of exchanging a refresh token.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Lifetime of the access token in seconds
    pub expires_in: i64,
}

impl fmt::Debug for RefreshedToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RefreshedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

fn expiry_from(now_ms: i64, expires_in_secs: i64) -> i64 {
    now_ms.saturating_add(expires_in_secs.saturating_mul(1_000))
}
