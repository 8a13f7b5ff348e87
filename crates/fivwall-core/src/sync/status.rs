use chrono::DateTime;
use serde::Serialize;

use super::{PushOutcome, SyncOrchestrator, SyncSessionState, SyncStatus};

/// Read-only view of the sync session for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusView {
    pub signed_in: bool,
    pub email: Option<String>,
    pub status: SyncStatus,
    pub last_synced_at: Option<i64>,
    pub last_error: Option<String>,
    /// `(local, remote)` note counts while a first-contact choice is pending
    pub first_contact: Option<(usize, usize)>,
}

impl From<&SyncSessionState> for SyncStatusView {
    fn from(session: &SyncSessionState) -> Self {
        Self {
            signed_in: session.signed_in,
            email: session
                .profile
                .as_ref()
                .and_then(|profile| profile.email.clone()),
            status: session.status,
            last_synced_at: session.last_synced_at,
            last_error: session.last_error.clone(),
            first_contact: session
                .pending_first_contact
                .as_ref()
                .map(|pending| (pending.local_count, pending.remote_count)),
        }
    }
}

impl SyncStatusView {
    /// One-line description of the status at `now_ms`.
    pub fn label(&self, now_ms: i64) -> String {
        match self.status {
            SyncStatus::Syncing => "Syncing...".to_string(),
            SyncStatus::Synced => match self.last_synced_at {
                Some(timestamp) => {
                    format!("Last synced {}", format_last_synced(timestamp, now_ms))
                }
                None => "Synced".to_string(),
            },
            SyncStatus::Error => self
                .last_error
                .clone()
                .unwrap_or_else(|| "Sync failed".to_string()),
            SyncStatus::Idle if self.signed_in => "Not synced yet".to_string(),
            SyncStatus::Idle => "Not signed in".to_string(),
        }
    }
}

/// Human-readable time since the last sync.
pub fn format_last_synced(timestamp_ms: i64, now_ms: i64) -> String {
    let elapsed_ms = now_ms.saturating_sub(timestamp_ms).max(0);
    let minutes = elapsed_ms / 60_000;
    if minutes < 1 {
        let seconds = elapsed_ms / 1_000;
        return if seconds <= 10 {
            "just now".to_string()
        } else {
            format!("{seconds}s ago")
        };
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }

    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || "a while ago".to_string(),
        |time| time.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}

/// Status view plus the manual retry affordance.
#[derive(Clone)]
pub struct StatusProjection {
    orchestrator: SyncOrchestrator,
}

impl StatusProjection {
    #[must_use]
    pub const fn new(orchestrator: SyncOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn view(&self) -> SyncStatusView {
        SyncStatusView::from(&self.orchestrator.session())
    }

    /// Push now, bypassing the unchanged-state short-circuit.
    pub async fn retry(&self) -> PushOutcome {
        self.orchestrator.retry().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Profile;

    #[test]
    fn format_last_synced_buckets() {
        let now = 100_000_000;
        assert_eq!(format_last_synced(now - 10_000, now), "just now");
        assert_eq!(format_last_synced(now - 11_000, now), "11s ago");
        assert_eq!(format_last_synced(now - 59_999, now), "59s ago");
        assert_eq!(format_last_synced(now - 120_000, now), "2m ago");
        assert_eq!(format_last_synced(now - 3 * 3_600_000, now), "3h ago");
        assert_eq!(format_last_synced(now + 5_000, now), "just now");
    }

    #[test]
    fn format_last_synced_falls_back_to_date() {
        let timestamp = 1_700_000_000_000;
        let now = timestamp + 2 * 86_400_000;
        assert_eq!(format_last_synced(timestamp, now), "2023-11-14 22:13 UTC");
    }

    #[test]
    fn label_reflects_status() {
        let mut session = SyncSessionState {
            signed_in: true,
            profile: Some(Profile {
                email: Some("user@example.com".to_string()),
                ..Profile::default()
            }),
            ..SyncSessionState::default()
        };
        assert_eq!(SyncStatusView::from(&session).label(0), "Not synced yet");

        session.status = SyncStatus::Syncing;
        assert_eq!(SyncStatusView::from(&session).label(0), "Syncing...");

        session.status = SyncStatus::Synced;
        session.last_synced_at = Some(0);
        assert_eq!(
            SyncStatusView::from(&session).label(120_000),
            "Last synced 2m ago"
        );

        session.status = SyncStatus::Error;
        session.last_error = Some("Sync failed: quota".to_string());
        let view = SyncStatusView::from(&session);
        assert_eq!(view.label(0), "Sync failed: quota");
        assert_eq!(view.email.as_deref(), Some("user@example.com"));
    }
}
