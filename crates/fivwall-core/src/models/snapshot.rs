//! Sync snapshot: the whole-wall unit of synchronization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Note;

/// Payload format version written by this client.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Whole-wall state as transferred to and from remote storage.
///
/// Always transferred whole; there is no field-level diffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    /// Creation time of this snapshot (Unix ms)
    pub timestamp: i64,
    pub notes: Vec<Note>,
    pub recent_searches: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintBody<'a> {
    notes: &'a [Note],
    recent_searches: &'a [String],
}

/// Canonical serialization of the synchronized fields.
///
/// Two states with the same fingerprint are identical for sync purposes.
pub fn fingerprint(notes: &[Note], recent_searches: &[String]) -> String {
    serde_json::to_string(&FingerprintBody {
        notes,
        recent_searches,
    })
    .unwrap_or_default()
}

impl Snapshot {
    #[must_use]
    pub const fn new(notes: Vec<Note>, recent_searches: Vec<String>, timestamp: i64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            timestamp,
            notes,
            recent_searches,
        }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.notes, &self.recent_searches)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse a payload downloaded from remote storage.
    ///
    /// Returns `None` when the payload has no usable `notes` array; such a
    /// payload counts as "no remote data", never as an error. Missing
    /// `version`/`timestamp`/`recentSearches` fall back to defaults.
    pub fn from_remote_bytes(bytes: &[u8], now_ms: i64) -> Option<Self> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let object = value.as_object()?;
        let raw_notes = object.get("notes")?.as_array()?;
        let notes: Vec<Note> = serde_json::from_value(Value::Array(raw_notes.clone())).ok()?;

        let version = object
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|version| u32::try_from(version).ok())
            .unwrap_or(SNAPSHOT_VERSION);
        let timestamp = object
            .get("timestamp")
            .and_then(json_millis)
            .unwrap_or(now_ms);
        let recent_searches = object
            .get("recentSearches")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            version,
            timestamp,
            notes,
            recent_searches,
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn json_millis(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|millis| millis as i64))
}

/// Discovered identity of the snapshot's remote home.
///
/// `object_id == None` means "create on next write", not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub container_id: String,
    pub object_id: Option<String>,
}
