//! Data models for FivWall

mod credential;
mod note;
mod snapshot;

pub use credential::{Credential, Profile, RefreshedToken, TokenGrant};
pub use note::{NewNote, Note, NoteId, NoteUpdate};
pub use snapshot::{fingerprint, RemoteLocation, Snapshot, SNAPSHOT_VERSION};
