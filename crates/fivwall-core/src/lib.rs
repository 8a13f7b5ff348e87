//! fivwall-core - Core library for FivWall
//!
//! This crate contains the note models, the local note store, and the cloud
//! sync engine (token store, remote data gateway, sync orchestrator) shared by
//! the FivWall clients.

pub mod auth;
pub mod config;
pub mod drive;
pub mod error;
pub mod models;
pub mod state;
pub mod sync;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use models::{Note, NoteId, Snapshot};
pub use state::NoteStore;
