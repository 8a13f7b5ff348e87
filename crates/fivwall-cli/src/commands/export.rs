use std::path::Path;

use fivwall_core::NoteStore;

use crate::commands::common::load_local_state;
use crate::error::CliError;
use crate::session::ResolvedProfile;

pub fn run_export(output_path: Option<&Path>, resolved: &ResolvedProfile) -> Result<(), CliError> {
    let file = load_local_state(resolved)?;
    let rendered = NoteStore::new(file.state).export_json()?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
