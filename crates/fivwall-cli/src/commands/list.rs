use crate::commands::common::{
    filter_notes, format_note_lines, load_local_state, note_to_list_item, NoteListItem,
};
use crate::error::CliError;
use crate::session::ResolvedProfile;

pub fn run_list(
    limit: usize,
    tag: Option<&str>,
    query: Option<&str>,
    as_json: bool,
    resolved: &ResolvedProfile,
) -> Result<(), CliError> {
    let file = load_local_state(resolved)?;
    let notes = filter_notes(&file.state, tag, query, limit);

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if notes.is_empty() {
        println!("No notes on the wall.");
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}
