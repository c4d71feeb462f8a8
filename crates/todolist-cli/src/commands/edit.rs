use std::path::Path;

use todolist_core::EntryChanges;

use crate::commands::common::{find_entry, open_list, parse_entry_id};
use crate::error::CliError;

pub fn run_edit(
    id: &str,
    title: Option<String>,
    notes: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let id = parse_entry_id(id)?;
    let title = match title {
        Some(title) => {
            let trimmed = title.trim().to_string();
            if trimmed.is_empty() {
                return Err(CliError::EmptyTitle);
            }
            Some(trimmed)
        }
        None => None,
    };
    let changes = EntryChanges {
        title,
        notes,
        complete: None,
    };
    if changes.is_empty() {
        return Err(CliError::NothingToEdit);
    }

    let list = open_list(db_path)?;
    let entry = find_entry(&list, id)?;
    if changes.title.as_ref().map_or(true, |title| *title == entry.title)
        && changes.notes.as_ref().map_or(true, |notes| *notes == entry.notes)
    {
        println!("{}", entry.id);
        return Ok(());
    }

    let updated = list.update(id, &changes)?;
    println!("{}", updated.id);
    Ok(())
}
