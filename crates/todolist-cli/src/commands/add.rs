use std::path::Path;

use todolist_core::NewEntry;

use crate::commands::common::{normalize_title, open_list};
use crate::error::CliError;

pub fn run_add(title_parts: &[String], notes: Option<String>, db_path: &Path) -> Result<(), CliError> {
    let title = normalize_title(title_parts).ok_or(CliError::EmptyTitle)?;

    let mut entry = NewEntry::titled(title);
    if let Some(notes) = notes {
        entry = entry.with_notes(notes.trim());
    }
    let created = open_list(db_path)?.add(entry)?;

    println!("{}", created.id);
    Ok(())
}
