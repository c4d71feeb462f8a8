use std::path::Path;

use todolist_core::Entry;

use crate::commands::common::{
    entry_to_list_item, find_entry, format_timestamp, open_list, parse_entry_id,
};
use crate::error::CliError;

pub fn run_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let id = parse_entry_id(id)?;
    let entry = find_entry(&open_list(db_path)?, id)?;

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&entry_to_list_item(&entry))?
        );
    } else {
        for line in format_entry_details(&entry) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_entry_details(entry: &Entry) -> Vec<String> {
    let mut lines = vec![
        format!("ID:        {}", entry.id),
        format!("Title:     {}", entry.title),
        format!(
            "Status:    {}",
            if entry.complete { "complete" } else { "open" }
        ),
        format!("Created:   {}", format_timestamp(entry.created)),
        format!("Modified:  {}", format_timestamp(entry.modified)),
        format!(
            "Sync:      {}",
            match (entry.remote_id, entry.is_dirty()) {
                (None, _) => "not yet on server".to_string(),
                (Some(remote_id), true) => format!("remote #{remote_id}, local changes pending"),
                (Some(remote_id), false) => format!("remote #{remote_id}, up to date"),
            }
        ),
    ];
    if !entry.notes.is_empty() {
        lines.push(String::new());
        lines.extend(entry.notes.lines().map(str::to_string));
    }
    lines
}
