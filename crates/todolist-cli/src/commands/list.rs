use std::path::Path;

use crate::cli::ListOrder;
use crate::commands::common::{entry_to_list_item, format_entry_lines, open_list, EntryListItem};
use crate::error::CliError;

pub fn run_list(order: ListOrder, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let entries = open_list(db_path)?.list(order.into())?;

    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if entries.is_empty() {
        println!("Nothing to do.");
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}
