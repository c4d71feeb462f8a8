use std::path::Path;

use crate::commands::common::{find_entry, open_list, parse_entry_id};
use crate::error::CliError;

pub fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let id = parse_entry_id(id)?;
    let list = open_list(db_path)?;
    let entry = find_entry(&list, id)?;

    list.delete(entry.id)?;
    println!("{}", entry.id);
    Ok(())
}
