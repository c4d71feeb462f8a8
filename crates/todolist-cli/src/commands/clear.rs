use std::path::Path;

use crate::commands::common::open_list;
use crate::error::CliError;

pub fn run_clear_completed(db_path: &Path) -> Result<(), CliError> {
    let removed = open_list(db_path)?.delete_completed()?;
    println!("Deleted {removed} completed entries");
    Ok(())
}
