use std::path::Path;

use todolist_core::config::ClientConfig;
use todolist_core::models::seconds_to_millis;
use todolist_core::sync::{FileSyncClock, SyncClock};
use todolist_core::EntryOrder;

use crate::commands::common::{format_timestamp, open_list};
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub entries: usize,
    pub unsynced: usize,
    pub last_sync_time: f64,
}

pub fn run_status(db_path: &Path, config: &ClientConfig) -> Result<(), CliError> {
    let status = load_status(db_path)?;

    println!("Database:     {}", db_path.display());
    println!("Entries:      {}", status.entries);
    println!("Unsynced:     {}", status.unsynced);
    println!("Last sync:    {}", format_last_sync(status.last_sync_time));
    println!(
        "Server:       {}",
        config.server_url.as_deref().unwrap_or("not configured")
    );
    println!(
        "Offline mode: {}",
        if config.offline_mode { "on" } else { "off" }
    );
    Ok(())
}

pub fn load_status(db_path: &Path) -> Result<Status, CliError> {
    let list = open_list(db_path)?;
    Ok(Status {
        entries: list.list(EntryOrder::Created)?.len(),
        unsynced: list.count_dirty()?,
        last_sync_time: FileSyncClock::beside_database(db_path).load()?,
    })
}

pub fn format_last_sync(seconds: f64) -> String {
    if seconds > 0.0 {
        format_timestamp(seconds_to_millis(seconds))
    } else {
        "never".to_string()
    }
}
