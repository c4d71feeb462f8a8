use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use todolist_core::config::ClientConfig;
use todolist_core::services::TodoList;
use todolist_core::{Entry, EntryId};

use crate::error::CliError;
use crate::settings::CliSettings;

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: i64,
    pub remote_id: Option<i64>,
    pub title: String,
    pub notes: String,
    pub complete: bool,
    pub created: i64,
    pub modified: i64,
    pub synced: bool,
    pub relative_time: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TODOLIST_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("todolist")
        .join("todolist.db")
}

pub fn open_list(db_path: &Path) -> Result<TodoList, CliError> {
    Ok(TodoList::open_path(db_path)?)
}

/// Environment configuration with persisted settings filling the gaps
pub fn load_client_config() -> Result<ClientConfig, CliError> {
    let env_config = ClientConfig::from_env()?;
    let settings = CliSettings::load().map_err(CliError::Config)?;
    settings.apply_to(env_config).map_err(CliError::Config)
}

pub fn parse_entry_id(id: &str) -> Result<EntryId, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyEntryId);
    }
    trimmed
        .parse::<EntryId>()
        .map_err(|_| CliError::InvalidEntryId(trimmed.to_string()))
}

pub fn find_entry(list: &TodoList, id: EntryId) -> Result<Entry, CliError> {
    list.get(id)?.ok_or(CliError::EntryNotFound(id))
}

pub fn normalize_title(parts: &[String]) -> Option<String> {
    let joined = parts.join(" ");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

pub fn format_entry_lines(entries: &[Entry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| format_entry_line(entry, now_ms))
        .collect()
}

pub fn format_entry_line(entry: &Entry, now_ms: i64) -> String {
    let mark = if entry.complete { "[x]" } else { "[ ]" };
    let dirty = if entry.is_dirty() { "*" } else { " " };
    let title = title_preview(&entry.title, 40);
    let relative_time = format_relative_time(entry.modified, now_ms);
    format!(
        "{:>5}  {mark}{dirty} {title:<40}  {relative_time}",
        entry.id
    )
}

pub fn entry_to_list_item(entry: &Entry) -> EntryListItem {
    let now_ms = Utc::now().timestamp_millis();
    EntryListItem {
        id: entry.id.get(),
        remote_id: entry.remote_id,
        title: entry.title.clone(),
        notes: entry.notes.clone(),
        complete: entry.complete,
        created: entry.created,
        modified: entry.modified,
        synced: entry.is_current(),
        relative_time: format_relative_time(entry.modified, now_ms),
    }
}

pub fn title_preview(title: &str, max_chars: usize) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
