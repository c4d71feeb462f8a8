use std::io;

use thiserror::Error;
use todolist_core::EntryId;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] todolist_core::Error),
    #[error(transparent)]
    Sync(#[from] todolist_core::SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No entry title provided")]
    EmptyTitle,
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("Invalid entry ID: {0}")]
    InvalidEntryId(String),
    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),
    #[error("Nothing to change; pass --title and/or --notes")]
    NothingToEdit,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Run `todolist config set-server <URL>` or set TODOLIST_SERVER_URL."
    )]
    SyncNotConfigured,
    #[error("Offline mode is on. Run `todolist config offline off` to sync again.")]
    OfflineMode,
}
