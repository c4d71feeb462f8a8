//! Database layer for the to-do list

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{EntryRepository, SqliteEntryRepository};

pub(crate) use repository::{parse_entry, ENTRY_COLUMNS};
