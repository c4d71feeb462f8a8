//! todolist-core - Core library for the offline-first to-do list
//!
//! This crate contains the entry model, the `SQLite` record store, the REST
//! client contract and the sync engine that reconciles the two. Front ends
//! (CLI, reference server tests) only talk to the types re-exported here.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;

pub use error::{Error, Result, SyncError, SyncResult};
pub use models::{Entry, EntryChanges, EntryId, EntryOrder, NewEntry, PendingUpdate};
