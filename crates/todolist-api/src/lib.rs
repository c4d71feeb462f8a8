//! Reference REST service for the to-do list.
//!
//! Serves the `/todolist/entries` resource from memory, keeping deleted
//! entries as tombstones for one sync window.

pub mod config;
pub mod error;
pub mod routes;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::AppError;
pub use routes::{app_router, AppState};
