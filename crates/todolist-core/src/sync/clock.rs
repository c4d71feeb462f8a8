//! Durable storage for the last successful pull time.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::Result;

/// File name used next to the database
pub const LAST_SYNC_FILE_NAME: &str = "lastSyncTime";

/// Persisted server timestamp (seconds) of the last successful pull.
///
/// `0` means "never synced" and forces a full refresh.
pub trait SyncClock: Send + Sync {
    fn load(&self) -> Result<f64>;
    fn store(&self, timestamp: f64) -> Result<()>;
}

/// Stores the timestamp as text in a dedicated file
#[derive(Debug, Clone)]
pub struct FileSyncClock {
    path: PathBuf,
}

impl FileSyncClock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Clock file in the same directory as `db_path`
    pub fn beside_database(db_path: &Path) -> Self {
        let dir = db_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(dir.join(LAST_SYNC_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SyncClock for FileSyncClock {
    fn load(&self) -> Result<f64> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0.0),
            Err(error) => return Err(error.into()),
        };

        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
            _ => {
                tracing::warn!(
                    "Ignoring unreadable sync time in {}: {:?}",
                    self.path.display(),
                    raw.trim()
                );
                Ok(0.0)
            }
        }
    }

    fn store(&self, timestamp: f64) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write then rename so a crash never leaves a half-written value.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, format!("{timestamp:.6}"))?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory clock for tests and throwaway databases
#[derive(Debug, Default)]
pub struct MemorySyncClock {
    value: Mutex<f64>,
}

impl MemorySyncClock {
    pub fn new(value: f64) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }
}

impl SyncClock for MemorySyncClock {
    fn load(&self) -> Result<f64> {
        Ok(*self.value.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn store(&self, timestamp: f64) -> Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = timestamp;
        Ok(())
    }
}
