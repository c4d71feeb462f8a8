//! In-memory entry table.
//!
//! Deleted entries are kept as tombstones for one sync window so that
//! incremental lists can report them, then purged.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Serialize, Serializer};
use tokio::sync::Mutex;

use crate::error::AppError;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// An entry as served to clients. Timestamps are fractional seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEntry {
    pub id: i64,
    pub title: String,
    pub notes: String,
    #[serde(serialize_with = "as_flag")]
    pub complete: bool,
    #[serde(serialize_with = "as_flag")]
    pub deleted: bool,
    pub created: f64,
    pub modified: f64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPage {
    pub timestamp: f64,
    pub entries: Vec<StoredEntry>,
}

/// Fields supplied on create or replace; absent fields are left alone
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntryInput {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub complete: Option<bool>,
}

impl EntryInput {
    /// Parse percent-encoded `key=value` pairs separated by `;` or `&`
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let mut input = Self::default();
        for pair in raw
            .split(|c| c == ';' || c == '&')
            .filter(|pair| !pair.trim().is_empty())
        {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode(value)?;
            match key.trim() {
                "title" => input.title = Some(value),
                "notes" => input.notes = Some(value),
                "complete" => input.complete = Some(parse_flag(&value)?),
                other => tracing::debug!(field = other, "Ignoring unknown entry field"),
            }
        }
        Ok(input)
    }

    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.notes.is_none() && self.complete.is_none()
    }

    fn apply(self, entry: &mut StoredEntry) {
        if let Some(title) = self.title {
            entry.title = title;
        }
        if let Some(notes) = self.notes {
            entry.notes = notes;
        }
        if let Some(complete) = self.complete {
            entry.complete = complete;
        }
    }
}

fn decode(value: &str) -> Result<String, AppError> {
    urlencoding::decode(&value.replace('+', " "))
        .map(Cow::into_owned)
        .map_err(|_| AppError::bad_request("field value is not valid UTF-8"))
}

fn parse_flag(value: &str) -> Result<bool, AppError> {
    match value.trim() {
        "" | "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        other => Err(AppError::bad_request(format!(
            "complete must be 0 or 1, got '{other}'"
        ))),
    }
}

struct StoreState {
    next_id: i64,
    /// Latest timestamp handed out, in microseconds
    clock: i64,
    entries: BTreeMap<i64, StoredEntry>,
}

impl StoreState {
    /// Timestamp for a write, strictly after every earlier one
    fn stamp(&mut self, now_micros: i64) -> f64 {
        self.clock = now_micros.max(self.clock + 1);
        micros_to_seconds(self.clock)
    }

    /// Timestamp for a read; later writes are stamped at or after it
    fn observe(&mut self, now_micros: i64) -> f64 {
        self.clock = now_micros.max(self.clock);
        micros_to_seconds(self.clock)
    }

    fn live_entry(&mut self, id: i64) -> Result<&mut StoredEntry, AppError> {
        self.entries
            .get_mut(&id)
            .filter(|entry| !entry.deleted)
            .ok_or_else(|| AppError::gone(format!("entry {id} does not exist")))
    }
}

/// Shared handle to the entry table
#[derive(Clone)]
pub struct EntryStore {
    state: Arc<Mutex<StoreState>>,
    sync_window: Duration,
}

impl EntryStore {
    pub fn new(sync_window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                next_id: 1,
                clock: 0,
                entries: BTreeMap::new(),
            })),
            sync_window,
        }
    }

    /// List live entries, or everything modified at or after `since`
    pub async fn list(&self, since: Option<f64>, now_micros: i64) -> Result<EntryPage, AppError> {
        let mut state = self.state.lock().await;
        let timestamp = state.observe(now_micros);
        let horizon = timestamp - self.sync_window.as_secs_f64();

        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| !entry.deleted || entry.modified >= horizon);
        let purged = before - state.entries.len();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired tombstones");
        }

        let entries = match since {
            None => state
                .entries
                .values()
                .filter(|entry| !entry.deleted)
                .cloned()
                .collect(),
            Some(since) if since < horizon => {
                return Err(AppError::bad_request(format!(
                    "modified={since:.6} is older than the sync window"
                )));
            }
            Some(since) => state
                .entries
                .values()
                .filter(|entry| entry.modified >= since)
                .cloned()
                .collect(),
        };
        Ok(EntryPage { timestamp, entries })
    }

    pub async fn create(&self, input: EntryInput, now_micros: i64) -> Result<StoredEntry, AppError> {
        let mut state = self.state.lock().await;
        if input.title.is_none() {
            return Err(AppError::bad_request("title is required"));
        }

        let id = state.next_id;
        state.next_id = id
            .checked_add(1)
            .ok_or_else(|| AppError::internal("entry ids exhausted"))?;
        let now = state.stamp(now_micros);
        let mut entry = StoredEntry {
            id,
            title: String::new(),
            notes: String::new(),
            complete: false,
            deleted: false,
            created: now,
            modified: now,
        };
        input.apply(&mut entry);
        state.entries.insert(id, entry.clone());
        Ok(entry)
    }

    pub async fn replace(
        &self,
        id: i64,
        input: EntryInput,
        now_micros: i64,
    ) -> Result<StoredEntry, AppError> {
        let mut state = self.state.lock().await;
        state.live_entry(id)?;
        let now = state.stamp(now_micros);
        let entry = state.live_entry(id)?;
        input.apply(entry);
        entry.modified = now;
        Ok(entry.clone())
    }

    /// Mark the entry deleted, returning its tombstone
    pub async fn delete(&self, id: i64, now_micros: i64) -> Result<StoredEntry, AppError> {
        let mut state = self.state.lock().await;
        state.live_entry(id)?;
        let now = state.stamp(now_micros);
        let entry = state.live_entry(id)?;
        entry.deleted = true;
        entry.modified = now;
        Ok(entry.clone())
    }

    pub async fn live_count(&self) -> usize {
        let state = self.state.lock().await;
        state.entries.values().filter(|entry| !entry.deleted).count()
    }
}

pub fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}

#[allow(clippy::cast_precision_loss)]
fn micros_to_seconds(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_SECOND
}
