//! Entry model

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Title applied when an entry is created without one
pub const DEFAULT_TITLE: &str = "Untitled";

/// Local identity of an entry row, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl ToSql for EntryId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for EntryId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self)
    }
}

/// Push state of an entry's local changes.
///
/// A local edit always lands on `Dirty`. Staging a push moves it to
/// `Staged`, and each confirmed push steps it down by one, so an edit made
/// while the push was on the wire survives as `Staged` and is pushed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingUpdate {
    #[default]
    Clean,
    Staged,
    Dirty,
}

impl PendingUpdate {
    pub const fn from_level(level: i64) -> Self {
        match level {
            i64::MIN..=0 => Self::Clean,
            1 => Self::Staged,
            _ => Self::Dirty,
        }
    }

    pub const fn level(self) -> i64 {
        match self {
            Self::Clean => 0,
            Self::Staged => 1,
            Self::Dirty => 2,
        }
    }

    /// State after the server confirms one push
    #[must_use]
    pub const fn acknowledged(self) -> Self {
        match self {
            Self::Dirty => Self::Staged,
            Self::Staged | Self::Clean => Self::Clean,
        }
    }

    pub const fn is_pending(self) -> bool {
        !matches!(self, Self::Clean)
    }
}

impl ToSql for PendingUpdate {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.level()))
    }
}

impl FromSql for PendingUpdate {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self::from_level)
    }
}

/// A to-do entry as stored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Local identifier
    pub id: EntryId,
    /// Server identifier, `None` until the server has accepted the entry
    pub remote_id: Option<i64>,
    pub title: String,
    pub notes: String,
    pub complete: bool,
    /// Creation timestamp (Unix ms)
    pub created: i64,
    /// Last modification timestamp (Unix ms)
    pub modified: i64,
    pub pending: PendingUpdate,
    /// Set while a sync pass is pushing this row
    pub in_flight: bool,
    /// Logically deleted, waiting for the server to confirm
    pub pending_delete: bool,
}

impl Entry {
    /// Unconfirmed local changes or a pending delete
    pub const fn is_dirty(&self) -> bool {
        self.pending.is_pending() || self.pending_delete
    }

    pub const fn is_current(&self) -> bool {
        !self.is_dirty()
    }

    /// The row was edited again while its previous push was in flight
    pub const fn edited_during_flight(&self) -> bool {
        self.in_flight && matches!(self.pending, PendingUpdate::Dirty)
    }
}

/// Fields for a locally created entry; omitted fields get defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEntry {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub complete: Option<bool>,
}

impl NewEntry {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    #[must_use]
    pub const fn with_complete(mut self, complete: bool) -> Self {
        self.complete = Some(complete);
        self
    }
}

/// Partial update of an entry's user-editable fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryChanges {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub complete: Option<bool>,
}

impl EntryChanges {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::default()
        }
    }

    pub const fn complete(complete: bool) -> Self {
        Self {
            title: None,
            notes: None,
            complete: Some(complete),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.notes.is_none() && self.complete.is_none()
    }
}

/// Sort order for listing entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryOrder {
    /// Oldest first
    #[default]
    Created,
    /// Most recently modified first
    Modified,
    /// Alphabetical by title
    Title,
}

/// Local wall clock in Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Convert server seconds to local milliseconds
#[allow(clippy::cast_possible_truncation)]
pub fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

/// Convert local milliseconds to server seconds
#[allow(clippy::cast_precision_loss)]
pub fn millis_to_seconds(millis: i64) -> f64 {
    millis as f64 / 1000.0
}
