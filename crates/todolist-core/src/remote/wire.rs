//! JSON wire format of the to-do service

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{SyncError, SyncResult};
use crate::models::Entry;

/// HTTP status codes the service uses
pub mod status {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const BAD_REQUEST: u16 = 400;
    pub const GONE: u16 = 410;
}

/// An entry as the server reports it. Timestamps are server seconds.
///
/// Only `title` and `notes` may be omitted; a missing flag or timestamp is
/// an invalid response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[serde(with = "flag")]
    pub complete: bool,
    #[serde(with = "flag")]
    pub deleted: bool,
    pub created: f64,
    pub modified: f64,
}

/// List envelope returned by `GET /entries`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryList {
    /// Server clock at the time the list was produced
    pub timestamp: f64,
    #[serde(default)]
    pub entries: Vec<RemoteEntry>,
}

/// User-editable fields sent on create and replace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFields {
    pub title: String,
    pub notes: String,
    pub complete: bool,
}

impl EntryFields {
    /// Encode as `title=..;notes=..;complete=0|1` with percent-encoded values
    pub fn encode(&self) -> String {
        format!(
            "title={};notes={};complete={}",
            urlencoding::encode(&self.title),
            urlencoding::encode(&self.notes),
            u8::from(self.complete)
        )
    }
}

impl From<&Entry> for EntryFields {
    fn from(entry: &Entry) -> Self {
        Self {
            title: entry.title.clone(),
            notes: entry.notes.clone(),
            complete: entry.complete,
        }
    }
}

/// Status code plus parsed payload. `body` is only set for 2xx answers.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse<T> {
    pub status: u16,
    pub body: Option<T>,
}

impl<T> RemoteResponse<T> {
    pub const fn new(status: u16, body: Option<T>) -> Self {
        Self { status, body }
    }

    pub const fn ok(body: T) -> Self {
        Self::new(status::OK, Some(body))
    }

    pub const fn created(body: T) -> Self {
        Self::new(status::CREATED, Some(body))
    }

    /// A non-2xx answer
    pub const fn rejected(status: u16) -> Self {
        Self::new(status, None)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Payload of a successful answer, or the categorized failure
    pub fn into_body(self) -> SyncResult<T> {
        if !self.is_success() {
            return Err(SyncError::rejected(
                self.status,
                format!("HTTP {}", self.status),
            ));
        }
        self.body.ok_or_else(|| {
            SyncError::InvalidResponse(format!("HTTP {} without a payload", self.status))
        })
    }
}

/// `0|1` integers on the wire, booleans also accepted on input
mod flag {
    use super::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Bool(value) => value,
            Flag::Int(value) => value != 0,
        })
    }
}
