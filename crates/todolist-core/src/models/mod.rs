//! Data models for the to-do list

mod entry;

pub use entry::{
    millis_to_seconds, now_millis, seconds_to_millis, Entry, EntryChanges, EntryId, EntryOrder, NewEntry,
    PendingUpdate, DEFAULT_TITLE,
};
