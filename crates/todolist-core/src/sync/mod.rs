//! Offline-first synchronization
//!
//! `SyncEngine` pushes local changes and pulls remote ones. `SyncTrigger`
//! decides when it runs, `SyncNotifier` hears about the outcome and
//! `SyncClock` persists the server time of the last successful pull.

mod clock;
mod engine;
mod notify;
mod store;
mod trigger;

pub use clock::{FileSyncClock, MemorySyncClock, SyncClock, LAST_SYNC_FILE_NAME};
pub use engine::{PullMode, SyncEngine, SyncReport};
pub use notify::{ChannelNotifier, LogNotifier, NoopNotifier, SyncEvent, SyncNotifier};
pub use trigger::{NoopRequester, SyncRequester, SyncTrigger, TriggerConfig};
