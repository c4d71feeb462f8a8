//! Remote to-do service client
//!
//! `RemoteClient` is the seam between the sync engine and the REST service.
//! `HttpRemoteClient` talks to a real server; `MemoryRemote` is an in-process
//! stand-in with a manual clock, used by tests and offline demos.

mod http;
mod memory;
mod wire;

use std::future::Future;

pub use http::{BearerToken, HttpRemoteClient, RequestAuthenticator};
pub use memory::{MemoryRemote, RemoteCall, RemoteOp};
pub use wire::{status, EntryFields, EntryList, RemoteEntry, RemoteResponse};

use crate::error::SyncResult;

/// Operations the sync engine needs from the remote service.
///
/// Transport failures are returned as `Err`. Any HTTP answer, successful or
/// not, is returned as a `RemoteResponse` so the caller decides what a given
/// status means for its phase.
pub trait RemoteClient: Send + Sync {
    /// Full list when `since` is `None`, otherwise entries modified since then
    fn list_entries(
        &self,
        since: Option<f64>,
    ) -> impl Future<Output = SyncResult<RemoteResponse<EntryList>>> + Send;

    fn create_entry(
        &self,
        fields: &EntryFields,
    ) -> impl Future<Output = SyncResult<RemoteResponse<RemoteEntry>>> + Send;

    fn replace_entry(
        &self,
        remote_id: i64,
        fields: &EntryFields,
    ) -> impl Future<Output = SyncResult<RemoteResponse<RemoteEntry>>> + Send;

    fn delete_entry(
        &self,
        remote_id: i64,
    ) -> impl Future<Output = SyncResult<RemoteResponse<()>>> + Send;
}
