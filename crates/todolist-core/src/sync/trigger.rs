//! Background sync scheduling.
//!
//! A single worker task owns the engine and the client. Requests only set
//! flags and wake the worker, so any number of requests made before it wakes
//! collapse into one run.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::engine::SyncEngine;
use crate::config::{ClientConfig, DEFAULT_LAZY_SYNC_DELAY};
use crate::remote::RemoteClient;

/// Entry points for asking the engine to run
pub trait SyncRequester: Send + Sync {
    /// Run an incremental sync at the next opportunity
    fn request_sync(&self);

    /// Discard local state and reload everything from the server
    fn request_refresh(&self);

    /// Sync once local edits have settled for a short while
    fn request_lazy_sync(&self);
}

/// Requester that ignores every request
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRequester;

impl SyncRequester for NoopRequester {
    fn request_sync(&self) {}
    fn request_refresh(&self) {}
    fn request_lazy_sync(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerConfig {
    pub lazy_delay: Duration,
    pub offline_mode: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            lazy_delay: DEFAULT_LAZY_SYNC_DELAY,
            offline_mode: false,
        }
    }
}

impl From<&ClientConfig> for TriggerConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            lazy_delay: config.lazy_sync_delay,
            offline_mode: config.offline_mode,
        }
    }
}

#[derive(Default)]
struct Shared {
    wake: Notify,
    pending: AtomicBool,
    refresh: AtomicBool,
    offline: AtomicBool,
    shutdown: AtomicBool,
    lazy_generation: AtomicU64,
    completed_runs: AtomicU64,
}

impl Shared {
    fn request(&self, refresh: bool) {
        if refresh {
            self.refresh.store(true, Ordering::SeqCst);
        }
        self.pending.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }
}

/// Runs the sync engine on a background task in response to requests
pub struct SyncTrigger {
    shared: Arc<Shared>,
    runtime: Handle,
    lazy_delay: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyncTrigger {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn<C>(engine: Arc<SyncEngine>, client: Arc<C>, config: TriggerConfig) -> Self
    where
        C: RemoteClient + 'static,
    {
        let shared = Arc::new(Shared::default());
        shared.offline.store(config.offline_mode, Ordering::SeqCst);

        let runtime = Handle::current();
        let worker = runtime.spawn(worker_loop(engine, client, Arc::clone(&shared)));

        Self {
            shared,
            runtime,
            lazy_delay: config.lazy_delay,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// While offline, requests are accepted but no sync runs. Requests made
    /// offline run as soon as offline mode is switched off.
    pub fn set_offline_mode(&self, offline: bool) {
        self.shared.offline.store(offline, Ordering::SeqCst);
        if !offline && self.shared.pending.load(Ordering::SeqCst) {
            self.shared.wake.notify_one();
        }
    }

    pub fn is_offline(&self) -> bool {
        self.shared.offline.load(Ordering::SeqCst)
    }

    /// Number of engine runs the worker has finished, successful or not
    pub fn completed_runs(&self) -> u64 {
        self.shared.completed_runs.load(Ordering::SeqCst)
    }

    /// Stop the worker after any run in progress and wait for it
    pub async fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(error) = worker.await {
                tracing::error!("Sync worker ended abnormally: {error}");
            }
        }
    }
}

impl SyncRequester for SyncTrigger {
    fn request_sync(&self) {
        self.shared.request(false);
    }

    fn request_refresh(&self) {
        self.shared.request(true);
    }

    fn request_lazy_sync(&self) {
        let generation = self.shared.lazy_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = Arc::clone(&self.shared);
        let delay = self.lazy_delay;

        // Only the newest request in a burst survives the delay.
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if shared.lazy_generation.load(Ordering::SeqCst) == generation {
                shared.request(false);
            }
        });
    }
}

impl Drop for SyncTrigger {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.wake.notify_one();
    }
}

async fn worker_loop<C: RemoteClient>(engine: Arc<SyncEngine>, client: Arc<C>, shared: Arc<Shared>) {
    loop {
        shared.wake.notified().await;
        if shared.shutdown.load(Ordering::SeqCst) {
            break;
        }
        // Requests made while offline stay queued.
        if shared.offline.load(Ordering::SeqCst) {
            tracing::debug!("Offline mode, deferring sync");
            continue;
        }
        if !shared.pending.swap(false, Ordering::SeqCst) {
            continue;
        }
        let full_refresh = shared.refresh.swap(false, Ordering::SeqCst);

        // The engine reports outcomes through its notifier.
        let _ = engine.run(client.as_ref(), full_refresh).await;
        shared.completed_runs.fetch_add(1, Ordering::SeqCst);
    }
    tracing::debug!("Sync worker stopped");
}
