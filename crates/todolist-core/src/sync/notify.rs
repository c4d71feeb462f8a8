//! Sync outcome notification.

use tokio::sync::broadcast;

use super::engine::SyncReport;
use crate::error::SyncError;

/// Receives the outcome of each sync run.
///
/// All methods default to no-ops so implementors only override what they
/// surface.
pub trait SyncNotifier: Send + Sync {
    /// Local rows were inserted, updated or deleted by a sync
    fn entries_changed(&self) {}

    fn sync_completed(&self, _report: &SyncReport) {}

    fn sync_failed(&self, _error: &SyncError) {}
}

/// Notifier for callers that do not surface sync results
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl SyncNotifier for NoopNotifier {}

/// Writes sync outcomes to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl SyncNotifier for LogNotifier {
    fn entries_changed(&self) {
        tracing::info!("Entries updated by sync");
    }

    fn sync_completed(&self, report: &SyncReport) {
        tracing::info!(
            changed = report.changed,
            pushed = report.pushed,
            push_failures = report.push_failures,
            pulled = report.pulled,
            mode = ?report.mode,
            "Sync completed"
        );
    }

    fn sync_failed(&self, error: &SyncError) {
        tracing::error!(category = error.category(), "Sync failed: {error}");
    }
}

/// Event published by `ChannelNotifier`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    EntriesChanged,
    Completed(SyncReport),
    /// A completed run clears any earlier failure
    Failed {
        category: &'static str,
        message: String,
    },
}

/// Broadcasts sync outcomes to any number of subscribers
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: broadcast::Sender<SyncEvent>,
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new(32)
    }
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

impl SyncNotifier for ChannelNotifier {
    fn entries_changed(&self) {
        self.publish(SyncEvent::EntriesChanged);
    }

    fn sync_completed(&self, report: &SyncReport) {
        self.publish(SyncEvent::Completed(report.clone()));
    }

    fn sync_failed(&self, error: &SyncError) {
        self.publish(SyncEvent::Failed {
            category: error.category(),
            message: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_notifier_publishes_events() {
        let notifier = ChannelNotifier::default();
        let mut events = notifier.subscribe();

        notifier.entries_changed();
        notifier.sync_failed(&SyncError::Network("unreachable".into()));

        assert_eq!(events.recv().await.unwrap(), SyncEvent::EntriesChanged);
        match events.recv().await.unwrap() {
            SyncEvent::Failed { category, message } => {
                assert_eq!(category, "network");
                assert!(message.contains("unreachable"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let notifier = ChannelNotifier::default();
        notifier.sync_completed(&SyncReport::default());
    }
}
