//! The sync state machine.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::clock::SyncClock;
use super::notify::SyncNotifier;
use super::store::{PullCounts, SyncStore};
use crate::db::Database;
use crate::error::{Result, SyncError, SyncResult};
use crate::models::{Entry, EntryId};
use crate::remote::{status, EntryFields, RemoteClient, RemoteEntry};

/// How the downstream phase pulled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PullMode {
    /// Only entries changed since the last pull
    #[default]
    Incremental,
    /// The whole table was replaced with the server's list
    Refresh,
}

/// Outcome of one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Any local row was inserted, updated or deleted
    pub changed: bool,
    /// Rows the server confirmed during the upstream phase
    pub pushed: usize,
    /// Rows left dirty after a failed push
    pub push_failures: usize,
    /// Entries received during the downstream phase
    pub pulled: usize,
    pub mode: PullMode,
}

impl SyncReport {
    fn record_pull(&mut self, counts: PullCounts, received: usize, mode: PullMode) {
        self.changed |= counts.changed();
        self.pulled += received;
        self.mode = mode;
    }
}

/// Reconciles the local store with the remote service.
///
/// Runs are serialized by an internal lock that also guards the in-memory
/// copy of the last sync time.
pub struct SyncEngine {
    db: Arc<Database>,
    clock: Arc<dyn SyncClock>,
    notifier: Arc<dyn SyncNotifier>,
    last_sync_time: Mutex<f64>,
}

impl SyncEngine {
    /// Create an engine, loading the last sync time from `clock`
    pub fn new(
        db: Arc<Database>,
        clock: Arc<dyn SyncClock>,
        notifier: Arc<dyn SyncNotifier>,
    ) -> Self {
        let last_sync_time = clock.load().unwrap_or_else(|error| {
            tracing::warn!("Failed to load last sync time, forcing a full refresh: {error}");
            0.0
        });

        Self {
            db,
            clock,
            notifier,
            last_sync_time: Mutex::new(last_sync_time),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Server time of the last successful pull, `0` if never synced
    pub async fn last_sync_time(&self) -> f64 {
        *self.last_sync_time.lock().await
    }

    /// Run one sync pass.
    ///
    /// With `full_refresh` the local table is discarded first. Otherwise dirty
    /// rows are pushed one by one, and push failures leave the row dirty
    /// without failing the run. The pull that follows either succeeds or
    /// fails the run as a whole.
    pub async fn run<C: RemoteClient>(
        &self,
        client: &C,
        full_refresh: bool,
    ) -> SyncResult<SyncReport> {
        let mut last_sync_time = self.last_sync_time.lock().await;
        tracing::debug!(full_refresh, last_sync_time = *last_sync_time, "Starting sync");

        let result = {
            let _in_flight = InFlightGuard { db: &self.db };
            self.run_phases(client, full_refresh, &mut last_sync_time)
                .await
        };

        match &result {
            Ok(report) => {
                if report.changed {
                    self.notifier.entries_changed();
                }
                self.notifier.sync_completed(report);
            }
            Err(error) => {
                tracing::warn!(category = error.category(), "Sync aborted: {error}");
                self.notifier.sync_failed(error);
            }
        }
        result
    }

    async fn run_phases<C: RemoteClient>(
        &self,
        client: &C,
        full_refresh: bool,
        last_sync_time: &mut f64,
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();

        if full_refresh {
            let cleared = self.db.transaction(|tx| SyncStore::new(tx).clear_all())?;
            report.changed |= cleared > 0;
            self.advance(last_sync_time, 0.0);
            tracing::info!("Cleared {cleared} local entries for a full refresh");
        } else {
            self.push(client, &mut report).await?;
        }

        if *last_sync_time > 0.0 {
            self.pull_incremental(client, last_sync_time, &mut report)
                .await?;
        } else {
            self.pull_refresh(client, last_sync_time, &mut report)
                .await?;
        }

        Ok(report)
    }

    async fn push<C: RemoteClient>(&self, client: &C, report: &mut SyncReport) -> SyncResult<()> {
        let snapshot = self.db.transaction(|tx| SyncStore::new(tx).stage_dirty())?;
        if snapshot.is_empty() {
            return Ok(());
        }
        tracing::debug!("Pushing {} dirty entries", snapshot.len());

        for row in &snapshot {
            match self.push_row(client, row).await {
                Ok(changed) => {
                    report.pushed += 1;
                    report.changed |= changed;
                }
                Err(error) => {
                    report.push_failures += 1;
                    tracing::warn!(
                        entry = %row.id,
                        category = error.category(),
                        "Push failed, entry stays dirty: {error}"
                    );
                }
            }
        }
        Ok(())
    }

    async fn push_row<C: RemoteClient>(&self, client: &C, row: &Entry) -> SyncResult<bool> {
        if row.pending_delete {
            let Some(remote_id) = row.remote_id else {
                // Never reached the server, nothing to delete there.
                return Ok(self.remove_local(row.id)?);
            };
            let response = client.delete_entry(remote_id).await?;
            if response.is_success() || response.status == status::GONE {
                return Ok(self.remove_local(row.id)?);
            }
            return Err(SyncError::rejected(
                response.status,
                format!("delete of remote entry {remote_id} rejected"),
            ));
        }

        let fields = EntryFields::from(row);
        let response = match row.remote_id {
            None => client.create_entry(&fields).await?,
            Some(remote_id) => client.replace_entry(remote_id, &fields).await?,
        };
        let remote = response.into_body()?;
        Ok(self.confirm_local(row.id, &remote)?)
    }

    fn remove_local(&self, id: EntryId) -> Result<bool> {
        SyncStore::new(&self.db.connection()).remove(id)
    }

    fn confirm_local(&self, id: EntryId, remote: &RemoteEntry) -> Result<bool> {
        SyncStore::new(&self.db.connection()).confirm_push(id, remote)
    }

    async fn pull_incremental<C: RemoteClient>(
        &self,
        client: &C,
        last_sync_time: &mut f64,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let response = client.list_entries(Some(*last_sync_time)).await?;
        if response.status == status::BAD_REQUEST {
            tracing::info!("Sync window expired, falling back to a full refresh");
            return self.pull_refresh(client, last_sync_time, report).await;
        }

        let list = response.into_body()?;
        let counts = self
            .db
            .transaction(|tx| SyncStore::new(tx).apply_incremental(&list.entries))?;
        tracing::debug!(?counts, "Applied incremental update");

        report.record_pull(counts, list.entries.len(), PullMode::Incremental);
        self.advance(last_sync_time, list.timestamp);
        Ok(())
    }

    async fn pull_refresh<C: RemoteClient>(
        &self,
        client: &C,
        last_sync_time: &mut f64,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let list = client.list_entries(None).await?.into_body()?;
        let counts = self
            .db
            .transaction(|tx| SyncStore::new(tx).replace_all(&list.entries))?;
        tracing::debug!(?counts, "Replaced local entries");

        report.record_pull(counts, list.entries.len(), PullMode::Refresh);
        self.advance(last_sync_time, list.timestamp);
        Ok(())
    }

    /// Update the in-memory sync time and persist it right away
    fn advance(&self, last_sync_time: &mut f64, timestamp: f64) {
        *last_sync_time = timestamp;
        if let Err(error) = self.clock.store(timestamp) {
            tracing::error!("Failed to persist last sync time {timestamp:.6}: {error}");
        }
    }
}

/// Clears every in-flight marker when dropped, whether the run finished,
/// failed, or its future was dropped mid-way.
struct InFlightGuard<'a> {
    db: &'a Database,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        match SyncStore::new(&self.db.connection()).clear_in_flight() {
            Ok(0) => {}
            Ok(cleared) => tracing::debug!("Cleared in-flight marker on {cleared} entries"),
            Err(error) => tracing::error!("Failed to clear in-flight markers: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{EntryRepository, SqliteEntryRepository};
    use crate::models::{EntryChanges, EntryOrder, NewEntry, PendingUpdate};
    use crate::remote::{EntryList, MemoryRemote, RemoteCall, RemoteOp};
    use crate::services::TodoList;
    use crate::sync::{ChannelNotifier, MemorySyncClock, SyncEvent};
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast;

    struct Harness {
        db: Arc<Database>,
        list: TodoList,
        engine: SyncEngine,
        remote: MemoryRemote,
        clock: Arc<MemorySyncClock>,
        events: broadcast::Receiver<SyncEvent>,
    }

    fn harness() -> Harness {
        let db = Arc::new(Database::open_in_memory().unwrap());
        harness_on(db, 0.0)
    }

    fn harness_on(db: Arc<Database>, last_sync_time: f64) -> Harness {
        let clock = Arc::new(MemorySyncClock::new(last_sync_time));
        let notifier = Arc::new(ChannelNotifier::default());
        let events = notifier.subscribe();
        let engine = SyncEngine::new(db.clone(), clock.clone(), notifier);
        Harness {
            list: TodoList::new(db.clone()),
            db,
            engine,
            remote: MemoryRemote::new(),
            clock,
            events,
        }
    }

    impl Harness {
        async fn sync(&self) -> SyncResult<SyncReport> {
            self.engine.run(&self.remote, false).await
        }

        fn entry(&self, id: EntryId) -> Entry {
            self.list.get(id).unwrap().unwrap()
        }

        fn stored_rows(&self) -> i64 {
            self.db
                .connection()
                .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
                .unwrap()
        }

        fn in_flight_rows(&self) -> i64 {
            self.db
                .connection()
                .query_row(
                    "SELECT COUNT(*) FROM entries WHERE pending_tx != 0",
                    [],
                    |row| row.get(0),
                )
                .unwrap()
        }

        /// Create a remote entry and pull it, returning its local id
        async fn synced(&self, title: &str) -> (EntryId, i64) {
            let remote = self.remote.insert(title, "", false);
            self.sync().await.unwrap();
            let local = self
                .list
                .list(EntryOrder::Created)
                .unwrap()
                .into_iter()
                .find(|entry| entry.remote_id == Some(remote.id))
                .unwrap();
            (local.id, remote.id)
        }
    }

    fn remote_entry(id: i64, title: &str, modified: f64) -> RemoteEntry {
        RemoteEntry {
            id,
            title: title.to_string(),
            notes: String::new(),
            complete: false,
            deleted: false,
            created: modified,
            modified,
        }
    }

    #[tokio::test]
    async fn pushes_new_entry_and_merges_server_fields() {
        let h = harness();
        h.remote.set_next_id(42);
        h.remote.set_clock(999.0);
        let local = h.list.add(NewEntry::titled("Buy milk")).unwrap();

        let report = h.sync().await.unwrap();

        let entry = h.entry(local.id);
        assert_eq!(entry.remote_id, Some(42));
        assert_eq!(entry.pending, PendingUpdate::Clean);
        assert_eq!(entry.created, 1_000_000);
        assert_eq!(entry.modified, 1_000_000);
        assert!(!entry.in_flight);

        assert!(report.changed);
        assert_eq!(report.pushed, 1);
        assert_eq!(report.mode, PullMode::Refresh);
        assert_eq!(
            h.remote.calls()[0],
            RemoteCall::Create {
                fields: EntryFields {
                    title: "Buy milk".to_string(),
                    notes: String::new(),
                    complete: false,
                }
            }
        );
        assert!((h.engine.last_sync_time().await - 1000.0).abs() < f64::EPSILON);
        assert!((h.clock.load().unwrap() - 1000.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn second_run_without_changes_reports_nothing() {
        let h = harness();
        h.remote.insert("from server", "", false);
        h.list.add(NewEntry::titled("local")).unwrap();

        assert!(h.sync().await.unwrap().changed);
        let second = h.sync().await.unwrap();

        assert!(!second.changed);
        assert_eq!(second.pushed, 0);
        assert_eq!(second.mode, PullMode::Incremental);
    }

    #[tokio::test]
    async fn incremental_pull_applies_remote_changes() {
        let h = harness();
        let (local_id, remote_id) = h.synced("original").await;

        h.remote.edit(remote_id, |entry| entry.title = "renamed".to_string());
        h.remote.insert("brand new", "", false);
        let report = h.sync().await.unwrap();

        assert!(report.changed);
        assert_eq!(report.mode, PullMode::Incremental);
        assert_eq!(h.entry(local_id).title, "renamed");
        assert_eq!(h.list.list(EntryOrder::Created).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dirty_rows_are_not_overwritten_by_pulls() {
        let h = harness();
        let (local_id, remote_id) = h.synced("shared").await;

        h.list
            .update(local_id, &EntryChanges::title("local"))
            .unwrap();
        h.remote.edit(remote_id, |entry| entry.title = "remote".to_string());
        h.remote.fail_next(RemoteOp::Replace, 409);

        let report = h.sync().await.unwrap();
        assert_eq!(report.push_failures, 1);
        assert!(!report.changed);
        let entry = h.entry(local_id);
        assert_eq!(entry.title, "local");
        assert!(entry.is_dirty());

        // Pushing is what clears dirtiness.
        h.sync().await.unwrap();
        let entry = h.entry(local_id);
        assert!(entry.is_current());
        assert_eq!(h.remote.get(remote_id).unwrap().title, "local");
    }

    #[tokio::test]
    async fn remote_deletion_wins_over_local_edits() {
        let h = harness();
        let (local_id, remote_id) = h.synced("doomed").await;

        h.list
            .update(local_id, &EntryChanges::notes("still editing"))
            .unwrap();
        h.remote.remove(remote_id);

        let report = h.sync().await.unwrap();
        assert!(report.changed);
        assert_eq!(report.push_failures, 1);
        assert!(h.list.get(local_id).unwrap().is_none());
        assert_eq!(h.stored_rows(), 0);
    }

    #[tokio::test]
    async fn edit_during_push_is_pushed_again() {
        let h = harness();
        let local = h.list.add(NewEntry::titled("Buy milk")).unwrap();

        let db = h.db.clone();
        let id = local.id;
        h.remote.on_push(move |call| {
            if matches!(call, RemoteCall::Create { .. }) {
                SqliteEntryRepository::new(&db.connection())
                    .update(id, &EntryChanges::notes("edited mid-flight"))
                    .unwrap();
            }
        });

        h.sync().await.unwrap();
        let entry = h.entry(local.id);
        assert_eq!(entry.remote_id, Some(1));
        assert_eq!(entry.pending, PendingUpdate::Staged);
        assert_eq!(entry.notes, "edited mid-flight");
        assert!(!entry.in_flight);

        h.remote.clear_calls();
        h.sync().await.unwrap();
        assert!(h.remote.calls().iter().any(|call| matches!(
            call,
            RemoteCall::Replace { id: 1, fields } if fields.notes == "edited mid-flight"
        )));
        assert_eq!(h.entry(local.id).pending, PendingUpdate::Clean);
    }

    #[tokio::test]
    async fn refresh_keeps_dirty_rows_missing_from_server() {
        let h = harness();
        h.db.connection()
            .execute(
                "INSERT INTO entries (remote_id, title, notes, complete, created, modified)
                 VALUES (7, 'orphan', '', 0, 1, 1)",
                [],
            )
            .unwrap();
        let orphan = h.list.list(EntryOrder::Created).unwrap()[0].clone();
        h.list
            .update(orphan.id, &EntryChanges::title("orphan edited"))
            .unwrap();
        h.remote.insert("server only", "", false);

        let report = h.sync().await.unwrap();
        assert_eq!(report.mode, PullMode::Refresh);

        let survivor = h.entry(orphan.id);
        assert_eq!(survivor.title, "orphan edited");
        assert_eq!(survivor.remote_id, Some(7));
        assert!(survivor.is_dirty());
        assert_eq!(h.list.list(EntryOrder::Created).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn expired_sync_window_falls_back_to_refresh() {
        let h = harness();
        h.synced("first").await;
        let since = h.engine.last_sync_time().await;

        h.remote.set_sync_window(Some(10.0));
        h.remote.advance(100.0);
        h.remote.insert("late", "", false);
        h.remote.clear_calls();

        let report = h.sync().await.unwrap();
        assert_eq!(report.mode, PullMode::Refresh);
        assert_eq!(
            h.remote.calls(),
            vec![
                RemoteCall::List { since: Some(since) },
                RemoteCall::List { since: None }
            ]
        );
        assert!((h.engine.last_sync_time().await - h.remote.now()).abs() < f64::EPSILON);
        assert_eq!(h.list.list(EntryOrder::Created).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_rolls_back_local_table() {
        let first = harness();
        first.remote.insert("one", "", false);
        first.remote.insert("two", "", false);
        first.sync().await.unwrap();
        first.list.add(NewEntry::titled("unpushed")).unwrap();

        let mut h = harness_on(first.db.clone(), 0.0);
        let shape = |list: &TodoList| {
            list.list(EntryOrder::Created)
                .unwrap()
                .into_iter()
                .map(|entry| (entry.id, entry.remote_id, entry.title))
                .collect::<Vec<_>>()
        };
        let before = shape(&h.list);

        h.remote.drop_next(RemoteOp::Create);
        h.remote.respond_next_list(EntryList {
            timestamp: 5000.0,
            entries: vec![remote_entry(3, "dup", 4000.0), remote_entry(3, "dup", 4000.0)],
        });

        let error = h.sync().await.unwrap_err();
        assert!(matches!(error, SyncError::Store(_)));
        assert_eq!(shape(&h.list), before);
        assert_eq!(h.in_flight_rows(), 0);
        assert!(h.engine.last_sync_time().await.abs() < f64::EPSILON);
        assert!(matches!(
            h.events.recv().await.unwrap(),
            SyncEvent::Failed {
                category: "store",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn pending_delete_is_confirmed_then_removed() {
        let h = harness();
        let (local_id, remote_id) = h.synced("remove me").await;

        h.list.delete(local_id).unwrap();
        h.sync().await.unwrap();

        assert!(h.remote.get(remote_id).unwrap().deleted);
        assert_eq!(h.stored_rows(), 0);
    }

    #[tokio::test]
    async fn unpushed_delete_never_reaches_server() {
        let h = harness();
        let local = h.list.add(NewEntry::titled("typo")).unwrap();
        h.list.delete(local.id).unwrap();

        h.sync().await.unwrap();

        assert!(h
            .remote
            .calls()
            .iter()
            .all(|call| matches!(call, RemoteCall::List { .. })));
        assert_eq!(h.stored_rows(), 0);
    }

    #[tokio::test]
    async fn network_failure_aborts_pull_and_clears_in_flight() {
        let mut h = harness();
        let (local_id, _) = h.synced("offline edit").await;
        let synced_at = h.engine.last_sync_time().await;
        h.list
            .update(local_id, &EntryChanges::complete(true))
            .unwrap();
        while h.events.try_recv().is_ok() {}

        h.remote.set_offline(true);
        let error = h.sync().await.unwrap_err();

        assert!(error.is_retryable());
        assert!(h.entry(local_id).is_dirty());
        assert_eq!(h.in_flight_rows(), 0);
        assert!((h.engine.last_sync_time().await - synced_at).abs() < f64::EPSILON);
        assert!(matches!(
            h.events.recv().await.unwrap(),
            SyncEvent::Failed {
                category: "network",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn full_refresh_discards_local_edits() {
        let h = harness();
        let (local_id, _) = h.synced("server title").await;
        h.list
            .update(local_id, &EntryChanges::title("local title"))
            .unwrap();
        h.remote.clear_calls();

        let report = h.engine.run(&h.remote, true).await.unwrap();

        assert_eq!(report.mode, PullMode::Refresh);
        assert_eq!(report.pushed, 0);
        assert_eq!(h.remote.calls(), vec![RemoteCall::List { since: None }]);
        let entries = h.list.list(EntryOrder::Created).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "server title");
        assert!(entries[0].is_current());
    }

    #[tokio::test]
    async fn successful_sync_notifies_observers() {
        let mut h = harness();
        h.remote.insert("hello", "", false);

        h.sync().await.unwrap();

        assert_eq!(h.events.recv().await.unwrap(), SyncEvent::EntriesChanged);
        match h.events.recv().await.unwrap() {
            SyncEvent::Completed(report) => assert!(report.changed),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
