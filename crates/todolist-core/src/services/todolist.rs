//! Local to-do list service used by front ends.

use std::sync::Arc;

use crate::db::{Database, EntryRepository, SqliteEntryRepository};
use crate::models::{Entry, EntryChanges, EntryId, EntryOrder, NewEntry};
use crate::sync::{NoopRequester, SyncRequester};
use crate::Result;

/// Thread-safe façade over the record store.
///
/// Every successful local write asks the attached requester for a lazy sync.
#[derive(Clone)]
pub struct TodoList {
    db: Arc<Database>,
    sync: Arc<dyn SyncRequester>,
}

impl TodoList {
    /// Service without background sync
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_requester(db, Arc::new(NoopRequester))
    }

    pub fn with_requester(db: Arc<Database>, sync: Arc<dyn SyncRequester>) -> Self {
        Self { db, sync }
    }

    /// Open (or create) a database file and wrap it without background sync
    pub fn open_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(Arc::new(Database::open(path)?)))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn list(&self, order: EntryOrder) -> Result<Vec<Entry>> {
        SqliteEntryRepository::new(&self.db.connection()).list(order)
    }

    pub fn get(&self, id: EntryId) -> Result<Option<Entry>> {
        SqliteEntryRepository::new(&self.db.connection()).get(id)
    }

    pub fn add(&self, entry: NewEntry) -> Result<Entry> {
        let entry = SqliteEntryRepository::new(&self.db.connection()).create(entry)?;
        self.sync.request_lazy_sync();
        Ok(entry)
    }

    pub fn update(&self, id: EntryId, changes: &EntryChanges) -> Result<Entry> {
        let entry = SqliteEntryRepository::new(&self.db.connection()).update(id, changes)?;
        if !changes.is_empty() {
            self.sync.request_lazy_sync();
        }
        Ok(entry)
    }

    pub fn set_complete(&self, id: EntryId, complete: bool) -> Result<Entry> {
        self.update(id, &EntryChanges::complete(complete))
    }

    pub fn delete(&self, id: EntryId) -> Result<()> {
        SqliteEntryRepository::new(&self.db.connection()).delete(id)?;
        self.sync.request_lazy_sync();
        Ok(())
    }

    pub fn delete_completed(&self) -> Result<usize> {
        let marked = SqliteEntryRepository::new(&self.db.connection()).delete_completed()?;
        if marked > 0 {
            self.sync.request_lazy_sync();
        }
        Ok(marked)
    }

    pub fn count_dirty(&self) -> Result<usize> {
        SqliteEntryRepository::new(&self.db.connection()).count_dirty()
    }

    pub fn request_sync(&self) {
        self.sync.request_sync();
    }

    pub fn request_refresh(&self) {
        self.sync.request_refresh();
    }
}
