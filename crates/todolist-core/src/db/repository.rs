//! Entry repository implementation
//!
//! This is the query surface used by front ends. Rows waiting for a confirmed
//! remote delete are invisible here and cannot be edited.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{
    now_millis, Entry, EntryChanges, EntryId, EntryOrder, NewEntry, PendingUpdate, DEFAULT_TITLE,
};

pub(crate) const ENTRY_COLUMNS: &str = "local_id, remote_id, title, notes, complete, created, \
     modified, pending_update, pending_tx, pending_delete";

/// Trait for entry storage operations
pub trait EntryRepository {
    /// Create a new entry, applying defaults for omitted fields
    fn create(&self, entry: NewEntry) -> Result<Entry>;

    /// Get an entry by local ID
    fn get(&self, id: EntryId) -> Result<Option<Entry>>;

    /// List visible entries in the given order
    fn list(&self, order: EntryOrder) -> Result<Vec<Entry>>;

    /// Apply a partial update and mark the entry dirty
    fn update(&self, id: EntryId, changes: &EntryChanges) -> Result<Entry>;

    /// Mark an entry for deletion on the next sync
    fn delete(&self, id: EntryId) -> Result<()>;

    /// Mark every completed entry for deletion, returning how many were marked
    fn delete_completed(&self) -> Result<usize>;

    /// Number of rows with unsynced changes, pending deletes included
    fn count_dirty(&self) -> Result<usize>;
}

/// `SQLite` implementation of `EntryRepository`
pub struct SqliteEntryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEntryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

/// Parse an entry from a row selected with `ENTRY_COLUMNS`
pub(crate) fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        remote_id: row.get(1)?,
        title: row.get(2)?,
        notes: row.get(3)?,
        complete: row.get::<_, i64>(4)? != 0,
        created: row.get(5)?,
        modified: row.get(6)?,
        pending: row.get(7)?,
        in_flight: row.get::<_, i64>(8)? != 0,
        pending_delete: row.get::<_, i64>(9)? != 0,
    })
}

const fn order_clause(order: EntryOrder) -> &'static str {
    match order {
        EntryOrder::Created => "created ASC, local_id ASC",
        EntryOrder::Modified => "modified DESC, local_id DESC",
        EntryOrder::Title => "title COLLATE NOCASE ASC, local_id ASC",
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn create(&self, entry: NewEntry) -> Result<Entry> {
        let now = now_millis();
        let title = entry.title.unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let notes = entry.notes.unwrap_or_default();
        let complete = entry.complete.unwrap_or(false);

        self.conn.execute(
            "INSERT INTO entries (title, notes, complete, created, modified, pending_update)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                title,
                notes,
                i32::from(complete),
                now,
                now,
                PendingUpdate::Dirty
            ],
        )?;

        let id = EntryId::new(self.conn.last_insert_rowid());
        self.get(id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn get(&self, id: EntryId) -> Result<Option<Entry>> {
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE local_id = ? AND pending_delete = 0"
                ),
                params![id],
                parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn list(&self, order: EntryOrder) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE pending_delete = 0 ORDER BY {}",
            order_clause(order)
        ))?;

        let entries = stmt
            .query_map([], parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn update(&self, id: EntryId, changes: &EntryChanges) -> Result<Entry> {
        if changes.is_empty() {
            return self.get(id)?.ok_or_else(|| Error::NotFound(id.to_string()));
        }

        let rows = self.conn.execute(
            "UPDATE entries SET
                title = COALESCE(?, title),
                notes = COALESCE(?, notes),
                complete = COALESCE(?, complete),
                modified = ?,
                pending_update = ?
             WHERE local_id = ? AND pending_delete = 0",
            params![
                changes.title,
                changes.notes,
                changes.complete.map(i32::from),
                now_millis(),
                PendingUpdate::Dirty,
                id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.get(id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn delete(&self, id: EntryId) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE entries SET pending_delete = 1 WHERE local_id = ? AND pending_delete = 0",
            params![id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    fn delete_completed(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE entries SET pending_delete = 1 WHERE complete != 0 AND pending_delete = 0",
            [],
        )?;
        Ok(rows)
    }

    fn count_dirty(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE pending_update > 0 OR pending_delete != 0",
            [],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| Error::Database(format!("invalid row count {count}")))
    }
}
