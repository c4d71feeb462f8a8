//! Row-level operations used by the sync engine.
//!
//! Callers wrap multi-statement operations in `Database::transaction`; the
//! methods here never open transactions themselves.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{parse_entry, ENTRY_COLUMNS};
use crate::error::Result;
use crate::models::{seconds_to_millis, Entry, EntryId, PendingUpdate};
use crate::remote::RemoteEntry;

/// Row counts produced by applying pulled entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullCounts {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Remote changes ignored because the local row is dirty
    pub skipped: usize,
}

impl PullCounts {
    pub const fn changed(&self) -> bool {
        self.inserted + self.updated + self.deleted > 0
    }
}

pub struct SyncStore<'a> {
    conn: &'a Connection,
}

impl<'a> SyncStore<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn dirty_rows(&self) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE pending_update > 0 OR pending_delete != 0
             ORDER BY created ASC, local_id ASC"
        ))?;
        let rows = stmt
            .query_map([], parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Copy every dirty row, then mark the live rows in flight.
    ///
    /// Rows that are not pending delete drop to `Staged`, so an edit made
    /// while the push is on the wire raises them back to `Dirty`.
    pub fn stage_dirty(&self) -> Result<Vec<Entry>> {
        let snapshot = self.dirty_rows()?;
        if snapshot.is_empty() {
            return Ok(snapshot);
        }

        self.conn.execute(
            "UPDATE entries SET
                pending_tx = 1,
                pending_update = CASE WHEN pending_delete != 0 THEN pending_update ELSE ? END
             WHERE pending_update > 0 OR pending_delete != 0",
            params![PendingUpdate::Staged],
        )?;
        Ok(snapshot)
    }

    /// Merge the server's identity and timestamps after a confirmed push,
    /// stepping the pending state down by one.
    ///
    /// Runs on one locked connection, so no local write lands between reading
    /// the pending state and storing its successor.
    pub fn confirm_push(&self, id: EntryId, remote: &RemoteEntry) -> Result<bool> {
        let pending = self
            .conn
            .query_row(
                "SELECT pending_update FROM entries WHERE local_id = ?",
                params![id],
                |row| row.get::<_, PendingUpdate>(0),
            )
            .optional()?;
        let Some(pending) = pending else {
            return Ok(false);
        };

        let rows = self.conn.execute(
            "UPDATE entries SET
                remote_id = ?,
                created = ?,
                modified = ?,
                pending_update = ?
             WHERE local_id = ?",
            params![
                remote.id,
                seconds_to_millis(remote.created),
                seconds_to_millis(remote.modified),
                pending.acknowledged(),
                id
            ],
        )?;
        Ok(rows > 0)
    }

    /// Physically delete a row
    pub fn remove(&self, id: EntryId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM entries WHERE local_id = ?", params![id])?;
        Ok(rows > 0)
    }

    pub fn clear_all(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM entries", [])?)
    }

    pub fn clear_in_flight(&self) -> Result<usize> {
        Ok(self
            .conn
            .execute("UPDATE entries SET pending_tx = 0 WHERE pending_tx != 0", [])?)
    }

    /// Apply entries returned by an incremental list.
    ///
    /// Remote deletions always win. Other changes only touch current rows
    /// whose modification time differs.
    pub fn apply_incremental(&self, entries: &[RemoteEntry]) -> Result<PullCounts> {
        let mut counts = PullCounts::default();

        for remote in entries {
            if remote.deleted {
                counts.deleted += self.conn.execute(
                    "DELETE FROM entries WHERE remote_id = ?",
                    params![remote.id],
                )?;
                continue;
            }

            let local = self
                .conn
                .query_row(
                    "SELECT modified, pending_update, pending_delete FROM entries WHERE remote_id = ?",
                    params![remote.id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, PendingUpdate>(1)?,
                            row.get::<_, i64>(2)? != 0,
                        ))
                    },
                )
                .optional()?;

            match local {
                None => {
                    self.insert_remote(remote, None)?;
                    counts.inserted += 1;
                }
                Some((_, pending, pending_delete)) if pending.is_pending() || pending_delete => {
                    counts.skipped += 1;
                }
                Some((modified, _, _)) if modified != seconds_to_millis(remote.modified) => {
                    counts.updated += self.overwrite_from_remote(remote)?;
                }
                Some(_) => {}
            }
        }

        Ok(counts)
    }

    /// Replace the table with the server's full list, then replay dirty rows
    /// on top so unpushed local state survives.
    pub fn replace_all(&self, entries: &[RemoteEntry]) -> Result<PullCounts> {
        let snapshot = self.dirty_rows()?;
        let known_ids = self.local_ids_by_remote_id()?;

        let deleted = self.clear_all()?;
        let mut counts = PullCounts {
            deleted,
            ..PullCounts::default()
        };

        for remote in entries.iter().filter(|remote| !remote.deleted) {
            self.insert_remote(remote, known_ids.get(&remote.id).copied())?;
            counts.inserted += 1;
        }

        for row in &snapshot {
            if self.replay(row)? {
                continue;
            }
            if row.pending_delete && row.remote_id.is_some() {
                // Already gone from the server.
                continue;
            }
            self.insert_snapshot(row)?;
            counts.inserted += 1;
        }

        Ok(counts)
    }

    fn local_ids_by_remote_id(&self) -> Result<HashMap<i64, EntryId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT remote_id, local_id FROM entries WHERE remote_id IS NOT NULL")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, EntryId>(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(pairs)
    }

    fn insert_remote(&self, remote: &RemoteEntry, local_id: Option<EntryId>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO entries (local_id, remote_id, title, notes, complete, created, modified)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                local_id,
                remote.id,
                remote.title,
                remote.notes,
                i32::from(remote.complete),
                seconds_to_millis(remote.created),
                seconds_to_millis(remote.modified)
            ],
        )?;
        Ok(())
    }

    fn overwrite_from_remote(&self, remote: &RemoteEntry) -> Result<usize> {
        Ok(self.conn.execute(
            "UPDATE entries SET
                title = COALESCE(NULLIF(?, ''), title),
                notes = COALESCE(NULLIF(?, ''), notes),
                complete = ?,
                created = ?,
                modified = ?
             WHERE remote_id = ?",
            params![
                remote.title,
                remote.notes,
                i32::from(remote.complete),
                seconds_to_millis(remote.created),
                seconds_to_millis(remote.modified),
                remote.id
            ],
        )?)
    }

    /// Overlay a snapshot row onto the fresh row with the same remote id
    fn replay(&self, row: &Entry) -> Result<bool> {
        let Some(remote_id) = row.remote_id else {
            return Ok(false);
        };
        let rows = self.conn.execute(
            "UPDATE entries SET
                title = ?,
                notes = ?,
                complete = ?,
                created = ?,
                modified = ?,
                pending_update = ?,
                pending_tx = ?,
                pending_delete = ?
             WHERE remote_id = ?",
            params![
                row.title,
                row.notes,
                i32::from(row.complete),
                row.created,
                row.modified,
                row.pending,
                i32::from(row.in_flight),
                i32::from(row.pending_delete),
                remote_id
            ],
        )?;
        Ok(rows > 0)
    }

    fn insert_snapshot(&self, row: &Entry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO entries (local_id, remote_id, title, notes, complete, created, modified,
                                  pending_update, pending_tx, pending_delete)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                row.id,
                row.remote_id,
                row.title,
                row.notes,
                i32::from(row.complete),
                row.created,
                row.modified,
                row.pending,
                i32::from(row.in_flight),
                i32::from(row.pending_delete)
            ],
        )?;
        Ok(())
    }
}
