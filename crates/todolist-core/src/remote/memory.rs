//! In-process remote service with a manual clock.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::wire::{status, EntryFields, EntryList, RemoteEntry, RemoteResponse};
use super::RemoteClient;
use crate::error::{SyncError, SyncResult};

/// Initial server clock, in seconds
const START_CLOCK: f64 = 1000.0;

/// Kind of remote operation, used to script failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    List,
    Create,
    Replace,
    Delete,
}

/// A request received by `MemoryRemote`
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    List { since: Option<f64> },
    Create { fields: EntryFields },
    Replace { id: i64, fields: EntryFields },
    Delete { id: i64 },
}

impl RemoteCall {
    pub const fn op(&self) -> RemoteOp {
        match self {
            Self::List { .. } => RemoteOp::List,
            Self::Create { .. } => RemoteOp::Create,
            Self::Replace { .. } => RemoteOp::Replace,
            Self::Delete { .. } => RemoteOp::Delete,
        }
    }
}

type PushHook = Box<dyn Fn(&RemoteCall) + Send + Sync>;

#[derive(Debug)]
enum Scripted {
    Status(u16),
    Network,
    InvalidResponse,
}

struct MemoryState {
    clock: f64,
    next_id: i64,
    entries: BTreeMap<i64, RemoteEntry>,
    sync_window: Option<f64>,
    offline: bool,
    scripted: HashMap<RemoteOp, VecDeque<Scripted>>,
    list_override: Option<EntryList>,
    calls: Vec<RemoteCall>,
}

impl MemoryState {
    fn tick(&mut self) -> f64 {
        self.clock += 1.0;
        self.clock
    }
}

/// Fake to-do service implementing the same contract as the HTTP server.
///
/// Every mutation advances the clock by one second. Deleted entries stay as
/// tombstones so incremental lists can report them.
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
    push_hook: Mutex<Option<PushHook>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                clock: START_CLOCK,
                next_id: 1,
                entries: BTreeMap::new(),
                sync_window: None,
                offline: false,
                scripted: HashMap::new(),
                list_override: None,
                calls: Vec::new(),
            }),
            push_hook: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current server clock
    pub fn now(&self) -> f64 {
        self.state().clock
    }

    pub fn set_clock(&self, seconds: f64) {
        self.state().clock = seconds;
    }

    pub fn advance(&self, seconds: f64) {
        self.state().clock += seconds;
    }

    /// Id the next created entry receives
    pub fn set_next_id(&self, id: i64) {
        self.state().next_id = id;
    }

    /// Reject incremental lists older than `now - window` with 400
    pub fn set_sync_window(&self, window: Option<f64>) {
        self.state().sync_window = window;
    }

    /// Fail every call with a network error while offline
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Answer the next `op` call with `status` and no payload
    pub fn fail_next(&self, op: RemoteOp, status: u16) {
        self.script(op, Scripted::Status(status));
    }

    /// Fail the next `op` call at the transport layer
    pub fn drop_next(&self, op: RemoteOp) {
        self.script(op, Scripted::Network);
    }

    /// Answer the next `op` call with an unparseable payload
    pub fn garble_next(&self, op: RemoteOp) {
        self.script(op, Scripted::InvalidResponse);
    }

    fn script(&self, op: RemoteOp, outcome: Scripted) {
        self.state()
            .scripted
            .entry(op)
            .or_default()
            .push_back(outcome);
    }

    /// Return `list` verbatim from the next list call
    pub fn respond_next_list(&self, list: EntryList) {
        self.state().list_override = Some(list);
    }

    /// Run `hook` while a create, replace or delete is "on the wire"
    pub fn on_push(&self, hook: impl Fn(&RemoteCall) + Send + Sync + 'static) {
        *self
            .push_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    pub fn clear_push_hook(&self) {
        *self
            .push_hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Create an entry directly on the server
    pub fn insert(&self, title: &str, notes: &str, complete: bool) -> RemoteEntry {
        let mut state = self.state();
        let now = state.tick();
        let id = state.next_id;
        state.next_id += 1;
        let entry = RemoteEntry {
            id,
            title: title.to_string(),
            notes: notes.to_string(),
            complete,
            deleted: false,
            created: now,
            modified: now,
        };
        state.entries.insert(id, entry.clone());
        entry
    }

    /// Modify a live entry directly on the server
    pub fn edit(&self, id: i64, change: impl FnOnce(&mut RemoteEntry)) -> Option<RemoteEntry> {
        let mut state = self.state();
        let now = state.tick();
        let entry = state.entries.get_mut(&id).filter(|entry| !entry.deleted)?;
        change(entry);
        entry.modified = now;
        Some(entry.clone())
    }

    /// Delete an entry directly on the server, leaving a tombstone
    pub fn remove(&self, id: i64) -> bool {
        let mut state = self.state();
        let now = state.tick();
        match state.entries.get_mut(&id) {
            Some(entry) if !entry.deleted => {
                entry.deleted = true;
                entry.modified = now;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: i64) -> Option<RemoteEntry> {
        self.state().entries.get(&id).cloned()
    }

    /// Live (non-deleted) entries in id order
    pub fn entries(&self) -> Vec<RemoteEntry> {
        self.state()
            .entries
            .values()
            .filter(|entry| !entry.deleted)
            .cloned()
            .collect()
    }

    /// Every request received so far
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Record the call and return any scripted outcome for it
    fn begin(&self, call: RemoteCall) -> SyncResult<Option<u16>> {
        let op = call.op();
        let mut state = self.state();
        state.calls.push(call);
        if state.offline {
            return Err(SyncError::Network("remote is offline".to_string()));
        }
        match state.scripted.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(Scripted::Status(status)) => Ok(Some(status)),
            Some(Scripted::Network) => Err(SyncError::Network("connection reset".to_string())),
            Some(Scripted::InvalidResponse) => Err(SyncError::InvalidResponse(
                "expected value at line 1 column 1".to_string(),
            )),
            None => Ok(None),
        }
    }

    fn run_push_hook(&self, call: &RemoteCall) {
        let hook = self.push_hook.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hook) = hook.as_ref() {
            hook(call);
        }
    }

    fn list(&self, since: Option<f64>) -> RemoteResponse<EntryList> {
        let mut state = self.state();
        if let Some(list) = state.list_override.take() {
            return RemoteResponse::ok(list);
        }

        let timestamp = state.clock;
        let entries = match since {
            None => state
                .entries
                .values()
                .filter(|entry| !entry.deleted)
                .cloned()
                .collect(),
            Some(since) => {
                if let Some(window) = state.sync_window {
                    if since < timestamp - window {
                        return RemoteResponse::rejected(status::BAD_REQUEST);
                    }
                }
                state
                    .entries
                    .values()
                    .filter(|entry| entry.modified >= since)
                    .cloned()
                    .collect()
            }
        };
        RemoteResponse::ok(EntryList { timestamp, entries })
    }

    fn create(&self, fields: &EntryFields) -> RemoteResponse<RemoteEntry> {
        let mut state = self.state();
        let now = state.tick();
        let id = state.next_id;
        state.next_id += 1;
        let entry = RemoteEntry {
            id,
            title: fields.title.clone(),
            notes: fields.notes.clone(),
            complete: fields.complete,
            deleted: false,
            created: now,
            modified: now,
        };
        state.entries.insert(id, entry.clone());
        RemoteResponse::created(entry)
    }

    fn replace(&self, id: i64, fields: &EntryFields) -> RemoteResponse<RemoteEntry> {
        let mut state = self.state();
        let now = state.tick();
        match state.entries.get_mut(&id) {
            Some(entry) if !entry.deleted => {
                entry.title.clone_from(&fields.title);
                entry.notes.clone_from(&fields.notes);
                entry.complete = fields.complete;
                entry.modified = now;
                RemoteResponse::ok(entry.clone())
            }
            _ => RemoteResponse::rejected(status::GONE),
        }
    }

    fn delete(&self, id: i64) -> RemoteResponse<()> {
        if self.remove(id) {
            RemoteResponse::ok(())
        } else {
            RemoteResponse::rejected(status::GONE)
        }
    }
}

impl RemoteClient for MemoryRemote {
    async fn list_entries(&self, since: Option<f64>) -> SyncResult<RemoteResponse<EntryList>> {
        if let Some(status) = self.begin(RemoteCall::List { since })? {
            return Ok(RemoteResponse::rejected(status));
        }
        Ok(self.list(since))
    }

    async fn create_entry(&self, fields: &EntryFields) -> SyncResult<RemoteResponse<RemoteEntry>> {
        let call = RemoteCall::Create {
            fields: fields.clone(),
        };
        self.run_push_hook(&call);
        if let Some(status) = self.begin(call)? {
            return Ok(RemoteResponse::rejected(status));
        }
        Ok(self.create(fields))
    }

    async fn replace_entry(
        &self,
        remote_id: i64,
        fields: &EntryFields,
    ) -> SyncResult<RemoteResponse<RemoteEntry>> {
        let call = RemoteCall::Replace {
            id: remote_id,
            fields: fields.clone(),
        };
        self.run_push_hook(&call);
        if let Some(status) = self.begin(call)? {
            return Ok(RemoteResponse::rejected(status));
        }
        Ok(self.replace(remote_id, fields))
    }

    async fn delete_entry(&self, remote_id: i64) -> SyncResult<RemoteResponse<()>> {
        let call = RemoteCall::Delete { id: remote_id };
        self.run_push_hook(&call);
        if let Some(status) = self.begin(call)? {
            return Ok(RemoteResponse::rejected(status));
        }
        Ok(self.delete(remote_id))
    }
}
