//! The session manager: the root object that owns every session record.
//!
//! One manager lives in each storage root under a configured key. It maps
//! session id strings to records and keeps the inactivity settings the
//! factory configured it with.
//!
//! # Concurrency note
//!
//! Records are handed out as [`SharedRecord`]s. Two requests carrying the
//! same session cookie get the *same* record and serialize on its mutex.
//! The manager never waits on a record lock while holding its map lock:
//! [`commit`](SessionManager::commit) copies the record handles out first,
//! then locks each record in turn, then the snapshot table.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use strongroom_record::SessionRecord;

use crate::Persistent;

/// A session record shared between every request that uses it.
pub type SharedRecord = Arc<Mutex<SessionRecord>>;

/// Owns all session records of one storage root.
///
/// Think of it as the server-side half of the session cookie: the cookie
/// carries an id, and this is where the id leads.
///
/// ## Lifecycle
///
/// ```text
/// query(id) ──→ None ──→ get(id) ──→ [new record, dirty]
///     │                                    │
///     ▼                                    ▼
/// Some(record) ──→ mutate ──→ commit() ──→ [snapshot written, clean]
/// ```
#[derive(Debug)]
pub struct SessionManager {
    /// Seconds of inactivity after which a session may be discarded.
    ///
    /// Stored for the storage layer's expiry sweep. The manager itself
    /// never expires anything.
    timeout: u64,

    /// Granularity, in seconds, of inactivity checks. A session's last
    /// access is only tracked to this resolution, so it should be well
    /// below `timeout`.
    period: u64,

    /// Live records, keyed by session id.
    ///
    /// A read-write lock because almost every request only looks a record
    /// up; the write lock is taken only when a new session is created or
    /// one is removed. Each record carries its own mutex, so two requests
    /// for different sessions never wait on each other here for long.
    records: RwLock<HashMap<String, SharedRecord>>,

    /// Last committed data of each record, keyed like `records`.
    ///
    /// This is what would survive a restart in a real database. Only
    /// [`commit`](Self::commit) writes it, so a change that never reached
    /// a commit is invisible here.
    committed: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl SessionManager {
    /// Creates an empty manager with the given inactivity settings.
    pub fn new(timeout: u64, period: u64) -> Self {
        Self {
            timeout,
            period,
            records: RwLock::new(HashMap::new()),
            committed: RwLock::new(HashMap::new()),
        }
    }

    /// Inactivity timeout in seconds.
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// Inactivity check granularity in seconds.
    pub fn period(&self) -> u64 {
        self.period
    }

    /// Returns the record for `id` if one exists. Never creates.
    pub fn query(&self, id: &str) -> Option<SharedRecord> {
        self.records.read().get(id).map(Arc::clone)
    }

    /// Returns the record for `id`, creating an empty one if needed.
    ///
    /// A freshly created record starts dirty so the next commit writes it
    /// even if the request stores nothing in it.
    pub fn get(&self, id: &str) -> SharedRecord {
        if let Some(record) = self.query(id) {
            return record;
        }

        let mut records = self.records.write();
        let record = records.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!(session_id = %id, "session record created");
            let mut record = SessionRecord::new();
            record.changed();
            Arc::new(Mutex::new(record))
        });
        Arc::clone(record)
    }

    /// Drops the record for `id`, along with its committed snapshot.
    pub fn remove(&self, id: &str) -> Option<SharedRecord> {
        self.committed.write().remove(id);
        self.records.write().remove(id)
    }

    /// Ids of all live records, in no particular order.
    pub fn ids(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Writes a snapshot of every dirty record and clears its dirty flag.
    ///
    /// Returns the number of records written. Records mutated in place
    /// without [`SessionRecord::changed`] stay clean and are skipped.
    ///
    /// The record map is only read long enough to copy out the handles.
    /// Waiting on a record that a request still holds therefore never
    /// blocks other requests from looking up or creating sessions.
    pub fn commit(&self) -> usize {
        let records: Vec<(String, SharedRecord)> = self
            .records
            .read()
            .iter()
            .map(|(id, record)| (id.clone(), Arc::clone(record)))
            .collect();

        let mut written = 0;
        for (id, record) in records {
            let mut record = record.lock();
            if record.take_dirty() {
                self.committed.write().insert(id, record.snapshot());
                written += 1;
            }
        }

        if written > 0 {
            tracing::debug!(written, "session records committed");
        }
        written
    }

    /// The data of `id` as of its last commit.
    pub fn committed(&self, id: &str) -> Option<HashMap<String, Value>> {
        self.committed.read().get(id).cloned()
    }
}

impl Persistent for SessionManager {
    fn commit(&self) -> usize {
        SessionManager::commit(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
