//! The storage root: named, shared, persistent top-level objects.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::StoreError;

/// An object that can live in a [`Root`].
///
/// `commit` writes the object's pending changes and reports how many
/// sub-objects were written. `into_any` lets the root hand entries back
/// as their concrete type.
pub trait Persistent: Send + Sync + 'static {
    /// Persists pending changes, returning the number of objects written.
    fn commit(&self) -> usize;

    /// Converts the shared object into `Any` for downcasting.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// The top-level mapping of a database.
///
/// Every connection to the same database sees the same root. Entries are
/// shared (`Arc`), so an object fetched by one request is the same object
/// another request fetches.
#[derive(Default)]
pub struct Root {
    entries: RwLock<HashMap<String, Arc<dyn Persistent>>>,
}

impl Root {
    /// Creates an empty root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the entry under `key` as a `T`.
    ///
    /// # Errors
    /// [`StoreError::TypeMismatch`] if the entry exists but is not a `T`.
    pub fn get<T: Persistent>(
        &self,
        key: &str,
    ) -> Result<Option<Arc<T>>, StoreError> {
        let entries = self.entries.read();
        entries
            .get(key)
            .map(|entry| downcast::<T>(key, Arc::clone(entry)))
            .transpose()
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn insert<T: Persistent>(&self, key: impl Into<String>, value: Arc<T>) {
        let value: Arc<dyn Persistent> = value;
        self.entries.write().insert(key.into(), value);
    }

    /// Returns the `T` under `key`, creating it with `make` if absent.
    ///
    /// The check and the insert happen under one write lock, so when two
    /// requests race on an empty root exactly one `make` result is kept
    /// and both callers get it.
    ///
    /// # Errors
    /// [`StoreError::TypeMismatch`] if the entry exists but is not a `T`.
    pub fn get_or_insert_with<T: Persistent>(
        &self,
        key: &str,
        make: impl FnOnce() -> T,
    ) -> Result<Arc<T>, StoreError> {
        // Fast path: most requests find the object already there.
        if let Some(existing) = self.get::<T>(key)? {
            return Ok(existing);
        }

        let mut entries = self.entries.write();
        match entries.entry(key.to_string()) {
            Entry::Occupied(entry) => downcast::<T>(key, Arc::clone(entry.get())),
            Entry::Vacant(slot) => {
                let value = Arc::new(make());
                let shared: Arc<dyn Persistent> = value.clone();
                slot.insert(shared);
                tracing::info!(%key, kind = type_name::<T>(), "root object installed");
                Ok(value)
            }
        }
    }

    /// Returns `true` if an entry exists under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Commits every entry, returning the total number of objects written.
    pub fn commit(&self) -> usize {
        self.entries.read().values().map(|entry| entry.commit()).sum()
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        f.debug_struct("Root")
            .field("keys", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn downcast<T: Persistent>(
    key: &str,
    entry: Arc<dyn Persistent>,
) -> Result<Arc<T>, StoreError> {
    entry
        .into_any()
        .downcast::<T>()
        .map_err(|_| StoreError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
        })
}
