//! The session record: a dirty-tracked key/value map plus the flash and
//! CSRF helpers that live inside it.

use std::collections::HashMap;
use std::collections::hash_map;

use rand::Rng;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::RecordError;

/// Prefix of every flash queue key. The default queue (`""`) lives under
/// `_f_`, a queue named `error` under `_f_error`.
pub const FLASH_KEY_PREFIX: &str = "_f_";

/// Key under which the session's CSRF token is cached.
pub const CSRF_TOKEN_KEY: &str = "_csrft_";

/// Number of random bytes in a CSRF token (hex-encoded to 40 characters).
const CSRF_TOKEN_BYTES: usize = 20;

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// Everything the server remembers about one client.
///
/// Values are stored as [`serde_json::Value`] so that a record can hold
/// anything serializable and still be written out by the storage layer
/// without knowing the application's types. Use [`get`](Self::get) and
/// [`set`](Self::set) for typed access.
///
/// The `dirty` flag is runtime bookkeeping for the storage layer and is
/// never serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRecord {
    data: HashMap<String, Value>,

    #[serde(skip)]
    dirty: bool,
}

impl SessionRecord {
    /// Creates an empty, clean record.
    pub fn new() -> Self {
        Self::default()
    }

    // -- Mapping access ---------------------------------------------------

    /// Returns the raw value stored under `key`.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns a mutable reference to the value under `key`.
    ///
    /// This does **not** mark the record dirty. After changing the value,
    /// call [`changed`](Self::changed) or the change will not be persisted.
    pub fn get_value_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.data.get_mut(key)
    }

    /// Reads the value under `key` as a `T`.
    ///
    /// Returns `Ok(None)` when the key is absent.
    ///
    /// # Errors
    /// [`RecordError::Decode`] if the stored JSON is not a valid `T`.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, RecordError> {
        self.data
            .get(key)
            .map(|value| {
                T::deserialize(value).map_err(|source| RecordError::Decode {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Stores a raw value under `key`, returning the previous one.
    /// Marks the record dirty.
    pub fn insert_value(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Option<Value> {
        self.dirty = true;
        self.data.insert(key.into(), value)
    }

    /// Serializes `value` and stores it under `key`. Marks the record dirty.
    ///
    /// # Errors
    /// [`RecordError::Encode`] if `value` cannot be represented as JSON.
    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), RecordError> {
        let value = serde_json::to_value(value).map_err(RecordError::Encode)?;
        self.insert_value(key, value);
        Ok(())
    }

    /// Removes `key`, returning its value. Marks the record dirty only if
    /// something was actually removed.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Iterates over the keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Iterates over `(key, value)` pairs, in no particular order.
    pub fn iter(&self) -> hash_map::Iter<'_, String, Value> {
        self.data.iter()
    }

    /// Number of stored keys, reserved keys included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes every key. Marks the record dirty if it was not empty.
    pub fn clear(&mut self) {
        if !self.data.is_empty() {
            self.data.clear();
            self.dirty = true;
        }
    }

    /// Copies the stored data, e.g. for the storage layer to write out.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.data.clone()
    }

    // -- Persistence bookkeeping ------------------------------------------

    /// Marks the record as modified.
    ///
    /// Needed after in-place mutation of a stored value, which the record
    /// cannot observe by itself.
    pub fn changed(&mut self) {
        self.dirty = true;
    }

    /// Returns `true` if the record has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag and returns its previous value.
    ///
    /// Called by the storage layer when it writes the record.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    // -- Flash messages ---------------------------------------------------

    /// Queues `message` on the default flash queue, duplicates allowed.
    pub fn flash(&mut self, message: impl Into<String>) {
        self.flash_to("", message, true);
    }

    /// Queues `message` on `queue`.
    ///
    /// When `allow_duplicate` is `false` the message is dropped if an equal
    /// message is already waiting in that queue.
    pub fn flash_to(
        &mut self,
        queue: &str,
        message: impl Into<String>,
        allow_duplicate: bool,
    ) {
        let key = flash_key(queue);
        let message = message.into();

        if !matches!(self.data.get(&key), Some(Value::Array(_))) {
            if self.data.contains_key(&key) {
                tracing::warn!(%key, "flash queue holds a non-list value, replacing it");
            }
            self.insert_value(key.clone(), Value::Array(Vec::new()));
        }

        if let Some(Value::Array(messages)) = self.data.get_mut(&key) {
            let duplicate =
                messages.iter().any(|m| m.as_str() == Some(message.as_str()));
            if allow_duplicate || !duplicate {
                messages.push(Value::String(message));
                self.dirty = true;
            }
        }
    }

    /// Removes and returns every message in `queue`.
    ///
    /// The queue key is gone afterwards. An absent queue yields an empty
    /// vec.
    pub fn pop_flash(&mut self, queue: &str) -> Vec<String> {
        let key = flash_key(queue);
        self.remove(&key)
            .map(|value| queue_messages(&key, &value))
            .unwrap_or_default()
    }

    /// Returns the messages in `queue` without consuming them.
    pub fn peek_flash(&self, queue: &str) -> Vec<String> {
        let key = flash_key(queue);
        self.data
            .get(&key)
            .map(|value| queue_messages(&key, value))
            .unwrap_or_default()
    }

    // -- CSRF tokens ------------------------------------------------------

    /// Generates a fresh CSRF token, stores it and returns it.
    ///
    /// Any previous token is replaced, so forms rendered with the old one
    /// will no longer validate.
    pub fn new_csrf_token(&mut self) -> String {
        let token = generate_csrf_token();
        self.insert_value(CSRF_TOKEN_KEY, Value::String(token.clone()));
        token
    }

    /// Returns the session's CSRF token, creating one on first use.
    pub fn get_csrf_token(&mut self) -> String {
        match self.data.get(CSRF_TOKEN_KEY) {
            Some(Value::String(token)) => token.clone(),
            Some(_) => {
                tracing::warn!("stored CSRF token is not a string, regenerating");
                self.new_csrf_token()
            }
            None => self.new_csrf_token(),
        }
    }
}

fn flash_key(queue: &str) -> String {
    format!("{FLASH_KEY_PREFIX}{queue}")
}

/// Extracts the string messages of a flash queue value.
fn queue_messages(key: &str, value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => {
            tracing::warn!(%key, "flash queue holds a non-list value, ignoring it");
            Vec::new()
        }
    }
}

/// 20 bytes from the thread-local CSPRNG, lowercase hex.
fn generate_csrf_token() -> String {
    let bytes: [u8; CSRF_TOKEN_BYTES] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
