//! Error types for the record layer.

/// Errors from the typed accessors of a [`SessionRecord`](crate::SessionRecord).
///
/// The untyped map operations and the flash/CSRF helpers never fail; only
/// converting between a Rust type and the stored JSON can.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// A value could not be turned into JSON for storage.
    #[error("cannot store value: {0}")]
    Encode(serde_json::Error),

    /// The value stored under `key` is not of the requested type.
    #[error("value under {key:?} has unexpected shape: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
