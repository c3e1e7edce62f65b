//! Error types for the store layer.

/// Errors raised by connection providers and storage roots.
///
/// The session factory recovers from [`NamedDatabasesUnsupported`]
/// by retrying without a name; everything else propagates to the caller.
///
/// [`NamedDatabasesUnsupported`]: StoreError::NamedDatabasesUnsupported
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The provider only knows one, unnamed database.
    #[error("connection provider does not support named databases")]
    NamedDatabasesUnsupported,

    /// The provider supports names but has no database by this one.
    #[error("unknown database {0:?}")]
    UnknownDatabase(String),

    /// A root entry exists under `key` but is not the expected type.
    #[error("root entry {key:?} is not a {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
    },
}
