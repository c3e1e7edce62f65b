//! Error types for the session layer.

use strongroom_store::StoreError;

/// Errors the session factory can return.
///
/// Cookie problems are deliberately absent: a missing, forged or stale
/// cookie just gets the client a fresh session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The storage layer failed. Passed through unchanged so the framework
    /// can decide whether to retry the request.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The factory configuration could not be parsed.
    #[error("invalid session configuration: {0}")]
    Config(#[from] serde_json::Error),
}
