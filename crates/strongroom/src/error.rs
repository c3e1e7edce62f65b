//! Unified error type for Strongroom.

use strongroom_record::RecordError;
use strongroom_session::SessionError;
use strongroom_signing::SigningError;
use strongroom_store::StoreError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum StrongroomError {
    /// A cookie could not be signed or verified.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// A session value could not be encoded or decoded.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The object store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session factory failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}
