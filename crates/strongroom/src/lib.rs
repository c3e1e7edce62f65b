//! # Strongroom
//!
//! Server-side sessions for web applications: the client keeps only a
//! signed session id in a cookie, and the session data lives in a
//! transactional object store.
//!
//! The framework calls [`SessionFactory::session`] once per request. The
//! factory verifies the cookie, finds or creates the [`SessionRecord`], and
//! if it minted a new id, schedules the `Set-Cookie` on the request so it
//! is applied when the response goes out.
//!
//! ## Quick Start
//!
//! ```rust
//! use strongroom::prelude::*;
//!
//! let db = MemoryDatabase::new();
//! let factory = SessionFactory::new(SessionFactoryConfig::new("s3cret"), db.clone());
//!
//! // First request: no cookie, so a new session and a Set-Cookie.
//! let mut request = RequestContext::new();
//! let session = factory.session(&mut request)?;
//! session.flash("Saved!");
//! let mut response = CookieSink::default();
//! request.finalize(&mut response, false);
//! db.connect().commit();
//!
//! // Second request: the browser sends the cookie back.
//! let cookie = &response.get("session_id").unwrap().value;
//! let mut request = RequestContext::new().with_cookie("session_id", cookie.as_str());
//! let session = factory.session(&mut request)?;
//! assert!(!session.is_new());
//! assert_eq!(session.pop_flash(""), vec!["Saved!"]);
//! # Ok::<(), StrongroomError>(())
//! ```

mod error;

pub use error::StrongroomError;

pub use strongroom_record::{CSRF_TOKEN_KEY, FLASH_KEY_PREFIX, RecordError, SessionRecord};
pub use strongroom_session::{
    CookieSettings, CookieSink, IdGenerator, Request, RequestContext, Response,
    ResponseCallback, Session, SessionError, SessionFactory, SessionFactoryConfig, SessionId,
    SetCookie, new_session_id,
};
pub use strongroom_signing::{
    CookieSigner, HmacSigner, SigningError, signed_deserialize, signed_serialize,
};
pub use strongroom_store::{
    Connection, ConnectionProvider, MemoryConnection, MemoryDatabase, MemoryDatabases,
    Persistent, Root, SessionManager, SharedRecord, StoreError,
};

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, or by
/// `default_directive` when `RUST_LOG` is unset or invalid.
///
/// # Errors
/// Fails if `default_directive` does not parse or a global subscriber is
/// already installed.
pub fn init_tracing(
    default_directive: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(default_directive)?,
    };

    tracing_subscriber::fmt().with_env_filter(filter).try_init()?;
    tracing::debug!(default_directive, "tracing initialised");
    Ok(())
}

pub mod prelude {
    //! Everything a web integration usually needs.

    pub use crate::{
        Connection, ConnectionProvider, CookieSink, MemoryDatabase, MemoryDatabases,
        Request, RequestContext, Response, Session, SessionFactory, SessionFactoryConfig,
        StrongroomError,
    };
}
