//! The session factory: turns a request into a session.
//!
//! For every request the factory:
//!
//! 1. opens a connection (named database first, if configured),
//! 2. finds the session manager in the root, installing one if absent,
//! 3. reads and verifies the session cookie,
//! 4. mints an id and schedules the `Set-Cookie` if there was no valid
//!    cookie,
//! 5. fetches the record for the id, creating it (and flagging the
//!    session as new) if it does not exist.
//!
//! ```text
//!  cookie? ──no──→ new id ──→ schedule Set-Cookie ──┐
//!     │                                             ▼
//!     └──yes──→ verify ──ok──→ id ──────────→ manager.query(id)
//!                 │                              │        │
//!                 └──bad──→ (treated as no)   found    missing
//!                                                │        │
//!                                           new=false  manager.get(id), new=true
//! ```

use std::sync::Arc;

use strongroom_signing::{CookieSigner, HmacSigner};
use strongroom_store::{Connection, ConnectionProvider, SessionManager, StoreError};

use crate::{
    IdGenerator, Request, Response, ResponseCallback, Session, SessionError,
    SessionFactoryConfig, SessionId,
};

/// Produces the [`Session`] for each request.
///
/// Build one at startup and share it; it holds no per-request state.
///
/// # Example
///
/// ```rust
/// use strongroom_session::{RequestContext, SessionFactory, SessionFactoryConfig};
/// use strongroom_store::MemoryDatabase;
///
/// let factory = SessionFactory::new(
///     SessionFactoryConfig::new("s3cret"),
///     MemoryDatabase::new(),
/// );
///
/// let mut request = RequestContext::new();
/// let session = factory.session(&mut request)?;
/// assert!(session.is_new());
/// assert_eq!(request.pending_callbacks(), 1);
/// # Ok::<(), strongroom_session::SessionError>(())
/// ```
pub struct SessionFactory<P, S = HmacSigner> {
    config: SessionFactoryConfig,
    provider: P,
    signer: Arc<S>,
    ids: Arc<IdGenerator>,
}

impl<P: ConnectionProvider> SessionFactory<P> {
    /// Creates a factory using HMAC-signed cookies and the process-wide
    /// id generator.
    pub fn new(config: SessionFactoryConfig, provider: P) -> Self {
        Self {
            config: config.validated(),
            provider,
            signer: Arc::new(HmacSigner),
            ids: IdGenerator::global(),
        }
    }
}

impl<P, S> SessionFactory<P, S>
where
    P: ConnectionProvider,
    S: CookieSigner,
{
    /// Replaces the cookie signer.
    pub fn with_signer<T: CookieSigner>(self, signer: T) -> SessionFactory<P, T> {
        SessionFactory {
            config: self.config,
            provider: self.provider,
            signer: Arc::new(signer),
            ids: self.ids,
        }
    }

    /// Replaces the id generator.
    pub fn with_id_generator(mut self, ids: Arc<IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &SessionFactoryConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Resolves the session for `request`.
    ///
    /// Registers at most one response callback on `request`, and only
    /// when a new session id was minted.
    ///
    /// # Errors
    /// Only storage failures ([`SessionError::Store`]). Bad cookies never
    /// produce an error.
    pub fn session<R>(&self, request: &mut R) -> Result<Session, SessionError>
    where
        R: Request + ?Sized,
    {
        let connection = self.connect()?;
        let manager = connection
            .root()
            .get_or_insert_with(&self.config.root_name, || {
                SessionManager::new(self.config.timeout, self.config.period)
            })?;

        let id = match self.cookie_session_id(request) {
            Some(id) => id,
            None => {
                let id = self.ids.new_session_id();
                self.schedule_cookie(request, &id);
                id
            }
        };

        let session = match manager.query(id.as_str()) {
            Some(record) => Session::new(id, record, false),
            None => {
                let record = manager.get(id.as_str());
                tracing::info!(session_id = %id, "session created");
                Session::new(id, record, true)
            }
        };
        Ok(session)
    }

    /// Opens a connection, falling back to the default database when the
    /// provider has no notion of named ones.
    fn connect(&self) -> Result<P::Connection, StoreError> {
        let Some(name) = &self.config.dbname else {
            return self.provider.get_connection();
        };

        match self.provider.get_named_connection(name) {
            Err(StoreError::NamedDatabasesUnsupported) => {
                tracing::debug!(
                    dbname = %name,
                    "provider has no named databases, using the default one"
                );
                self.provider.get_connection()
            }
            other => other,
        }
    }

    /// The session id carried by the request's cookie, if it is present,
    /// correctly signed and well formed.
    fn cookie_session_id<R>(&self, request: &R) -> Option<SessionId>
    where
        R: Request + ?Sized,
    {
        let cookie = &self.config.cookie.name;
        let token = request.cookie(cookie)?;

        let value = match self.signer.verify(token, &self.config.secret) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(%cookie, error = %e, "ignoring invalid session cookie");
                return None;
            }
        };

        let id = SessionId::parse(&value);
        if id.is_none() {
            tracing::debug!(%cookie, "signed session cookie does not hold a session id");
        }
        id
    }

    /// Registers the callback that sends the new id to the client.
    fn schedule_cookie<R>(&self, request: &mut R, id: &SessionId)
    where
        R: Request + ?Sized,
    {
        let signer = Arc::clone(&self.signer);
        let secret = self.config.secret.clone();
        let settings = self.config.cookie.clone();
        let id = id.clone();

        let callback = ResponseCallback::new(
            self.config.cookie_on_exception,
            move |response: &mut dyn Response| match signer.sign(id.as_str(), &secret) {
                Ok(value) => response.set_cookie(settings.set_cookie(value)),
                Err(e) => {
                    tracing::error!(
                        session_id = %id,
                        error = %e,
                        "cannot sign session cookie; response sent without it"
                    );
                }
            },
        );
        request.add_response_callback(callback);
    }
}
