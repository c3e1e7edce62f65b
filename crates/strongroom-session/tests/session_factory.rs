//! Integration tests for the session factory: full request flows against an
//! in-memory database.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use strongroom_signing::{CookieSigner, SigningError, signed_deserialize, signed_serialize};
use strongroom_store::{
    Connection, ConnectionProvider, MemoryDatabase, MemoryDatabases, Persistent,
    SessionManager, StoreError,
};
use strongroom_session::{
    CookieSink, IdGenerator, Request, RequestContext, SessionError, SessionFactory,
    SessionFactoryConfig,
};

// =========================================================================
// Helpers
// =========================================================================

fn factory(db: &MemoryDatabase) -> SessionFactory<MemoryDatabase> {
    SessionFactory::new(SessionFactoryConfig::new("secret"), db.clone())
}

fn manager(db: &MemoryDatabase) -> Arc<SessionManager> {
    db.root()
        .get::<SessionManager>("sessions")
        .unwrap()
        .expect("factory installs the manager")
}

/// Runs one request without a cookie and returns the cookie the client
/// would store.
fn first_visit(factory: &SessionFactory<MemoryDatabase>) -> String {
    let mut request = RequestContext::new();
    factory.session(&mut request).unwrap();
    let mut response = CookieSink::default();
    request.finalize(&mut response, false);
    response.get("session_id").unwrap().value.clone()
}

// =========================================================================
// Manager installation
// =========================================================================

#[test]
fn test_session_no_manager_installs_one() {
    let db = MemoryDatabase::new();
    let factory = SessionFactory::new(
        SessionFactoryConfig {
            timeout: 10,
            period: 5,
            ..SessionFactoryConfig::new("secret")
        },
        db.clone(),
    );

    factory.session(&mut RequestContext::new()).unwrap();

    let mgr = manager(&db);
    assert_eq!(mgr.timeout(), 10);
    assert_eq!(mgr.period(), 5);
    assert_eq!(mgr.len(), 1);
}

#[test]
fn test_session_existing_manager_is_reused() {
    let db = MemoryDatabase::new();
    let existing = Arc::new(SessionManager::new(10, 5));
    db.root().insert("sessions", Arc::clone(&existing));

    factory(&db).session(&mut RequestContext::new()).unwrap();

    assert!(Arc::ptr_eq(&manager(&db), &existing));
    assert_eq!(existing.len(), 1);
}

#[test]
fn test_session_custom_root_name() {
    let db = MemoryDatabase::new();
    let factory = SessionFactory::new(
        SessionFactoryConfig {
            root_name: "web_sessions".into(),
            ..SessionFactoryConfig::new("secret")
        },
        db.clone(),
    );

    factory.session(&mut RequestContext::new()).unwrap();

    assert!(db.root().contains_key("web_sessions"));
    assert!(!db.root().contains_key("sessions"));
}

#[test]
fn test_session_root_entry_of_wrong_type_propagates_error() {
    struct NotAManager;
    impl Persistent for NotAManager {
        fn commit(&self) -> usize {
            0
        }
        fn into_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
            self
        }
    }

    let db = MemoryDatabase::new();
    db.root().insert("sessions", Arc::new(NotAManager));

    let result = factory(&db).session(&mut RequestContext::new());

    assert!(matches!(
        result,
        Err(SessionError::Store(StoreError::TypeMismatch { .. }))
    ));
}

// =========================================================================
// Named databases
// =========================================================================

#[test]
fn test_session_named_database_is_used() {
    let dbs = MemoryDatabases::new().with_database("sessions_db");
    let factory = SessionFactory::new(
        SessionFactoryConfig {
            dbname: Some("sessions_db".into()),
            ..SessionFactoryConfig::new("secret")
        },
        dbs.clone(),
    );

    factory.session(&mut RequestContext::new()).unwrap();

    assert!(dbs.database("sessions_db").unwrap().root().contains_key("sessions"));
    assert!(!dbs.default_database().root().contains_key("sessions"));
}

#[test]
fn test_session_named_database_unsupported_falls_back_to_default() {
    let db = MemoryDatabase::new();
    let factory = SessionFactory::new(
        SessionFactoryConfig {
            dbname: Some("sessions_db".into()),
            ..SessionFactoryConfig::new("secret")
        },
        db.clone(),
    );

    let session = factory.session(&mut RequestContext::new());

    assert!(session.is_ok());
    assert!(db.root().contains_key("sessions"));
}

#[test]
fn test_session_named_lookup_counts_calls() {
    /// Records which entry point the factory used.
    #[derive(Clone, Default)]
    struct Counting {
        db: MemoryDatabase,
        named: Arc<AtomicUsize>,
        unnamed: Arc<AtomicUsize>,
    }

    impl ConnectionProvider for Counting {
        type Connection = <MemoryDatabase as ConnectionProvider>::Connection;

        fn get_connection(&self) -> Result<Self::Connection, StoreError> {
            self.unnamed.fetch_add(1, Ordering::SeqCst);
            self.db.get_connection()
        }

        fn get_named_connection(&self, name: &str) -> Result<Self::Connection, StoreError> {
            self.named.fetch_add(1, Ordering::SeqCst);
            assert_eq!(name, "main");
            self.db.get_connection()
        }
    }

    let provider = Counting::default();
    let unnamed_factory =
        SessionFactory::new(SessionFactoryConfig::new("secret"), provider.clone());
    let named_factory = SessionFactory::new(
        SessionFactoryConfig {
            dbname: Some("main".into()),
            ..SessionFactoryConfig::new("secret")
        },
        provider.clone(),
    );

    unnamed_factory.session(&mut RequestContext::new()).unwrap();
    named_factory.session(&mut RequestContext::new()).unwrap();

    assert_eq!(provider.unnamed.load(Ordering::SeqCst), 1);
    assert_eq!(provider.named.load(Ordering::SeqCst), 1);
    assert_eq!(provider.db.root().commit(), 2);
}

// =========================================================================
// No cookie / bad cookie
// =========================================================================

#[test]
fn test_session_no_cookie_creates_new_session_and_one_callback() {
    let db = MemoryDatabase::new();
    let mut request = RequestContext::new();

    let session = factory(&db).session(&mut request).unwrap();

    assert!(session.is_new());
    assert_eq!(request.pending_callbacks(), 1);

    let mut response = CookieSink::default();
    assert_eq!(request.finalize(&mut response, false), 1);

    let cookie = response.get("session_id").expect("cookie set");
    let value: String = signed_deserialize(&cookie.value, "secret").unwrap();
    assert_eq!(value, session.id().as_str());
    assert_eq!(response.cookies().len(), 1);
}

#[test]
fn test_session_callback_applies_cookie_attributes() {
    let db = MemoryDatabase::new();
    let mut config = SessionFactoryConfig::new("secret");
    config.cookie.name = "sid".into();
    config.cookie.max_age = Some(3600);
    config.cookie.path = "/app".into();
    config.cookie.domain = Some("example.com".into());
    config.cookie.secure = true;
    config.cookie.http_only = true;
    let factory = SessionFactory::new(config, db.clone());
    let mut request = RequestContext::new();

    factory.session(&mut request).unwrap();
    let mut response = CookieSink::default();
    request.finalize(&mut response, false);

    let cookie = response.get("sid").unwrap();
    assert_eq!(cookie.max_age, Some(3600));
    assert_eq!(cookie.path, "/app");
    assert_eq!(cookie.domain.as_deref(), Some("example.com"));
    assert!(cookie.secure);
    assert!(cookie.http_only);
}

#[test]
fn test_session_garbage_cookie_behaves_like_no_cookie() {
    let db = MemoryDatabase::new();
    let mut request = RequestContext::new().with_cookie("session_id", "wtf");

    let session = factory(&db).session(&mut request).unwrap();

    assert!(session.is_new());
    assert_eq!(request.pending_callbacks(), 1);
    let mut response = CookieSink::default();
    request.finalize(&mut response, false);
    let value: String =
        signed_deserialize(&response.get("session_id").unwrap().value, "secret").unwrap();
    assert_eq!(value, session.id().as_str());
}

#[test]
fn test_session_wrong_secret_cookie_behaves_like_no_cookie() {
    let db = MemoryDatabase::new();
    let other = SessionFactory::new(SessionFactoryConfig::new("other-secret"), db.clone());
    let foreign_cookie = first_visit(&other);
    let foreign_id: String = signed_deserialize(&foreign_cookie, "other-secret").unwrap();
    let mut request = RequestContext::new().with_cookie("session_id", foreign_cookie);

    let session = factory(&db).session(&mut request).unwrap();

    assert!(session.is_new());
    assert_ne!(session.id().as_str(), foreign_id);
    assert_eq!(request.pending_callbacks(), 1);
}

// =========================================================================
// Valid cookie
// =========================================================================

#[test]
fn test_session_valid_cookie_existing_record_returns_same_record() {
    let db = MemoryDatabase::new();
    let factory = factory(&db);
    let mut first = RequestContext::new();
    let created = factory.session(&mut first).unwrap();
    created.flash("welcome");
    let mut response = CookieSink::default();
    first.finalize(&mut response, false);
    let cookie = response.get("session_id").unwrap().value.clone();

    let mut second = RequestContext::new().with_cookie("session_id", cookie);
    let resumed = factory.session(&mut second).unwrap();

    assert!(!resumed.is_new());
    assert!(resumed.same_record(&created));
    assert_eq!(resumed.id(), created.id());
    assert_eq!(second.pending_callbacks(), 0);
    assert_eq!(resumed.pop_flash(""), vec!["welcome"]);
}

#[test]
fn test_session_valid_cookie_unknown_id_reuses_id_as_new() {
    let db = MemoryDatabase::new();
    let id = IdGenerator::new().new_session_id();
    let cookie = signed_serialize(&id.as_str(), "secret").unwrap();
    let mut request = RequestContext::new().with_cookie("session_id", cookie);

    let session = factory(&db).session(&mut request).unwrap();

    assert!(session.is_new());
    assert_eq!(session.id(), &id);
    assert_eq!(request.pending_callbacks(), 0, "client already holds this id");
    assert!(manager(&db).query(id.as_str()).is_some());
}

#[test]
fn test_session_quoted_cookie_header_resumes_session() {
    let db = MemoryDatabase::new();
    let factory = factory(&db);
    let mut first = RequestContext::new();
    let created = factory.session(&mut first).unwrap();
    let mut response = CookieSink::default();
    first.finalize(&mut response, false);
    let token = &response.get("session_id").unwrap().value;

    let mut second =
        RequestContext::from_cookie_header(&format!("theme=dark; session_id=\"{token}\""));
    let resumed = factory.session(&mut second).unwrap();

    assert!(!resumed.is_new());
    assert!(resumed.same_record(&created));
    assert_eq!(second.pending_callbacks(), 0);
}

#[test]
fn test_session_new_flag_is_per_request() {
    let db = MemoryDatabase::new();
    let factory = factory(&db);
    let cookie = first_visit(&factory);

    for _ in 0..3 {
        let mut request = RequestContext::new().with_cookie("session_id", cookie.clone());
        let session = factory.session(&mut request).unwrap();
        assert!(!session.is_new());
    }
}

#[test]
fn test_session_external_expiry_recreates_record_as_new() {
    let db = MemoryDatabase::new();
    let factory = factory(&db);
    let cookie = first_visit(&factory);
    let id: String = signed_deserialize(&cookie, "secret").unwrap();

    manager(&db).remove(&id);
    let mut request = RequestContext::new().with_cookie("session_id", cookie);
    let session = factory.session(&mut request).unwrap();

    assert!(session.is_new());
    assert_eq!(session.id().as_str(), id);
    assert_eq!(request.pending_callbacks(), 0);
}

// =========================================================================
// Id generator and signer injection
// =========================================================================

#[test]
fn test_session_uses_injected_id_generator() {
    let db = MemoryDatabase::new();
    let ids = Arc::new(
        IdGenerator::with_seed(1).with_clock(|| Duration::from_secs(1_700_000_000)),
    );
    let factory = factory(&db).with_id_generator(Arc::clone(&ids));

    factory.session(&mut RequestContext::new()).unwrap();
    factory.session(&mut RequestContext::new()).unwrap();

    assert_eq!(ids.issued_in_bucket(), 2);
    assert_eq!(manager(&db).len(), 2);
}

#[test]
fn test_session_uses_injected_signer() {
    /// Signs by prefixing the secret. Only for exercising the seam.
    struct PrefixSigner;

    impl CookieSigner for PrefixSigner {
        fn sign(&self, value: &str, secret: &str) -> Result<String, SigningError> {
            Ok(format!("{secret}:{value}"))
        }

        fn verify(&self, token: &str, secret: &str) -> Result<String, SigningError> {
            token
                .strip_prefix(&format!("{secret}:"))
                .map(str::to_string)
                .ok_or(SigningError::BadSignature)
        }
    }

    let db = MemoryDatabase::new();
    let factory = factory(&db).with_signer(PrefixSigner);
    let mut request = RequestContext::new();
    let created = factory.session(&mut request).unwrap();
    let mut response = CookieSink::default();
    request.finalize(&mut response, false);

    let cookie = response.get("session_id").unwrap().value.clone();
    assert_eq!(cookie, format!("secret:{}", created.id()));

    let mut again = RequestContext::new().with_cookie("session_id", cookie);
    let resumed = factory.session(&mut again).unwrap();
    assert!(resumed.same_record(&created));
}

#[test]
fn test_session_signing_failure_sends_response_without_cookie() {
    /// A signer whose key is always rejected.
    struct BrokenKeySigner;

    impl CookieSigner for BrokenKeySigner {
        fn sign(&self, _value: &str, _secret: &str) -> Result<String, SigningError> {
            Err(SigningError::InvalidKey)
        }

        fn verify(&self, _token: &str, _secret: &str) -> Result<String, SigningError> {
            Err(SigningError::InvalidKey)
        }
    }

    let db = MemoryDatabase::new();
    let factory = factory(&db).with_signer(BrokenKeySigner);
    let mut request = RequestContext::new();
    let session = factory.session(&mut request).unwrap();
    assert!(session.is_new());

    let mut response = CookieSink::default();
    assert_eq!(request.finalize(&mut response, false), 1);

    assert!(response.cookies().is_empty());
    assert!(manager(&db).query(session.id().as_str()).is_some());
}

// =========================================================================
// cookie_on_exception
// =========================================================================

#[test]
fn test_session_cookie_on_exception_true_sets_cookie_on_error() {
    let db = MemoryDatabase::new();
    let mut request = RequestContext::new();
    factory(&db).session(&mut request).unwrap();

    let mut response = CookieSink::default();
    request.finalize(&mut response, true);

    assert!(response.get("session_id").is_some());
}

#[test]
fn test_session_cookie_on_exception_false_skips_cookie_on_error() {
    let db = MemoryDatabase::new();
    let factory = SessionFactory::new(
        SessionFactoryConfig {
            cookie_on_exception: false,
            ..SessionFactoryConfig::new("secret")
        },
        db.clone(),
    );
    let mut request = RequestContext::new();
    factory.session(&mut request).unwrap();

    let mut response = CookieSink::default();
    assert_eq!(request.finalize(&mut response, true), 0);

    assert!(response.cookies().is_empty());
}

// =========================================================================
// Persistence across requests
// =========================================================================

#[test]
fn test_session_changes_are_committed_through_connection() {
    let db = MemoryDatabase::new();
    let factory = factory(&db);
    let mut request = RequestContext::new();
    let session = factory.session(&mut request).unwrap();
    session.lock().set("user", "alice").unwrap();
    let csrf = session.get_csrf_token();

    assert_eq!(db.connect().commit(), 1);

    let saved = manager(&db).committed(session.id().as_str()).unwrap();
    assert_eq!(saved["user"], "alice");
    assert_eq!(saved["_csrft_"], csrf.as_str());
}

#[test]
fn test_session_concurrent_first_visits_get_distinct_sessions() {
    let db = MemoryDatabase::new();
    let factory = factory(&db);
    let factory = &factory;

    let ids: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(move || {
                    let mut request = RequestContext::new();
                    let session = factory.session(&mut request).unwrap();
                    assert!(session.is_new());
                    session.id().to_string()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 8);
    assert_eq!(manager(&db).len(), 8);
}

#[test]
fn test_request_trait_object_is_accepted() {
    let db = MemoryDatabase::new();
    let mut request = RequestContext::new();
    let request: &mut dyn Request = &mut request;

    let session = factory(&db).session(request).unwrap();

    assert!(session.is_new());
}
