//! Session factory configuration.

use std::fmt;

use serde::Deserialize;

use crate::{SessionError, SetCookie};

// ---------------------------------------------------------------------------
// CookieSettings
// ---------------------------------------------------------------------------

/// Attributes of the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    /// Cookie name. Default: `session_id`.
    pub name: String,

    /// Lifetime in seconds. Default: `None` (browser session).
    pub max_age: Option<u64>,

    /// Default: `/`.
    pub path: String,

    /// Default: `None` (host-only cookie).
    pub domain: Option<String>,

    pub secure: bool,

    pub http_only: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "session_id".to_string(),
            max_age: None,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: false,
        }
    }
}

impl CookieSettings {
    /// Builds a [`SetCookie`] with these attributes and the given value.
    pub fn set_cookie(&self, value: String) -> SetCookie {
        SetCookie {
            name: self.name.clone(),
            value,
            max_age: self.max_age,
            path: self.path.clone(),
            domain: self.domain.clone(),
            secure: self.secure,
            http_only: self.http_only,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionFactoryConfig
// ---------------------------------------------------------------------------

/// Everything a [`SessionFactory`](crate::SessionFactory) is configured
/// with. Fixed for the factory's lifetime.
///
/// Only `secret` is required; override other fields with struct update
/// syntax:
///
/// ```rust
/// use strongroom_session::SessionFactoryConfig;
///
/// let config = SessionFactoryConfig {
///     timeout: 3600,
///     dbname: Some("sessions".into()),
///     ..SessionFactoryConfig::new("s3cret")
/// };
/// assert_eq!(config.period, 300);
/// ```
#[derive(Clone, Deserialize)]
pub struct SessionFactoryConfig {
    /// Key used to sign session cookies.
    pub secret: String,

    /// Seconds of inactivity before a session times out. Default: 1200.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Granularity of inactivity checking, in seconds. Should be lower
    /// than `timeout`. Default: 300.
    #[serde(default = "default_period")]
    pub period: u64,

    #[serde(default)]
    pub cookie: CookieSettings,

    /// Set the session cookie even when the request ends in an error.
    /// Default: `true`.
    #[serde(default = "default_true")]
    pub cookie_on_exception: bool,

    /// Database to ask the connection provider for. `None` uses the
    /// provider's default database.
    #[serde(default)]
    pub dbname: Option<String>,

    /// Root key under which the session manager is stored.
    /// Default: `sessions`.
    #[serde(default = "default_root_name")]
    pub root_name: String,
}

fn default_timeout() -> u64 {
    1200
}

fn default_period() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_root_name() -> String {
    "sessions".to_string()
}

impl SessionFactoryConfig {
    /// A configuration with the given secret and default everything else.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            timeout: default_timeout(),
            period: default_period(),
            cookie: CookieSettings::default(),
            cookie_on_exception: true,
            dbname: None,
            root_name: default_root_name(),
        }
    }

    /// Parses a JSON configuration object. Only `secret` is required.
    ///
    /// # Errors
    /// [`SessionError::Config`] if the JSON is malformed or lacks `secret`.
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Logs a warning for each setting that is legal but probably a
    /// mistake. Values are left as they are.
    ///
    /// Called automatically by the factory constructor.
    pub fn validated(self) -> Self {
        if self.secret.is_empty() {
            tracing::warn!("session secret is empty; cookies can be forged");
        }
        if self.period >= self.timeout {
            tracing::warn!(
                timeout = self.timeout,
                period = self.period,
                "session check period should be lower than the timeout"
            );
        }
        if self.cookie.name.is_empty() {
            tracing::warn!("session cookie name is empty");
        }
        self
    }
}

/// Hand-written so the secret never ends up in logs.
impl fmt::Debug for SessionFactoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFactoryConfig")
            .field("secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("period", &self.period)
            .field("cookie", &self.cookie)
            .field("cookie_on_exception", &self.cookie_on_exception)
            .field("dbname", &self.dbname)
            .field("root_name", &self.root_name)
            .finish()
    }
}
