//! Request/response seams and a ready-made per-request context.
//!
//! Strongroom does not speak HTTP. It needs exactly two things from the
//! framework it is embedded in:
//!
//! - read a cookie from the incoming request ([`Request::cookie`]),
//! - run some code once the response exists, to set a cookie
//!   ([`Request::add_response_callback`] and [`Response::set_cookie`]).
//!
//! [`RequestContext`] and [`CookieSink`] implement those seams for
//! frameworks without their own, and for tests.

use std::collections::HashMap;
use std::fmt;

use cookie::Cookie;
use cookie::time::Duration;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// The incoming request, as far as sessions are concerned.
pub trait Request {
    /// The value of cookie `name`, if the client sent one.
    fn cookie(&self, name: &str) -> Option<&str>;

    /// Registers work to run when the response is being finalized.
    fn add_response_callback(&mut self, callback: ResponseCallback);
}

/// The outgoing response, as far as sessions are concerned.
pub trait Response {
    /// Adds a `Set-Cookie` to the response.
    fn set_cookie(&mut self, cookie: SetCookie);
}

// ---------------------------------------------------------------------------
// ResponseCallback
// ---------------------------------------------------------------------------

/// Deferred work registered on a request.
///
/// `run_on_error` tells the framework whether to still run the callback
/// when request handling failed and an error response is produced.
pub struct ResponseCallback {
    run_on_error: bool,
    callback: Box<dyn FnOnce(&mut dyn Response) + Send>,
}

impl ResponseCallback {
    pub fn new(
        run_on_error: bool,
        callback: impl FnOnce(&mut dyn Response) + Send + 'static,
    ) -> Self {
        Self {
            run_on_error,
            callback: Box::new(callback),
        }
    }

    /// Whether this callback also runs for error responses.
    pub fn runs_on_error(&self) -> bool {
        self.run_on_error
    }

    /// Runs the callback. Consumes it, so it can only run once.
    pub fn invoke(self, response: &mut dyn Response) {
        (self.callback)(response);
    }
}

impl fmt::Debug for ResponseCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCallback")
            .field("run_on_error", &self.run_on_error)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SetCookie
// ---------------------------------------------------------------------------

/// A cookie to set on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    /// Lifetime in seconds. `None` means a browser-session cookie.
    pub max_age: Option<u64>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl SetCookie {
    /// Builds the equivalent [`Cookie`], attributes included.
    ///
    /// An empty `path` leaves the attribute off, so the browser falls back
    /// to the request path's directory.
    pub fn to_cookie(&self) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), self.value.clone()))
            .secure(self.secure)
            .http_only(self.http_only);
        if !self.path.is_empty() {
            builder = builder.path(self.path.clone());
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(max_age) = self.max_age {
            let secs = i64::try_from(max_age).unwrap_or(i64::MAX);
            builder = builder.max_age(Duration::seconds(secs));
        }
        builder.build()
    }

    /// Renders the value of a `Set-Cookie` header.
    pub fn to_header_value(&self) -> String {
        self.to_cookie().to_string()
    }
}

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

/// A minimal [`Request`]: the request's cookies plus the callbacks
/// registered while handling it.
///
/// ```rust
/// use strongroom_session::{CookieSink, Request, RequestContext};
///
/// let mut request = RequestContext::from_cookie_header("a=1; theme=dark");
/// assert_eq!(request.cookie("theme"), Some("dark"));
///
/// let mut response = CookieSink::default();
/// assert_eq!(request.finalize(&mut response, false), 0);
/// ```
#[derive(Debug, Default)]
pub struct RequestContext {
    cookies: HashMap<String, String>,
    callbacks: Vec<ResponseCallback>,
}

impl RequestContext {
    /// A request with no cookies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `Cookie:` header (`name=value; name2="value2"`).
    ///
    /// Values wrapped in double quotes are unwrapped. Pairs that do not
    /// parse are skipped. When a name repeats, the first occurrence wins:
    /// browsers send the cookie with the most specific path first.
    pub fn from_cookie_header(header: &str) -> Self {
        let mut cookies = HashMap::new();
        for parsed in Cookie::split_parse(header) {
            let cookie = match parsed {
                Ok(cookie) => cookie,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping malformed cookie pair");
                    continue;
                }
            };
            let (name, value) = cookie.name_value_trimmed();
            cookies
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
        Self {
            cookies,
            callbacks: Vec::new(),
        }
    }

    /// Adds a cookie, replacing any existing one with the same name.
    pub fn with_cookie(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Number of callbacks waiting for [`finalize`](Self::finalize).
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    /// Runs the registered callbacks in registration order.
    ///
    /// When `errored` is `true`, callbacks that did not opt into error
    /// responses are dropped without running. Either way, no callback
    /// survives this call. Returns how many ran.
    pub fn finalize(
        &mut self,
        response: &mut dyn Response,
        errored: bool,
    ) -> usize {
        let mut ran = 0;
        for callback in self.callbacks.drain(..) {
            if errored && !callback.runs_on_error() {
                continue;
            }
            callback.invoke(response);
            ran += 1;
        }
        ran
    }
}

impl Request for RequestContext {
    fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    fn add_response_callback(&mut self, callback: ResponseCallback) {
        self.callbacks.push(callback);
    }
}

// ---------------------------------------------------------------------------
// CookieSink
// ---------------------------------------------------------------------------

/// A [`Response`] that only records the cookies set on it.
#[derive(Debug, Default)]
pub struct CookieSink {
    cookies: Vec<SetCookie>,
}

impl CookieSink {
    /// Every cookie set so far, in order.
    pub fn cookies(&self) -> &[SetCookie] {
        &self.cookies
    }

    /// The last cookie set under `name`.
    pub fn get(&self, name: &str) -> Option<&SetCookie> {
        self.cookies.iter().rev().find(|c| c.name == name)
    }

    /// Rendered `Set-Cookie` header values.
    pub fn header_values(&self) -> Vec<String> {
        self.cookies.iter().map(SetCookie::to_header_value).collect()
    }
}

impl Response for CookieSink {
    fn set_cookie(&mut self, cookie: SetCookie) {
        self.cookies.push(cookie);
    }
}
