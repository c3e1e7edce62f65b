//! Per-request session resolution for Strongroom.
//!
//! This crate ties the other layers together for each request:
//!
//! 1. **Ids**: [`IdGenerator`] mints collision-free [`SessionId`]s, even
//!    when many threads start with identical random seeds.
//! 2. **Factory**: [`SessionFactory`] reads the signed session cookie,
//!    finds or creates the record, and schedules a `Set-Cookie` for new ids.
//! 3. **Seams**: [`Request`] and [`Response`] are the only things it needs
//!    from the web framework; [`RequestContext`] and [`CookieSink`] are
//!    ready-made implementations.
//!
//! # How it fits in the stack
//!
//! ```text
//! Web framework (above)  ← calls SessionFactory::session per request
//!     ↕
//! Session Layer (this crate)  ← cookies, ids, new-session signal
//!     ↕
//! Store / Record / Signing (below)
//! ```

mod config;
mod error;
mod factory;
mod id;
mod request;
mod session;

pub use config::{CookieSettings, SessionFactoryConfig};
pub use error::SessionError;
pub use factory::SessionFactory;
pub use id::{IdGenerator, MAX_RANDOM, SessionId, new_session_id};
pub use request::{
    CookieSink, Request, RequestContext, Response, ResponseCallback, SetCookie,
};
pub use session::Session;
