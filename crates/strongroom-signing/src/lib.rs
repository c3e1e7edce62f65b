//! Signed cookie values for Strongroom.
//!
//! A session cookie carries nothing but a session id, but the server must
//! be sure that id was issued by *us* and not typed in by a client. This
//! crate wraps a value in a tamper-evident token:
//!
//! ```text
//! <base64url(json(value))>.<base64url(hmac_sha256(secret, payload))>
//! ```
//!
//! - **Functions** ([`signed_serialize`], [`signed_deserialize`]): sign
//!   and verify any serde value.
//! - **Trait** ([`CookieSigner`], [`HmacSigner`]): the seam the session
//!   factory uses, so a framework can plug in its own signing scheme.
//! - **Errors** ([`SigningError`]): why a token was rejected.

mod error;
mod signer;

pub use error::SigningError;
pub use signer::{CookieSigner, HmacSigner, signed_deserialize, signed_serialize};
