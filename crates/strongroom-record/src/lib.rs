//! Session records for Strongroom.
//!
//! A [`SessionRecord`] is the data the server keeps for one client: a flat
//! map from string keys to JSON values. On top of that map sit two small
//! protocols that use reserved keys:
//!
//! 1. **Flash messages**: queues stored under `_f_<queue>`, read once
//!    after a redirect ([`SessionRecord::flash`], [`SessionRecord::pop_flash`]).
//! 2. **CSRF tokens**: a random token cached under `_csrft_`
//!    ([`SessionRecord::get_csrf_token`]).
//!
//! # Dirty tracking
//!
//! The storage layer only writes records that say they changed. Setting or
//! removing a key marks the record dirty automatically. Mutating a value
//! *in place* through [`SessionRecord::get_value_mut`] does not, so code
//! doing that must call [`SessionRecord::changed`] afterwards.

mod error;
mod record;

pub use error::RecordError;
pub use record::{CSRF_TOKEN_KEY, FLASH_KEY_PREFIX, SessionRecord};
