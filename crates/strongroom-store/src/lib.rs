//! Storage for Strongroom sessions.
//!
//! This crate models the slice of a transactional object database that
//! sessions need:
//!
//! - a [`Root`]: the named top-level objects of one database,
//! - the [`SessionManager`]: the root object that owns every
//!   [`SessionRecord`](strongroom_record::SessionRecord),
//! - [`Connection`] / [`ConnectionProvider`]: how the session factory
//!   reaches a root,
//! - [`MemoryDatabase`] / [`MemoryDatabases`]: an in-process reference
//!   implementation with commit-time dirty tracking.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← resolves cookies to records, creates the manager
//!     ↕
//! Store Layer (this crate)  ← root objects, manager, connections
//!     ↕
//! Record Layer (below)  ← SessionRecord, flash, CSRF
//! ```

mod connection;
mod error;
mod manager;
mod memory;
mod root;

pub use connection::{Connection, ConnectionProvider};
pub use error::StoreError;
pub use manager::{SessionManager, SharedRecord};
pub use memory::{MemoryConnection, MemoryDatabase, MemoryDatabases};
pub use root::{Persistent, Root};
