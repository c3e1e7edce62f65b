//! In-process databases.
//!
//! Good enough for tests, demos and single-process deployments that can
//! afford to lose sessions on restart.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{Connection, ConnectionProvider, Root, StoreError};

/// A single in-memory database. Clones share the same root.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    root: Arc<Root>,
}

impl MemoryDatabase {
    /// Creates a database with an empty root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a connection to this database.
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            root: Arc::clone(&self.root),
        }
    }

    /// The database's root, without going through a connection.
    pub fn root(&self) -> &Root {
        &self.root
    }
}

/// Only knows its own database, so named lookups fall back to it.
impl ConnectionProvider for MemoryDatabase {
    type Connection = MemoryConnection;

    fn get_connection(&self) -> Result<MemoryConnection, StoreError> {
        Ok(self.connect())
    }
}

/// A connection to a [`MemoryDatabase`].
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    root: Arc<Root>,
}

impl Connection for MemoryConnection {
    fn root(&self) -> &Root {
        &self.root
    }
}

/// A default database plus any number of named ones.
///
/// ```rust
/// use strongroom_store::{ConnectionProvider, MemoryDatabases};
///
/// let dbs = MemoryDatabases::new().with_database("sessions");
/// assert!(dbs.get_named_connection("sessions").is_ok());
/// assert!(dbs.get_named_connection("missing").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabases {
    default: MemoryDatabase,
    named: HashMap<String, MemoryDatabase>,
}

impl MemoryDatabases {
    /// Creates a provider with only the default database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty database called `name`.
    pub fn with_database(mut self, name: impl Into<String>) -> Self {
        self.named.insert(name.into(), MemoryDatabase::new());
        self
    }

    /// The unnamed database.
    pub fn default_database(&self) -> &MemoryDatabase {
        &self.default
    }

    /// The database called `name`, if configured.
    pub fn database(&self, name: &str) -> Option<&MemoryDatabase> {
        self.named.get(name)
    }
}

impl ConnectionProvider for MemoryDatabases {
    type Connection = MemoryConnection;

    fn get_connection(&self) -> Result<MemoryConnection, StoreError> {
        Ok(self.default.connect())
    }

    fn get_named_connection(
        &self,
        name: &str,
    ) -> Result<MemoryConnection, StoreError> {
        self.database(name)
            .map(MemoryDatabase::connect)
            .ok_or_else(|| StoreError::UnknownDatabase(name.to_string()))
    }
}
