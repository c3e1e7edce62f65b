//! Connection seams between the session factory and a database.

use crate::{Root, StoreError};

/// An open connection to one database.
///
/// The connection's lifetime (one per request, pooled, etc.) is the
/// provider's business; the factory only needs the root.
pub trait Connection {
    /// The database's root mapping.
    fn root(&self) -> &Root;

    /// Persists pending changes, returning the number of objects written.
    fn commit(&self) -> usize {
        self.root().commit()
    }
}

/// Hands out connections to the session factory.
///
/// Providers that manage several databases override
/// [`get_named_connection`](Self::get_named_connection). The default answer
/// is [`StoreError::NamedDatabasesUnsupported`], which makes the factory
/// retry with [`get_connection`](Self::get_connection).
pub trait ConnectionProvider: Send + Sync {
    type Connection: Connection;

    /// Opens a connection to the default database.
    fn get_connection(&self) -> Result<Self::Connection, StoreError>;

    /// Opens a connection to the database called `name`.
    fn get_named_connection(
        &self,
        name: &str,
    ) -> Result<Self::Connection, StoreError> {
        let _ = name;
        Err(StoreError::NamedDatabasesUnsupported)
    }
}
