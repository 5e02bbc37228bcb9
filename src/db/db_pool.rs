use duckdb::Connection;
use r2d2::ManageConnection;
use std::sync::Mutex;

/// r2d2 manager for the relational data store being queried (distinct from
/// the history store, which opens its own scoped connections). DuckDB
/// permits one database instance per file, so the manager opens the file
/// once and hands out clones that share it.
pub struct DataStoreConnectionManager {
    connection: Mutex<Connection>,
}

impl DataStoreConnectionManager {
    pub fn new(connection_string: &str) -> Result<Self, duckdb::Error> {
        let connection = Connection::open(connection_string)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

impl ManageConnection for DataStoreConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let connection = self
            .connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        connection.try_clone()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute_batch("SELECT 1;")
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
