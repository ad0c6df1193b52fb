//! Shared SQLite handle
//!
//! The path index and the host node table live in the same database so that path
//! conditions and page-info lookups can join against node attributes.

use crate::error::StorageError;
use crate::types::NodeId;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;
use std::time::Duration;

/// Database handle shared by the store and the host tree adapter
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Lock the connection for the duration of one operation.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

/// SQLite integer for a node id. Ids above `i64::MAX` are rejected, never wrapped.
pub fn sql_id(id: NodeId) -> rusqlite::Result<i64> {
    i64::try_from(id).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Read an id column, rejecting negative values.
pub fn column_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<NodeId> {
    let raw: i64 = row.get(idx)?;
    NodeId::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

/// Whether an error came from converting a value to or from SQL rather than from the database.
pub fn is_conversion_failure(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::ToSqlConversionFailure(_) | rusqlite::Error::FromSqlConversionFailure(..)
    )
}
