//! Error types for the path index.

use crate::types::{Locale, NodeId};
use thiserror::Error;

/// Errors raised by the path index store and the module-config persistence
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Path '{path}' for node {node_id} (locale {locale}) is already indexed for another node")]
    PathConflict {
        node_id: NodeId,
        locale: Locale,
        path: String,
    },

    #[error("Path index unavailable during {operation} after schema repair: {source}")]
    Unavailable {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Module config persistence error: {0}")]
    Persistence(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the failure is confined to a single node's rows.
    ///
    /// Conflicts do not indicate a broken store, so a rebuild records them and moves on.
    pub fn is_node_scoped(&self) -> bool {
        matches!(self, StorageError::PathConflict { .. })
    }
}

/// Errors raised while reading the authoritative tree
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Tree source error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Node {0} has a parent cycle")]
    Cycle(NodeId),

    #[error("Tree source unavailable: {0}")]
    Unavailable(String),
}

/// Usage errors signaled at query-build time
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown path operator: {0}")]
    UnknownOperator(String),

    #[error("Operator '{0}' does not support multiple values")]
    MultiValueUnsupported(&'static str),

    #[error("Operator '{0}' cannot be negated")]
    NegateUnsupported(&'static str),

    #[error("Path condition has no value")]
    MissingValue,
}

/// Top-level error for index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Tree error: {0}")]
    TreeError(#[from] TreeError),

    #[error("Query error: {0}")]
    QueryError(#[from] QueryError),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node {0} has an empty name")]
    EmptyName(NodeId),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl IndexError {
    /// Whether a rebuild may record this error against one node and continue.
    pub fn is_node_scoped(&self) -> bool {
        match self {
            IndexError::StorageError(err) => err.is_node_scoped(),
            IndexError::EmptyName(_) => true,
            _ => false,
        }
    }
}

impl From<config::ConfigError> for IndexError {
    fn from(err: config::ConfigError) -> Self {
        IndexError::ConfigError(err.to_string())
    }
}
