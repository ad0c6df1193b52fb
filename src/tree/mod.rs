//! Authoritative site tree interface
//!
//! The index never owns the tree. It reads nodes through [`TreeSource`]; hosts plug in
//! their own storage. [`SqliteTree`] is a host adapter over a plain node table.

pub mod node;
pub mod sqlite;

pub use node::{status, TreeNode};
pub use sqlite::SqliteTree;

use crate::error::TreeError;
use crate::types::NodeId;

/// Read interface over the authoritative tree
pub trait TreeSource: Send + Sync {
    /// Id of the tree root.
    fn root_id(&self) -> NodeId;

    /// Load one node with all of its per-locale names.
    fn node(&self, id: NodeId) -> Result<Option<TreeNode>, TreeError>;

    /// All nodes whose parent is `id`.
    fn children(&self, id: NodeId) -> Result<Vec<TreeNode>, TreeError>;

    /// Total number of nodes in the tree.
    fn node_count(&self) -> Result<u64, TreeError>;
}
