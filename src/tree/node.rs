//! Tree node snapshot as seen by the index

use crate::types::{Locale, NodeId, PerLocale};
use serde::{Deserialize, Serialize};

/// Node status flags as stored by the host tree
pub mod status {
    pub const ON: u32 = 1;
    pub const LOCKED: u32 = 4;
    pub const HIDDEN: u32 = 1024;
    pub const UNPUBLISHED: u32 = 2048;
    pub const TRASH: u32 = 8192;
}

/// Snapshot of one node of the authoritative tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    /// `None` for the tree root
    pub parent_id: Option<NodeId>,
    /// Default-locale name plus any locale-specific overrides
    pub names: PerLocale,
    pub child_count: u64,
    pub type_id: u64,
    pub status: u32,
}

impl TreeNode {
    /// Name for a locale, falling back to the default-locale name.
    pub fn name(&self, locale: Locale) -> &str {
        self.names.resolve(locale).unwrap_or("")
    }

    pub fn has_children(&self) -> bool {
        self.child_count > 0
    }
}
