//! pagepaths: Per-Locale Path Index
//!
//! Keeps a denormalized table of every node's URL path in every locale, derived from an
//! authoritative site tree. Lookups by path, reverse lookups by node, root segment
//! resolution and path-based query conditions all read from that table; tree lifecycle
//! events keep it current.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod index;
pub mod logging;
pub mod notice;
pub mod query;
pub mod rebuild;
pub mod sanitize;
pub mod segments;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;

pub use config::{ConfigLoader, IndexConfig};
pub use error::{IndexError, QueryError, StorageError, TreeError};
pub use events::{TreeEvent, TreeEventDispatcher, TreeListener};
pub use index::PathIndex;
pub use query::{Operator, PathCondition, SelectQuery};
pub use rebuild::{RebuildEngine, RebuildReport};
pub use sanitize::{Encoding, PathSanitizer};
pub use store::PathIndexStore;
pub use tree::{SqliteTree, TreeNode, TreeSource};
pub use types::{Locale, LocaleId, NodeId, PerLocale};
