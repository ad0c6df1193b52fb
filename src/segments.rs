//! Root Segment Cache
//!
//! First-level URL segments owned by the tree root (locale prefixes) and its direct
//! children. The cache lives in memory with a persisted copy in the host's module-config
//! store; both are derived data and can be dropped at any time.

use crate::error::{IndexError, StorageError};
use crate::sanitize::{first_segment, Encoding, PathSanitizer};
use crate::tree::TreeSource;
use crate::types::{Locale, LocaleId, NodeId};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Module-config key the cache is persisted under
pub const ROOT_SEGMENTS_KEY: &str = "root_segments";

const MODULE_CONFIG_TREE: &str = "module_config";

/// Generic module-configuration persistence owned by the host
pub trait ModuleConfigStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Module config kept in a sled tree, one JSON document per key
pub struct SledModuleConfig {
    tree: sled::Tree,
}

impl SledModuleConfig {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    /// Throwaway store removed when dropped.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(&db)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            tree: db.open_tree(MODULE_CONFIG_TREE)?,
        })
    }
}

impl ModuleConfigStore for SledModuleConfig {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value)?;
        self.tree.insert(key.as_bytes(), bytes)?;
        self.tree.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.tree.remove(key.as_bytes())?;
        self.tree.flush()?;
        Ok(())
    }
}

/// One resolved root segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSegment {
    pub node_id: NodeId,
    pub locale: Locale,
    pub segment: String,
}

/// Cache key for a node's segment in a locale.
pub fn segment_key(node_id: NodeId, locale: Locale) -> String {
    match locale {
        Locale::Default => format!("_{}", node_id),
        Locale::Named(id) => format!("_{}.{}", node_id, id),
    }
}

fn parse_key(key: &str) -> Option<(NodeId, Locale)> {
    let rest = key.strip_prefix('_')?;
    match rest.split_once('.') {
        Some((node, locale)) => Some((
            node.parse().ok()?,
            Locale::from_id(locale.parse::<LocaleId>().ok()?),
        )),
        None => Some((rest.parse().ok()?, Locale::Default)),
    }
}

/// Explicit cache object for root-level segments
pub struct RootSegmentCache {
    tree: Arc<dyn TreeSource>,
    persistence: Arc<dyn ModuleConfigStore>,
    sanitizer: PathSanitizer,
    default_root_name: String,
    segments: RwLock<Option<BTreeMap<String, String>>>,
}

impl RootSegmentCache {
    pub fn new(
        tree: Arc<dyn TreeSource>,
        persistence: Arc<dyn ModuleConfigStore>,
        sanitizer: PathSanitizer,
        default_root_name: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            persistence,
            sanitizer,
            default_root_name: default_root_name.into(),
            segments: RwLock::new(None),
        }
    }

    /// Full segment map, rebuilt when nothing is cached or `force` is set.
    pub fn get_root_segments(&self, force: bool) -> Result<BTreeMap<String, String>, IndexError> {
        if !force {
            if let Some(cached) = self.segments.read().as_ref().filter(|m| !m.is_empty()) {
                return Ok(cached.clone());
            }
            if let Some(value) = self.persistence.load(ROOT_SEGMENTS_KEY)? {
                let persisted: BTreeMap<String, String> =
                    serde_json::from_value(value).map_err(StorageError::from)?;
                if !persisted.is_empty() {
                    *self.segments.write() = Some(persisted.clone());
                    return Ok(persisted);
                }
            }
        }
        self.rebuild()
    }

    /// Recompute from the root and its direct children across all locales, then persist.
    pub fn rebuild(&self) -> Result<BTreeMap<String, String>, IndexError> {
        let root_id = self.tree.root_id();
        let mut segments = BTreeMap::new();

        if let Some(root) = self.tree.node(root_id)? {
            let default_root = self.sanitizer.segment(&self.default_root_name);
            for (locale, name) in root.names.iter() {
                let Some(segment) = self.sanitizer.segment(name) else {
                    continue;
                };
                if locale.is_default() && Some(&segment) == default_root.as_ref() {
                    continue;
                }
                segments.insert(segment_key(root_id, locale), segment);
            }

            if root.has_children() {
                for child in self.tree.children(root_id)? {
                    for (locale, name) in child.names.iter() {
                        if let Some(segment) = self.sanitizer.segment(name) {
                            segments.insert(segment_key(child.id, locale), segment);
                        }
                    }
                }
            }
        }

        self.persistence.save(
            ROOT_SEGMENTS_KEY,
            &serde_json::to_value(&segments).map_err(StorageError::from)?,
        )?;
        *self.segments.write() = Some(segments.clone());
        debug!(root_id, segments = segments.len(), "Rebuilt root segment cache");
        Ok(segments)
    }

    /// Drop the in-memory and persisted copies.
    pub fn invalidate(&self) -> Result<(), IndexError> {
        *self.segments.write() = None;
        self.persistence.remove(ROOT_SEGMENTS_KEY)?;
        Ok(())
    }

    /// Segment, key owner and locale for the first segment of `segment_or_path`.
    pub fn lookup(&self, segment_or_path: &str) -> Result<Option<RootSegment>, IndexError> {
        let Some(wanted) = first_segment(segment_or_path, Encoding::Ascii) else {
            return Ok(None);
        };
        let segments = self.get_root_segments(false)?;
        Ok(segments
            .iter()
            .filter(|(_, segment)| **segment == wanted)
            .find_map(|(key, segment)| {
                parse_key(key).map(|(node_id, locale)| RootSegment {
                    node_id,
                    locale,
                    segment: segment.clone(),
                })
            }))
    }

    /// Node owning the segment at the root level, if any.
    pub fn is_root_segment(&self, segment_or_path: &str) -> Result<Option<NodeId>, IndexError> {
        Ok(self.lookup(segment_or_path)?.map(|found| found.node_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::tree::SqliteTree;

    fn fixture() -> (Arc<SqliteTree>, Arc<SledModuleConfig>, RootSegmentCache) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let tree = Arc::new(SqliteTree::new(db, 1).unwrap());
        tree.insert_node(1, None, "home", 1).unwrap();
        tree.insert_node(10, Some(1), "about", 2).unwrap();
        tree.insert_node(11, Some(10), "team", 2).unwrap();
        tree.set_locale_name(1, Locale::Named(5), Some("de")).unwrap();
        let persistence = Arc::new(SledModuleConfig::temporary().unwrap());
        let cache = RootSegmentCache::new(
            tree.clone(),
            persistence.clone(),
            PathSanitizer::default(),
            "home",
        );
        (tree, persistence, cache)
    }

    #[test]
    fn test_keys() {
        assert_eq!(segment_key(10, Locale::Default), "_10");
        assert_eq!(segment_key(10, Locale::Named(5)), "_10.5");
        assert_eq!(parse_key("_10.5"), Some((10, Locale::Named(5))));
        assert_eq!(parse_key("_1"), Some((1, Locale::Default)));
        assert_eq!(parse_key("10"), None);
    }

    #[test]
    fn test_rebuild_skips_default_root_name() {
        let (_tree, _persistence, cache) = fixture();
        let segments = cache.rebuild().unwrap();
        assert_eq!(segments.get("_1.5").map(String::as_str), Some("de"));
        assert_eq!(segments.get("_10").map(String::as_str), Some("about"));
        assert!(!segments.contains_key("_1"));
        assert!(!segments.contains_key("_11"));
    }

    #[test]
    fn test_is_root_segment() {
        let (tree, _persistence, cache) = fixture();
        assert_eq!(cache.is_root_segment("de").unwrap(), Some(1));
        assert_eq!(cache.is_root_segment("/About/team").unwrap(), Some(10));
        assert_eq!(cache.is_root_segment("team").unwrap(), None);
        assert_eq!(cache.is_root_segment("").unwrap(), None);

        tree.rename(10, "company").unwrap();
        cache.rebuild().unwrap();
        assert_eq!(cache.is_root_segment("about").unwrap(), None);
        assert_eq!(cache.is_root_segment("company").unwrap(), Some(10));
    }

    #[test]
    fn test_lookup_reports_locale() {
        let (_tree, _persistence, cache) = fixture();
        let found = cache.lookup("de/unternehmen").unwrap().unwrap();
        assert_eq!(found.node_id, 1);
        assert_eq!(found.locale, Locale::Named(5));
    }

    #[test]
    fn test_persisted_copy_is_used_and_invalidated() {
        let (tree, persistence, cache) = fixture();
        cache.get_root_segments(false).unwrap();
        assert!(persistence.load(ROOT_SEGMENTS_KEY).unwrap().is_some());

        // A second cache over the same persistence reads the stored copy without a rebuild.
        tree.rename(10, "company").unwrap();
        let other = RootSegmentCache::new(
            tree.clone(),
            persistence.clone(),
            PathSanitizer::default(),
            "home",
        );
        assert_eq!(other.is_root_segment("about").unwrap(), Some(10));

        other.invalidate().unwrap();
        assert!(persistence.load(ROOT_SEGMENTS_KEY).unwrap().is_none());
        assert_eq!(other.is_root_segment("about").unwrap(), None);
        assert_eq!(other.get_root_segments(true).unwrap().get("_10").map(String::as_str), Some("company"));
    }

    #[test]
    fn test_custom_root_name_is_a_segment() {
        let (tree, _persistence, cache) = fixture();
        tree.rename(1, "site").unwrap();
        assert_eq!(cache.get_root_segments(true).unwrap().get("_1").map(String::as_str), Some("site"));
    }
}
