//! Rebuild Engine
//!
//! Computes per-locale paths top-down and writes them through the path index store. A
//! child path is its parent's path in the same locale plus the child's name in that
//! locale, each falling back to the default locale when unset. Only the entry call walks
//! the ancestor chain; recursive calls reuse the parent paths just computed.
//!
//! Failures confined to one node (a genuine path conflict, a name that sanitizes to
//! nothing) are collected in the report and the walk continues. Tree source errors and a
//! store that stays unavailable after self-heal abort the call.

use crate::error::{IndexError, StorageError};
use crate::notice::{Notice, Notifier};
use crate::sanitize::PathSanitizer;
use crate::segments::RootSegmentCache;
use crate::store::PathIndexStore;
use crate::tree::{TreeNode, TreeSource};
use crate::types::{Locale, NodeId, PerLocale};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A node whose paths could not be written
#[derive(Debug)]
pub struct RebuildFailure {
    pub node_id: NodeId,
    pub error: IndexError,
}

/// Rebuild report
///
/// Summary of one outer rebuild call.
#[derive(Debug, Default)]
pub struct RebuildReport {
    /// Node the rebuild started from
    pub root: Option<NodeId>,
    /// Number of path entries written
    pub written: usize,
    /// Number of nodes visited
    pub nodes: usize,
    /// Nodes whose paths could not be written
    pub failures: Vec<RebuildFailure>,
    /// Nodes whose stale rows were dropped to resolve a conflict, then re-indexed
    pub corrected: Vec<NodeId>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl RebuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn summary(&self) -> String {
        let mut message = format!(
            "Path index rebuilt: {} entries written for {} nodes",
            self.written, self.nodes
        );
        if !self.failures.is_empty() {
            message.push_str(&format!(", {} failed", self.failures.len()));
        }
        message
    }
}

/// Per-call state threaded through the recursion
#[derive(Default)]
struct Walk {
    report: RebuildReport,
    /// Owners whose stale rows were removed and still need re-indexing
    deferred: BTreeSet<NodeId>,
    /// Nodes written during this call
    visited: HashSet<NodeId>,
}

pub struct RebuildEngine {
    tree: Arc<dyn TreeSource>,
    store: Arc<PathIndexStore>,
    segments: Arc<RootSegmentCache>,
    sanitizer: PathSanitizer,
    default_root_name: String,
    notifier: Arc<dyn Notifier>,
}

impl RebuildEngine {
    pub fn new(
        tree: Arc<dyn TreeSource>,
        store: Arc<PathIndexStore>,
        segments: Arc<RootSegmentCache>,
        sanitizer: PathSanitizer,
        default_root_name: impl Into<String>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tree,
            store,
            segments,
            sanitizer,
            default_root_name: default_root_name.into(),
            notifier,
        }
    }

    /// Clear the store and index the whole tree.
    pub fn rebuild_all(&self) -> Result<RebuildReport, IndexError> {
        let removed = self.store.clear()?;
        debug!(removed, "Cleared path index for full rebuild");
        self.rebuild_node(self.tree.root_id(), true)
    }

    /// Re-index a node and its descendants.
    ///
    /// The root-segment cache is rebuilt when the node is the root or a direct child of
    /// it, or when `force_segments` is set (e.g. a node moved away from the root).
    pub fn rebuild_node(
        &self,
        node_id: NodeId,
        force_segments: bool,
    ) -> Result<RebuildReport, IndexError> {
        let start = Instant::now();
        let node = self
            .tree
            .node(node_id)?
            .ok_or(IndexError::NodeNotFound(node_id))?;

        let mut walk = Walk::default();
        let paths = self.entry_paths(&node)?;
        self.visit(&node, paths, &mut walk)?;

        // Stale owners uncovered by conflict correction get their own pass.
        while let Some(owner) = walk.deferred.pop_first() {
            if walk.visited.contains(&owner) {
                continue;
            }
            let Some(owner_node) = self.tree.node(owner)? else {
                continue;
            };
            match self.entry_paths(&owner_node) {
                Ok(paths) => self.visit(&owner_node, paths, &mut walk)?,
                Err(err) if err.is_node_scoped() => walk.report.failures.push(RebuildFailure {
                    node_id: owner,
                    error: err,
                }),
                Err(err) => return Err(err),
            }
        }

        let root_id = self.tree.root_id();
        if force_segments || node.id == root_id || node.parent_id == Some(root_id) {
            self.segments.rebuild()?;
        }

        let mut report = walk.report;
        report.root = Some(node_id);
        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            node_id,
            written = report.written,
            nodes = report.nodes,
            failures = report.failures.len(),
            corrected = report.corrected.len(),
            duration_ms = report.duration_ms,
            "Path index rebuild complete"
        );
        self.notifier.notify(Notice::completion(report.summary()));
        Ok(report)
    }

    /// Remove a deleted node's entries and those below it.
    pub fn delete_node(&self, node_id: NodeId) -> Result<usize, IndexError> {
        let removed = self.store.delete_descendants(node_id)? + self.store.delete_node(node_id)?;
        debug!(node_id, removed, "Removed paths of deleted node");
        self.segments.rebuild()?;
        Ok(removed)
    }

    /// Remove every entry of a locale.
    pub fn remove_locale(&self, locale: Locale) -> Result<usize, IndexError> {
        let removed = self.store.delete_locale(locale)?;
        info!(%locale, removed, "Removed paths of locale");
        self.segments.rebuild()?;
        Ok(removed)
    }

    /// A new locale only changes which root segments exist.
    pub fn locale_added(&self, locale: Locale) -> Result<(), IndexError> {
        debug!(%locale, "Locale added");
        self.segments.rebuild()?;
        Ok(())
    }

    /// Paths a node should have right now, from a walk of its ancestor chain.
    pub fn compute_paths(&self, node_id: NodeId) -> Result<PerLocale, IndexError> {
        let node = self
            .tree
            .node(node_id)?
            .ok_or(IndexError::NodeNotFound(node_id))?;
        self.entry_paths(&node)
    }

    fn entry_paths(&self, node: &TreeNode) -> Result<PerLocale, IndexError> {
        if node.parent_id.is_none() || node.id == self.tree.root_id() {
            return Ok(PerLocale::with_default(""));
        }

        // Ancestors from the parent upwards, ending at a parentless node.
        let mut chain = Vec::new();
        let mut seen = HashSet::from([node.id]);
        let mut next = node.parent_id;
        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(crate::error::TreeError::Cycle(id).into());
            }
            let ancestor = self.tree.node(id)?.ok_or(IndexError::NodeNotFound(id))?;
            next = if ancestor.id == self.tree.root_id() {
                None
            } else {
                ancestor.parent_id
            };
            chain.push(ancestor);
        }

        let mut chain = chain.into_iter().rev();
        let mut paths = match chain.next() {
            Some(top) => self.prefix_for(&top, &PerLocale::with_default("")),
            None => PerLocale::with_default(""),
        };
        for ancestor in chain {
            let own = self.child_paths(&paths, ancestor.id, &ancestor.names)?;
            paths = self.prefix_for(&ancestor, &own);
        }
        self.child_paths(&paths, node.id, &node.names)
    }

    /// Prefix handed to a node's children.
    ///
    /// The root stores an empty path; a non-default root name still prefixes its
    /// descendants. Locale-specific root names are URL prefixes only.
    fn prefix_for(&self, node: &TreeNode, paths: &PerLocale) -> PerLocale {
        if node.parent_id.is_some() && node.id != self.tree.root_id() {
            return paths.clone();
        }
        let default_root = self.sanitizer.segment(&self.default_root_name);
        match node
            .names
            .default_value()
            .and_then(|name| self.sanitizer.segment(name))
        {
            Some(segment) if Some(&segment) != default_root.as_ref() => {
                PerLocale::with_default(segment)
            }
            _ => PerLocale::with_default(""),
        }
    }

    /// Per-locale paths of a child under `parent`.
    ///
    /// Named-locale entries are kept only where they differ from the default path.
    fn child_paths(
        &self,
        parent: &PerLocale,
        node_id: NodeId,
        names: &PerLocale,
    ) -> Result<PerLocale, IndexError> {
        let default_segment = names
            .default_value()
            .and_then(|name| self.sanitizer.segment(name))
            .ok_or(IndexError::EmptyName(node_id))?;
        let default_path = join(parent.default_value().unwrap_or(""), &default_segment);

        let mut paths = PerLocale::with_default(default_path.clone());
        let locales: BTreeSet<Locale> = parent
            .locales()
            .chain(names.locales())
            .filter(|locale| !locale.is_default())
            .collect();
        for locale in locales {
            let segment = names
                .get(locale)
                .and_then(|name| self.sanitizer.segment(name))
                .unwrap_or_else(|| default_segment.clone());
            let path = join(parent.resolve(locale).unwrap_or(""), &segment);
            if path != default_path {
                paths.insert(locale, path);
            }
        }
        Ok(paths)
    }

    fn visit(&self, node: &TreeNode, paths: PerLocale, walk: &mut Walk) -> Result<(), IndexError> {
        walk.visited.insert(node.id);
        walk.report.nodes += 1;

        match self.write_paths(node.id, &paths, walk) {
            Ok(written) => walk.report.written += written,
            Err(err) if err.is_node_scoped() => {
                warn!(node_id = node.id, error = %err, "Skipping paths of node");
                walk.report.failures.push(RebuildFailure {
                    node_id: node.id,
                    error: err,
                });
            }
            Err(err) => return Err(err),
        }

        if !node.has_children() {
            return Ok(());
        }
        let prefix = self.prefix_for(node, &paths);
        for child in self.tree.children(node.id)? {
            match self.child_paths(&prefix, child.id, &child.names) {
                Ok(child_paths) => self.visit(&child, child_paths, walk)?,
                Err(err) if err.is_node_scoped() => {
                    warn!(node_id = child.id, error = %err, "Skipping subtree of node");
                    walk.report.nodes += 1;
                    walk.report.failures.push(RebuildFailure {
                        node_id: child.id,
                        error: err,
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Replace a node's rows, dropping stale rows of other nodes that block the write.
    fn write_paths(
        &self,
        node_id: NodeId,
        paths: &PerLocale,
        walk: &mut Walk,
    ) -> Result<usize, IndexError> {
        // Each correction removes one owner's rows, so the attempts are bounded.
        for _ in 0..=paths.len() {
            let (locale, path) = match self.store.replace(node_id, paths) {
                Ok(written) => {
                    debug!(node_id, written, "Indexed node");
                    return Ok(written);
                }
                Err(StorageError::PathConflict { locale, path, .. }) => (locale, path),
                Err(err) => return Err(err.into()),
            };

            let owner = match self.store.owner_of(&path, locale)? {
                Some(owner) if owner != node_id => owner,
                _ => return Err(conflict(node_id, locale, path)),
            };
            if !self.is_stale(owner, locale, &path)? {
                return Err(conflict(node_id, locale, path));
            }

            let dropped = self.store.delete_node(owner)?;
            debug!(node_id, owner, dropped, %path, "Dropped stale rows blocking path");
            walk.report.corrected.push(owner);
            if !walk.visited.contains(&owner) {
                walk.deferred.insert(owner);
            }
        }
        let (locale, path) = paths
            .iter()
            .next()
            .map(|(locale, path)| (locale, path.to_string()))
            .unwrap_or_default();
        Err(conflict(node_id, locale, path))
    }

    /// Whether the owner's row for `path` no longer matches its position in the tree.
    fn is_stale(&self, owner: NodeId, locale: Locale, path: &str) -> Result<bool, IndexError> {
        match self.compute_paths(owner) {
            Ok(current) => Ok(current.resolve(locale) != Some(path)),
            Err(IndexError::NodeNotFound(_)) | Err(IndexError::EmptyName(_)) => Ok(true),
            Err(err) => Err(err),
        }
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", prefix, segment)
    }
}

fn conflict(node_id: NodeId, locale: Locale, path: String) -> IndexError {
    StorageError::PathConflict {
        node_id,
        locale,
        path,
    }
    .into()
}
