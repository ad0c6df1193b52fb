//! Path index facade
//!
//! Wires the store, the root-segment cache, the rebuild engine and the query adapter
//! together and exposes the maintenance and read interface hosts call. Implements
//! [`TreeListener`] so it can be subscribed to a [`crate::events::TreeEventDispatcher`].

use crate::config::IndexConfig;
use crate::error::{IndexError, QueryError};
use crate::events::{TreeEvent, TreeListener};
use crate::notice::Notifier;
use crate::query::{PathCondition, PathQueryAdapter, SelectQuery};
use crate::rebuild::{RebuildEngine, RebuildReport};
use crate::sanitize::PathSanitizer;
use crate::segments::{ModuleConfigStore, RootSegmentCache};
use crate::store::{PageInfo, PathIndexStore};
use crate::tree::sqlite::NODES_TABLE;
use crate::tree::TreeSource;
use crate::types::{Locale, NodeId, PerLocale};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Operator-facing counters
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub rows: u64,
    pub nodes: u64,
    pub estimated_rebuild: Duration,
    pub last_rebuild: Option<DateTime<Utc>>,
}

/// A URL resolved to a page, with the locale its root segment selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPage {
    /// Locale selected by the URL's root segment, or the default locale
    pub locale: Locale,
    /// Root segment stripped from the URL, if any
    pub prefix: Option<String>,
    pub info: PageInfo,
}

pub struct PathIndex {
    tree: Arc<dyn TreeSource>,
    store: Arc<PathIndexStore>,
    segments: Arc<RootSegmentCache>,
    engine: RebuildEngine,
    sanitizer: PathSanitizer,
    adapter: PathQueryAdapter,
    estimate_us_per_node: u64,
    last_rebuild: RwLock<Option<DateTime<Utc>>>,
}

impl PathIndex {
    pub fn new(
        tree: Arc<dyn TreeSource>,
        store: Arc<PathIndexStore>,
        persistence: Arc<dyn ModuleConfigStore>,
        notifier: Arc<dyn Notifier>,
        config: &IndexConfig,
    ) -> Self {
        let sanitizer = PathSanitizer::new(config.display_encoding);
        let segments = Arc::new(RootSegmentCache::new(
            tree.clone(),
            persistence,
            sanitizer,
            config.default_root_name.clone(),
        ));
        let engine = RebuildEngine::new(
            tree.clone(),
            store.clone(),
            segments.clone(),
            sanitizer,
            config.default_root_name.clone(),
            notifier,
        );
        Self {
            tree,
            store,
            segments,
            engine,
            sanitizer,
            adapter: PathQueryAdapter::new(sanitizer),
            estimate_us_per_node: config.rebuild.estimate_us_per_node,
            last_rebuild: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<PathIndexStore> {
        &self.store
    }

    pub fn segments(&self) -> &Arc<RootSegmentCache> {
        &self.segments
    }

    pub fn sanitizer(&self) -> PathSanitizer {
        self.sanitizer
    }

    /// Full rebuild without a node, subtree rebuild with one.
    pub fn rebuild(&self, node_id: Option<NodeId>) -> Result<RebuildReport, IndexError> {
        let report = match node_id {
            None => self.engine.rebuild_all()?,
            Some(id) => self.engine.rebuild_node(id, false)?,
        };
        *self.last_rebuild.write() = Some(Utc::now());
        Ok(report)
    }

    /// Path of a node in a locale, in display form.
    ///
    /// A named locale without its own row reads the default-locale path, since named rows
    /// are only stored where they differ. Use [`PathIndexStore::get_path`] for the exact row.
    pub fn get_path(&self, node_id: NodeId, locale: Locale) -> Result<Option<String>, IndexError> {
        let path = match self.store.get_path(node_id, locale)? {
            None if !locale.is_default() => self.store.get_path(node_id, Locale::Default)?,
            found => found,
        };
        Ok(path.map(|path| self.display(path)))
    }

    /// Every stored locale variant of a node, in display form.
    pub fn get_paths(&self, node_id: NodeId) -> Result<PerLocale, IndexError> {
        Ok(self
            .store
            .get_all_paths(node_id)?
            .iter()
            .map(|(locale, path)| (locale, self.display(path.to_string())))
            .collect())
    }

    pub fn get_page_id(&self, path: &str) -> Result<Option<NodeId>, IndexError> {
        Ok(self.get_page_and_locale_id(&[path])?.map(|(id, _)| id))
    }

    /// First candidate path that is indexed, with the locale it matched in.
    pub fn get_page_and_locale_id(
        &self,
        candidates: &[&str],
    ) -> Result<Option<(NodeId, Locale)>, IndexError> {
        let candidates: Vec<String> = candidates
            .iter()
            .map(|candidate| self.sanitizer.storage(candidate))
            .collect();
        Ok(self.store.lookup_by_path(&candidates)?)
    }

    pub fn get_page_info(&self, path: &str) -> Result<Option<PageInfo>, IndexError> {
        let info = self.store.lookup_info(&self.sanitizer.storage(path))?;
        Ok(info.map(|info| self.display_info(info)))
    }

    /// Resolve an incoming URL path.
    ///
    /// A leading locale root segment (e.g. `de/...`) is stripped and the remainder is looked
    /// up preferring that locale, falling back to the default locale.
    pub fn resolve_url(&self, url: &str) -> Result<Option<ResolvedPage>, IndexError> {
        let path = self.sanitizer.storage(url);
        if let Some(found) = self.segments.lookup(&path)? {
            if found.node_id == self.tree.root_id() && !found.locale.is_default() {
                let rest = path
                    .strip_prefix(found.segment.as_str())
                    .map(|rest| rest.trim_start_matches('/'))
                    .unwrap_or("");
                debug!(url, locale = %found.locale, "Resolved locale root segment");
                return Ok(self
                    .store
                    .lookup_info_in(rest, found.locale)?
                    .map(|info| ResolvedPage {
                        locale: found.locale,
                        prefix: Some(found.segment),
                        info: self.display_info(info),
                    }));
            }
        }
        Ok(self.store.lookup_info(&path)?.map(|info| ResolvedPage {
            locale: Locale::Default,
            prefix: None,
            info: self.display_info(info),
        }))
    }

    pub fn is_root_segment(&self, segment: &str) -> Result<Option<NodeId>, IndexError> {
        self.segments.is_root_segment(segment)
    }

    pub fn root_segments(&self, force: bool) -> Result<BTreeMap<String, String>, IndexError> {
        self.segments.get_root_segments(force)
    }

    /// Add a path condition to a host query.
    pub fn apply_condition(
        &self,
        query: &mut SelectQuery,
        condition: &PathCondition,
    ) -> Result<(), QueryError> {
        self.adapter.apply(query, condition)
    }

    /// Node ids matching every condition.
    pub fn find(&self, conditions: &[PathCondition]) -> Result<Vec<NodeId>, IndexError> {
        let mut query = SelectQuery::new(NODES_TABLE, "id");
        for condition in conditions {
            self.apply_condition(&mut query, condition)?;
        }
        Ok(self.store.select_node_ids(&query)?)
    }

    pub fn diagnostics(&self) -> Result<Diagnostics, IndexError> {
        let nodes = self.tree.node_count()?;
        Ok(Diagnostics {
            rows: self.store.row_count()?,
            nodes,
            estimated_rebuild: Duration::from_micros(nodes.saturating_mul(self.estimate_us_per_node)),
            last_rebuild: *self.last_rebuild.read(),
        })
    }

    fn display(&self, path: String) -> String {
        if path == "/" {
            path
        } else {
            self.sanitizer.display(&path)
        }
    }

    fn display_info(&self, mut info: PageInfo) -> PageInfo {
        info.path = self.display(info.path);
        info
    }
}

impl TreeListener for PathIndex {
    fn on_event(&self, event: &TreeEvent) -> Result<(), IndexError> {
        let root_id = self.tree.root_id();
        match event {
            TreeEvent::NodeAdded(node) | TreeEvent::NodeRenamed(node) => {
                self.engine.rebuild_node(node.id, false)?;
            }
            TreeEvent::NodeMoved {
                node,
                previous_parent,
            } => {
                self.engine
                    .rebuild_node(node.id, *previous_parent == Some(root_id))?;
            }
            TreeEvent::NodeDeleted(node) => {
                self.engine.delete_node(node.id)?;
            }
            TreeEvent::LocaleAdded(locale) => self.engine.locale_added(*locale)?,
            TreeEvent::LocaleRemoved(locale) => {
                self.engine.remove_locale(*locale)?;
            }
        }
        Ok(())
    }
}
