use pagepaths::db::Database;
use pagepaths::events::TreeEventDispatcher;
use pagepaths::notice::CollectingNotifier;
use pagepaths::segments::SledModuleConfig;
use pagepaths::{IndexConfig, Locale, PathIndex, PathIndexStore, SqliteTree};
use std::sync::Arc;

pub const ROOT: u64 = 1;
pub const DE: Locale = Locale::Named(5);

/// An in-memory site with the index subscribed to tree events.
pub struct Site {
    pub tree: Arc<SqliteTree>,
    pub index: Arc<PathIndex>,
    pub notifier: Arc<CollectingNotifier>,
    pub events: TreeEventDispatcher,
}

impl Site {
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    pub fn with_config(config: IndexConfig) -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let tree = Arc::new(SqliteTree::new(db.clone(), ROOT).unwrap());
        tree.insert_node(ROOT, None, "home", 1).unwrap();
        let notifier = Arc::new(CollectingNotifier::new());
        let store = Arc::new(PathIndexStore::open(db, notifier.clone()).unwrap());
        let index = Arc::new(PathIndex::new(
            tree.clone(),
            store,
            Arc::new(SledModuleConfig::temporary().unwrap()),
            notifier.clone(),
            &config,
        ));
        let events = TreeEventDispatcher::new();
        events.subscribe(index.clone());
        Self {
            tree,
            index,
            notifier,
            events,
        }
    }

    /// Root -> about(10) -> team(11), root -> news(12), with German names on the root and about.
    pub fn sample() -> Self {
        let site = Self::new();
        site.tree.insert_node(10, Some(ROOT), "About", 2).unwrap();
        site.tree.insert_node(11, Some(10), "Team", 2).unwrap();
        site.tree.insert_node(12, Some(ROOT), "News", 2).unwrap();
        site.tree.set_locale_name(ROOT, DE, Some("de")).unwrap();
        site.tree.set_locale_name(10, DE, Some("Unternehmen")).unwrap();
        site.index.rebuild(None).unwrap();
        site
    }

    pub fn path(&self, node: u64, locale: Locale) -> Option<String> {
        self.index.get_path(node, locale).unwrap()
    }
}
