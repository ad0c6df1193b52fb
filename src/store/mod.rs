//! Path Index Store
//!
//! Persistent `(node_id, locale_id) -> path` table with a unique `(path, locale_id)`
//! constraint. Every query runs through [`PathIndexStore::run`], which repairs the schema
//! once and retries when a query fails for a reason other than a constraint violation.

pub mod schema;

use crate::db::{column_id, is_conversion_failure, sql_id, Database};
use crate::error::StorageError;
use crate::notice::{Notice, Notifier};
use crate::query::SelectQuery;
use crate::tree::status;
use crate::types::{Locale, NodeId, PerLocale};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use schema::{ensure_schema, SchemaChange, FTS_TABLE, PATHS_TABLE};

const UPSERT_SQL: &str = "INSERT INTO pages_paths (node_id, locale_id, path) VALUES (?1, ?2, ?3)
     ON CONFLICT(node_id, locale_id) DO UPDATE SET path = excluded.path
     WHERE path != excluded.path";

/// One stored row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub node_id: NodeId,
    pub locale: Locale,
    pub path: String,
}

/// Stored path joined with the node's authoritative attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub node_id: NodeId,
    pub locale: Locale,
    pub path: String,
    pub type_id: u64,
    pub parent_id: Option<NodeId>,
    pub status: u32,
}

impl PageInfo {
    pub fn is_hidden(&self) -> bool {
        self.status & status::HIDDEN != 0
    }

    pub fn is_published(&self) -> bool {
        self.status & (status::UNPUBLISHED | status::TRASH) == 0
    }
}

/// Outcome of a transactional write: either the row count or the first conflicting path.
type WriteOutcome = Result<usize, (Locale, String)>;

/// Path index store backed by SQLite
pub struct PathIndexStore {
    db: Arc<Database>,
    notifier: Arc<dyn Notifier>,
}

impl PathIndexStore {
    /// Open the store and make sure its schema is in place.
    pub fn open(db: Arc<Database>, notifier: Arc<dyn Notifier>) -> Result<Self, StorageError> {
        let store = Self { db, notifier };
        let changes = ensure_schema(&store.db.lock())?;
        if !changes.is_empty() {
            debug!(changes = changes.len(), "path index schema initialized");
        }
        Ok(store)
    }

    /// Verify the schema and apply missing parts.
    pub fn ensure_schema(&self) -> Result<Vec<SchemaChange>, StorageError> {
        Ok(ensure_schema(&self.db.lock())?)
    }

    /// Run one store operation with a single self-heal retry.
    fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, StorageError>
    where
        F: Fn(&mut Connection) -> rusqlite::Result<T>,
    {
        let mut conn = self.db.lock();
        let err = match f(&mut conn) {
            Ok(value) => return Ok(value),
            Err(err) if is_constraint_violation(&err) || is_conversion_failure(&err) => {
                return Err(StorageError::Database(err))
            }
            Err(err) => err,
        };

        warn!(operation, error = %err, "path index query failed, checking schema");
        match ensure_schema(&conn) {
            Ok(changes) if !changes.is_empty() => {
                let summary = changes
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                info!(operation, changes = %summary, "path index schema repaired");
                self.notifier
                    .notify(Notice::info(format!("Path index schema repaired: {}", summary)));
            }
            Ok(_) => {}
            Err(heal_err) => {
                warn!(operation, error = %heal_err, "path index schema repair failed");
                return Err(StorageError::Unavailable {
                    operation,
                    source: err,
                });
            }
        }

        f(&mut conn).map_err(|source| StorageError::Unavailable { operation, source })
    }

    /// Stored path for one node and locale. The root reads as `/`.
    pub fn get_path(&self, node_id: NodeId, locale: Locale) -> Result<Option<String>, StorageError> {
        let path = self.run("get_path", |conn| {
            conn.query_row(
                "SELECT path FROM pages_paths WHERE node_id = ?1 AND locale_id = ?2",
                params![sql_id(node_id)?, locale.id()],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })?;
        Ok(path.map(canonical_read))
    }

    /// Every locale variant stored for one node.
    pub fn get_all_paths(&self, node_id: NodeId) -> Result<PerLocale, StorageError> {
        let rows = self.run("get_all_paths", |conn| {
            let mut stmt = conn.prepare(
                "SELECT locale_id, path FROM pages_paths WHERE node_id = ?1 ORDER BY locale_id",
            )?;
            let rows = stmt
                .query_map(params![sql_id(node_id)?], |row| {
                    Ok((Locale::from_id(row.get(0)?), row.get::<_, String>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        Ok(rows
            .into_iter()
            .map(|(locale, path)| (locale, canonical_read(path)))
            .collect())
    }

    /// Find the node owning one of several candidate paths.
    ///
    /// Candidates are tried in caller order; within one candidate the default locale wins,
    /// then the lowest locale id.
    pub fn lookup_by_path(
        &self,
        candidates: &[String],
    ) -> Result<Option<(NodeId, Locale)>, StorageError> {
        let candidates: Vec<String> = candidates.iter().map(|c| canonical_write(c)).collect();
        if candidates.is_empty() {
            return Ok(None);
        }
        let placeholders = vec!["?"; candidates.len()].join(", ");
        let sql = format!(
            "SELECT node_id, locale_id, path FROM pages_paths WHERE path IN ({}) ORDER BY locale_id",
            placeholders
        );
        let rows = self.run("lookup_by_path", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(candidates.iter()), |row| {
                    Ok((
                        column_id(row, 0)?,
                        Locale::from_id(row.get(1)?),
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        Ok(candidates.iter().find_map(|candidate| {
            rows.iter()
                .find(|(_, _, path)| path == candidate)
                .map(|(node_id, locale, _)| (*node_id, *locale))
        }))
    }

    /// Joined lookup of a path and the owning node's attributes, any locale.
    pub fn lookup_info(&self, path: &str) -> Result<Option<PageInfo>, StorageError> {
        let path = canonical_write(path);
        self.run("lookup_info", |conn| {
            conn.query_row(
                "SELECT p.node_id, p.locale_id, p.path, n.type_id, n.parent_id, n.status
                 FROM pages_paths p JOIN nodes n ON n.id = p.node_id
                 WHERE p.path = ?1 ORDER BY p.locale_id LIMIT 1",
                params![path],
                read_page_info,
            )
            .optional()
        })
    }

    /// Joined lookup restricted to `preferred` and the default locale, preferring the former.
    pub fn lookup_info_in(
        &self,
        path: &str,
        preferred: Locale,
    ) -> Result<Option<PageInfo>, StorageError> {
        let path = canonical_write(path);
        self.run("lookup_info_in", |conn| {
            conn.query_row(
                "SELECT p.node_id, p.locale_id, p.path, n.type_id, n.parent_id, n.status
                 FROM pages_paths p JOIN nodes n ON n.id = p.node_id
                 WHERE p.path = ?1 AND p.locale_id IN (0, ?2)
                 ORDER BY (p.locale_id = ?2) DESC, p.locale_id LIMIT 1",
                params![path, preferred.id()],
                read_page_info,
            )
            .optional()
        })
    }

    /// Node currently owning `path` in `locale`.
    pub fn owner_of(&self, path: &str, locale: Locale) -> Result<Option<NodeId>, StorageError> {
        let path = canonical_write(path);
        self.run("owner_of", |conn| {
            conn.query_row(
                "SELECT node_id FROM pages_paths WHERE path = ?1 AND locale_id = ?2",
                params![path, locale.id()],
                |row| column_id(row, 0),
            )
            .optional()
        })
    }

    /// Insert or replace the supplied locale entries. Other locales are left untouched.
    pub fn upsert(&self, node_id: NodeId, paths: &PerLocale) -> Result<usize, StorageError> {
        self.write(node_id, paths, false)
    }

    /// Make the supplied locale entries the complete set for the node.
    pub fn replace(&self, node_id: NodeId, paths: &PerLocale) -> Result<usize, StorageError> {
        self.write(node_id, paths, true)
    }

    fn write(
        &self,
        node_id: NodeId,
        paths: &PerLocale,
        prune: bool,
    ) -> Result<usize, StorageError> {
        let rows: Vec<(Locale, String)> = paths
            .iter()
            .map(|(locale, path)| (locale, canonical_write(path)))
            .collect();

        let outcome: WriteOutcome = self.run("upsert", |conn| {
            let tx = conn.transaction()?;
            if prune {
                let existing = {
                    let mut stmt =
                        tx.prepare("SELECT locale_id FROM pages_paths WHERE node_id = ?1")?;
                    let ids = stmt
                        .query_map(params![sql_id(node_id)?], |row| row.get::<_, u32>(0))?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    ids
                };
                for locale_id in existing {
                    if !rows.iter().any(|(locale, _)| locale.id() == locale_id) {
                        tx.execute(
                            "DELETE FROM pages_paths WHERE node_id = ?1 AND locale_id = ?2",
                            params![sql_id(node_id)?, locale_id],
                        )?;
                    }
                }
            }
            for (locale, path) in &rows {
                match tx.execute(UPSERT_SQL, params![sql_id(node_id)?, locale.id(), path]) {
                    Ok(_) => {}
                    Err(err) if is_constraint_violation(&err) => {
                        return Ok(Err((*locale, path.clone())));
                    }
                    Err(err) => return Err(err),
                }
            }
            tx.commit()?;
            Ok(Ok(rows.len()))
        })?;

        match outcome {
            Ok(count) => {
                debug!(node_id, count, "paths written");
                Ok(count)
            }
            Err((locale, path)) => Err(StorageError::PathConflict {
                node_id,
                locale,
                path,
            }),
        }
    }

    /// Remove every locale entry of a node.
    pub fn delete_node(&self, node_id: NodeId) -> Result<usize, StorageError> {
        self.run("delete_node", |conn| {
            conn.execute(
                "DELETE FROM pages_paths WHERE node_id = ?1",
                params![sql_id(node_id)?],
            )
        })
    }

    /// Remove every entry of the nodes below this node.
    ///
    /// Descendants are the nodes whose default-locale path lies under this node's default
    /// path; all of their locale rows go. Rows of other nodes are untouched even when a
    /// locale-specific path shares the prefix. The root has no prefix and removes nothing.
    pub fn delete_descendants(&self, node_id: NodeId) -> Result<usize, StorageError> {
        let id = sql_id(node_id)?;
        self.run("delete_descendants", |conn| {
            let tx = conn.transaction()?;
            let default_path: Option<String> = tx
                .query_row(
                    "SELECT path FROM pages_paths WHERE node_id = ?1 AND locale_id = 0",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(prefix) = default_path.filter(|p| !p.is_empty()) else {
                return Ok(0);
            };

            let removed = tx.execute(
                "DELETE FROM pages_paths WHERE node_id IN (
                     SELECT node_id FROM pages_paths
                     WHERE locale_id = 0 AND node_id != ?1
                       AND substr(path, 1, length(?2) + 1) = ?2 || '/'
                 )",
                params![id, prefix],
            )?;
            tx.commit()?;
            Ok(removed)
        })
    }

    /// Remove every entry of one locale. The default locale is never removed this way.
    pub fn delete_locale(&self, locale: Locale) -> Result<usize, StorageError> {
        if locale.is_default() {
            warn!("refusing to delete default-locale paths");
            return Ok(0);
        }
        self.run("delete_locale", |conn| {
            conn.execute(
                "DELETE FROM pages_paths WHERE locale_id = ?1",
                params![locale.id()],
            )
        })
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<usize, StorageError> {
        self.run("clear", |conn| conn.execute("DELETE FROM pages_paths", []))
    }

    pub fn row_count(&self) -> Result<u64, StorageError> {
        let count = self.run("row_count", |conn| {
            conn.query_row("SELECT COUNT(*) FROM pages_paths", [], |row| {
                row.get::<_, i64>(0)
            })
        })?;
        Ok(count as u64)
    }

    /// All rows, ordered by node and locale.
    pub fn entries(&self) -> Result<Vec<PathEntry>, StorageError> {
        self.run("entries", |conn| {
            let mut stmt = conn.prepare(
                "SELECT node_id, locale_id, path FROM pages_paths ORDER BY node_id, locale_id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(PathEntry {
                        node_id: column_id(row, 0)?,
                        locale: Locale::from_id(row.get(1)?),
                        path: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Execute a node-id query built by the query adapter.
    pub fn select_node_ids(&self, query: &SelectQuery) -> Result<Vec<NodeId>, StorageError> {
        let (sql, values) = query.build();
        self.run("select_node_ids", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(params_from_iter(values.iter()), |row| column_id(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
    }
}

fn read_page_info(row: &Row<'_>) -> rusqlite::Result<PageInfo> {
    let parent = column_id(row, 4)?;
    Ok(PageInfo {
        node_id: column_id(row, 0)?,
        locale: Locale::from_id(row.get(1)?),
        path: canonical_read(row.get(2)?),
        type_id: column_id(row, 3)?,
        parent_id: if parent == 0 { None } else { Some(parent) },
        status: row.get(5)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}

/// Stored form: no leading or trailing slashes, root is empty.
fn canonical_write(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Read form: the root reads as `/`.
fn canonical_read(path: String) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path
    }
}
