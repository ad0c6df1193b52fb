//! SQLite host tree adapter
//!
//! Reads the authoritative tree from a `nodes` table plus a `node_names` table holding
//! locale-specific name overrides. The mutation helpers exist for hosts and tests that
//! need a small working tree; they do not notify the index themselves.

use crate::db::{column_id, sql_id, Database};
use crate::error::TreeError;
use crate::tree::{TreeNode, TreeSource};
use crate::types::{Locale, NodeId, PerLocale};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::Arc;

/// Host node table joined by page-info lookups and path conditions
pub const NODES_TABLE: &str = "nodes";

const NODE_COLUMNS: &str = "n.id, n.parent_id, n.name, n.type_id, n.status, \
     (SELECT COUNT(*) FROM nodes c WHERE c.parent_id = n.id)";

/// Tree source backed by the host's SQLite node table
pub struct SqliteTree {
    db: Arc<Database>,
    root_id: NodeId,
}

impl SqliteTree {
    /// Attach to the node tables, creating them when missing.
    pub fn new(db: Arc<Database>, root_id: NodeId) -> Result<Self, TreeError> {
        db.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY,
                parent_id INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                type_id INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 1,
                sort INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS nodes_parent ON nodes(parent_id);
            CREATE TABLE IF NOT EXISTS node_names (
                node_id INTEGER NOT NULL,
                locale_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                PRIMARY KEY (node_id, locale_id)
            );
            "#,
        )?;
        Ok(Self { db, root_id })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Insert a node. `parent` is `None` only for the root.
    pub fn insert_node(
        &self,
        id: NodeId,
        parent: Option<NodeId>,
        name: &str,
        type_id: u64,
    ) -> Result<(), TreeError> {
        let conn = self.db.lock();
        let sort: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE parent_id = ?1",
            params![sql_id(parent.unwrap_or(0))?],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO nodes (id, parent_id, name, type_id, status, sort) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![sql_id(id)?, sql_id(parent.unwrap_or(0))?, name, sql_id(type_id)?, sort],
        )?;
        Ok(())
    }

    /// Change a node's default-locale name.
    pub fn rename(&self, id: NodeId, name: &str) -> Result<(), TreeError> {
        self.db.lock().execute(
            "UPDATE nodes SET name = ?2 WHERE id = ?1",
            params![sql_id(id)?, name],
        )?;
        Ok(())
    }

    /// Set or clear a locale-specific name. The default locale maps to [`Self::rename`].
    pub fn set_locale_name(
        &self,
        id: NodeId,
        locale: Locale,
        name: Option<&str>,
    ) -> Result<(), TreeError> {
        if locale.is_default() {
            return match name {
                Some(name) => self.rename(id, name),
                None => Ok(()),
            };
        }
        let conn = self.db.lock();
        match name {
            Some(name) => conn.execute(
                "INSERT INTO node_names (node_id, locale_id, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(node_id, locale_id) DO UPDATE SET name = excluded.name",
                params![sql_id(id)?, locale.id(), name],
            )?,
            None => conn.execute(
                "DELETE FROM node_names WHERE node_id = ?1 AND locale_id = ?2",
                params![sql_id(id)?, locale.id()],
            )?,
        };
        Ok(())
    }

    /// Re-parent a node.
    pub fn move_node(&self, id: NodeId, parent: NodeId) -> Result<(), TreeError> {
        self.db.lock().execute(
            "UPDATE nodes SET parent_id = ?2 WHERE id = ?1",
            params![sql_id(id)?, sql_id(parent)?],
        )?;
        Ok(())
    }

    pub fn set_status(&self, id: NodeId, status: u32) -> Result<(), TreeError> {
        self.db.lock().execute(
            "UPDATE nodes SET status = ?2 WHERE id = ?1",
            params![sql_id(id)?, status],
        )?;
        Ok(())
    }

    /// Remove one node and its names. Descendants are left to the caller.
    pub fn remove_node(&self, id: NodeId) -> Result<(), TreeError> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM node_names WHERE node_id = ?1", params![sql_id(id)?])?;
        conn.execute("DELETE FROM nodes WHERE id = ?1", params![sql_id(id)?])?;
        Ok(())
    }

    /// Drop every name defined for a locale.
    pub fn remove_locale(&self, locale: Locale) -> Result<(), TreeError> {
        if locale.is_default() {
            return Ok(());
        }
        self.db.lock().execute(
            "DELETE FROM node_names WHERE locale_id = ?1",
            params![locale.id()],
        )?;
        Ok(())
    }

    fn read_node(row: &Row<'_>) -> rusqlite::Result<TreeNode> {
        let parent = column_id(row, 1)?;
        let name: String = row.get(2)?;
        Ok(TreeNode {
            id: column_id(row, 0)?,
            parent_id: if parent == 0 { None } else { Some(parent) },
            names: PerLocale::with_default(name),
            type_id: column_id(row, 3)?,
            status: row.get(4)?,
            child_count: column_id(row, 5)?,
        })
    }

    fn load_names(
        conn: &Connection,
        sql: &str,
        key: NodeId,
    ) -> Result<HashMap<NodeId, Vec<(Locale, String)>>, TreeError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![sql_id(key)?], |row| {
            Ok((
                column_id(row, 0)?,
                Locale::from_id(row.get(1)?),
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut names: HashMap<NodeId, Vec<(Locale, String)>> = HashMap::new();
        for row in rows {
            let (node_id, locale, name) = row?;
            names.entry(node_id).or_default().push((locale, name));
        }
        Ok(names)
    }
}

impl TreeSource for SqliteTree {
    fn root_id(&self) -> NodeId {
        self.root_id
    }

    fn node(&self, id: NodeId) -> Result<Option<TreeNode>, TreeError> {
        let conn = self.db.lock();
        let node = conn
            .query_row(
                &format!("SELECT {} FROM nodes n WHERE n.id = ?1", NODE_COLUMNS),
                params![sql_id(id)?],
                Self::read_node,
            )
            .optional()?;
        let Some(mut node) = node else {
            return Ok(None);
        };
        let mut names = Self::load_names(
            &conn,
            "SELECT node_id, locale_id, name FROM node_names WHERE node_id = ?1",
            id,
        )?;
        for (locale, name) in names.remove(&id).unwrap_or_default() {
            node.names.insert(locale, name);
        }
        Ok(Some(node))
    }

    fn children(&self, id: NodeId) -> Result<Vec<TreeNode>, TreeError> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM nodes n WHERE n.parent_id = ?1 AND n.id != ?1 ORDER BY n.sort, n.id",
            NODE_COLUMNS
        ))?;
        let mut children = stmt
            .query_map(params![sql_id(id)?], Self::read_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut names = Self::load_names(
            &conn,
            "SELECT nn.node_id, nn.locale_id, nn.name FROM node_names nn
             JOIN nodes n ON n.id = nn.node_id WHERE n.parent_id = ?1",
            id,
        )?;
        for child in &mut children {
            for (locale, name) in names.remove(&child.id).unwrap_or_default() {
                child.names.insert(locale, name);
            }
        }
        Ok(children)
    }

    fn node_count(&self) -> Result<u64, TreeError> {
        let count: i64 = self
            .db
            .lock()
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
