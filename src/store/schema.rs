//! Path index schema and additive migrations
//!
//! `ensure_schema` is idempotent: it only touches what is missing or outdated and reports
//! each change it made.

use rusqlite::{params, Connection, OptionalExtension};
use std::fmt;

pub const PATHS_TABLE: &str = "pages_paths";
pub const FTS_TABLE: &str = "pages_paths_fts";

const CREATE_PATHS_TABLE: &str = r#"
    CREATE TABLE pages_paths (
        node_id INTEGER NOT NULL,
        locale_id INTEGER NOT NULL DEFAULT 0,
        path TEXT NOT NULL,
        PRIMARY KEY (node_id, locale_id)
    )
"#;

const INDEXES: [(&str, &str); 2] = [
    (
        "pages_paths_path_locale",
        "CREATE UNIQUE INDEX pages_paths_path_locale ON pages_paths(path, locale_id)",
    ),
    (
        "pages_paths_locale",
        "CREATE INDEX pages_paths_locale ON pages_paths(locale_id)",
    ),
];

const TRIGGERS: [(&str, &str); 3] = [
    (
        "pages_paths_ai",
        "CREATE TRIGGER pages_paths_ai AFTER INSERT ON pages_paths BEGIN
            INSERT INTO pages_paths_fts(rowid, path) VALUES (new.rowid, new.path);
        END",
    ),
    (
        "pages_paths_ad",
        "CREATE TRIGGER pages_paths_ad AFTER DELETE ON pages_paths BEGIN
            INSERT INTO pages_paths_fts(pages_paths_fts, rowid, path) VALUES ('delete', old.rowid, old.path);
        END",
    ),
    (
        "pages_paths_au",
        "CREATE TRIGGER pages_paths_au AFTER UPDATE ON pages_paths BEGIN
            INSERT INTO pages_paths_fts(pages_paths_fts, rowid, path) VALUES ('delete', old.rowid, old.path);
            INSERT INTO pages_paths_fts(rowid, path) VALUES (new.rowid, new.path);
        END",
    ),
];

/// One change applied by [`ensure_schema`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    CreatedTable,
    AddedColumn(&'static str),
    MigratedPrimaryKey,
    DroppedIndex(String),
    CreatedIndex(&'static str),
    CreatedFullText,
    CreatedTrigger(&'static str),
    RebuiltFullText,
}

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaChange::CreatedTable => write!(f, "created table {}", PATHS_TABLE),
            SchemaChange::AddedColumn(column) => write!(f, "added column {}", column),
            SchemaChange::MigratedPrimaryKey => write!(f, "moved primary key to (node_id, locale_id)"),
            SchemaChange::DroppedIndex(name) => write!(f, "dropped index {}", name),
            SchemaChange::CreatedIndex(name) => write!(f, "created index {}", name),
            SchemaChange::CreatedFullText => write!(f, "created full-text table {}", FTS_TABLE),
            SchemaChange::CreatedTrigger(name) => write!(f, "created trigger {}", name),
            SchemaChange::RebuiltFullText => write!(f, "rebuilt full-text index"),
        }
    }
}

struct Column {
    name: String,
    pk: i64,
}

/// Verify the path index schema and apply whatever is missing.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<Vec<SchemaChange>> {
    let mut changes = Vec::new();
    let mut refill_fts = false;

    let columns = table_columns(conn, PATHS_TABLE)?;
    if columns.is_empty() {
        conn.execute_batch(CREATE_PATHS_TABLE)?;
        changes.push(SchemaChange::CreatedTable);
        refill_fts = true;
    } else {
        let locale_column = columns.iter().find(|c| c.name == "locale_id");
        let locale_in_key = locale_column.map(|c| c.pk > 0).unwrap_or(false);
        if !locale_in_key {
            if locale_column.is_none() {
                changes.push(SchemaChange::AddedColumn("locale_id"));
            }
            migrate_primary_key(conn, locale_column.is_some())?;
            changes.push(SchemaChange::MigratedPrimaryKey);
            refill_fts = true;
        }
    }

    for name in single_path_unique_indexes(conn)? {
        conn.execute_batch(&format!("DROP INDEX \"{}\"", name))?;
        changes.push(SchemaChange::DroppedIndex(name));
    }

    for (name, sql) in INDEXES {
        if !object_exists(conn, "index", name)? {
            conn.execute_batch(sql)?;
            changes.push(SchemaChange::CreatedIndex(name));
        }
    }

    if !object_exists(conn, "table", FTS_TABLE)? {
        conn.execute_batch(
            "CREATE VIRTUAL TABLE pages_paths_fts USING fts5(path, content='pages_paths', content_rowid='rowid')",
        )?;
        changes.push(SchemaChange::CreatedFullText);
        refill_fts = true;
    }

    for (name, sql) in TRIGGERS {
        if !object_exists(conn, "trigger", name)? {
            conn.execute_batch(sql)?;
            changes.push(SchemaChange::CreatedTrigger(name));
            refill_fts = true;
        }
    }

    if refill_fts {
        conn.execute(
            "INSERT INTO pages_paths_fts(pages_paths_fts) VALUES ('rebuild')",
            [],
        )?;
        changes.push(SchemaChange::RebuiltFullText);
    }

    Ok(changes)
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<Column>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(Column {
                name: row.get(1)?,
                pk: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn object_exists(conn: &Connection, kind: &str, name: &str) -> rusqlite::Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2",
            params![kind, name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Unique indexes covering `path` alone, left over from single-locale layouts.
fn single_path_unique_indexes(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list(\"{}\")", PATHS_TABLE))?;
    let indexes = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stale = Vec::new();
    for (name, unique, origin) in indexes {
        if unique == 0 || origin != "c" {
            continue;
        }
        let mut info = conn.prepare(&format!("PRAGMA index_info(\"{}\")", name))?;
        let columns = info
            .query_map([], |row| row.get::<_, String>(2))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if columns == ["path"] {
            stale.push(name);
        }
    }
    Ok(stale)
}

/// Rebuild the table with the composite key, carrying rows over.
fn migrate_primary_key(conn: &Connection, has_locale_column: bool) -> rusqlite::Result<()> {
    let locale_expr = if has_locale_column { "locale_id" } else { "0" };
    let mut batch = String::from(
        "DROP TRIGGER IF EXISTS pages_paths_ai;
         DROP TRIGGER IF EXISTS pages_paths_ad;
         DROP TRIGGER IF EXISTS pages_paths_au;
         ALTER TABLE pages_paths RENAME TO pages_paths_legacy;",
    );
    batch.push_str(CREATE_PATHS_TABLE);
    batch.push(';');
    batch.push_str(&format!(
        "INSERT OR IGNORE INTO pages_paths (node_id, locale_id, path)
         SELECT node_id, {}, path FROM pages_paths_legacy;
         DROP TABLE pages_paths_legacy;",
        locale_expr
    ));
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&batch)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_creates_everything_once() {
        let conn = Connection::open_in_memory().unwrap();
        let first = ensure_schema(&conn).unwrap();
        assert!(first.contains(&SchemaChange::CreatedTable));
        assert!(first.contains(&SchemaChange::CreatedIndex("pages_paths_path_locale")));
        assert!(first.contains(&SchemaChange::CreatedFullText));

        let second = ensure_schema(&conn).unwrap();
        assert!(second.is_empty(), "unexpected changes: {:?}", second);
    }

    #[test]
    fn test_legacy_single_locale_table_is_migrated() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE pages_paths (node_id INTEGER PRIMARY KEY, path TEXT NOT NULL);
             CREATE UNIQUE INDEX legacy_path ON pages_paths(path);
             INSERT INTO pages_paths (node_id, path) VALUES (10, 'about'), (11, 'about/team');",
        )
        .unwrap();

        let changes = ensure_schema(&conn).unwrap();
        assert!(changes.contains(&SchemaChange::AddedColumn("locale_id")));
        assert!(changes.contains(&SchemaChange::MigratedPrimaryKey));

        let locale: u32 = conn
            .query_row(
                "SELECT locale_id FROM pages_paths WHERE node_id = 11",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(locale, 0);

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pages_paths_fts WHERE pages_paths_fts MATCH 'team'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);

        conn.execute(
            "INSERT INTO pages_paths (node_id, locale_id, path) VALUES (10, 5, 'about')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_stale_path_unique_index_is_replaced() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute_batch("CREATE UNIQUE INDEX only_path ON pages_paths(path)")
            .unwrap();

        let changes = ensure_schema(&conn).unwrap();
        assert_eq!(changes, vec![SchemaChange::DroppedIndex("only_path".to_string())]);
    }

    #[test]
    fn test_triggers_keep_full_text_in_sync() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO pages_paths (node_id, locale_id, path) VALUES (10, 0, 'about/team')",
            [],
        )
        .unwrap();
        conn.execute(
            "UPDATE pages_paths SET path = 'company/team' WHERE node_id = 10",
            [],
        )
        .unwrap();

        let count = |term: &str| -> i64 {
            conn.query_row(
                "SELECT COUNT(*) FROM pages_paths_fts WHERE pages_paths_fts MATCH ?1",
                params![term],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert_eq!(count("about"), 0);
        assert_eq!(count("company"), 1);

        conn.execute("DELETE FROM pages_paths", []).unwrap();
        assert_eq!(count("company"), 0);
    }
}
