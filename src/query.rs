//! Query Adapter
//!
//! Translates path conditions from the selector layer into joins against the path index.
//! Each condition joins the path table under its own alias, so several path conditions can
//! be combined in one query.

use crate::error::QueryError;
use crate::sanitize::PathSanitizer;
use crate::store::{FTS_TABLE, PATHS_TABLE};
use crate::types::Locale;
use rusqlite::types::Value;
use std::str::FromStr;

/// Path comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    /// `*=`: phrase match through the full-text index
    ContainsPhrase,
    /// `~=`: every word present, through the full-text index
    ContainsWords,
    /// `%=`: substring match
    ContainsLike,
    /// `^=`: prefix match
    StartsWith,
    /// `$=`: suffix match
    EndsWith,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::ContainsPhrase => "*=",
            Operator::ContainsWords => "~=",
            Operator::ContainsLike => "%=",
            Operator::StartsWith => "^=",
            Operator::EndsWith => "$=",
        }
    }

    /// Whether the operator belongs to the full-text/substring family.
    pub fn is_fulltext(self) -> bool {
        matches!(
            self,
            Operator::ContainsPhrase
                | Operator::ContainsWords
                | Operator::ContainsLike
                | Operator::StartsWith
                | Operator::EndsWith
        )
    }

    fn comparison(self) -> Option<&'static str> {
        match self {
            Operator::Equal => Some("="),
            Operator::NotEqual => Some("!="),
            Operator::GreaterThan => Some(">"),
            Operator::LessThan => Some("<"),
            Operator::GreaterOrEqual => Some(">="),
            Operator::LessOrEqual => Some("<="),
            _ => None,
        }
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim() {
            "=" => Operator::Equal,
            "!=" => Operator::NotEqual,
            ">" => Operator::GreaterThan,
            "<" => Operator::LessThan,
            ">=" => Operator::GreaterOrEqual,
            "<=" => Operator::LessOrEqual,
            "*=" => Operator::ContainsPhrase,
            "~=" => Operator::ContainsWords,
            "%=" => Operator::ContainsLike,
            "^=" => Operator::StartsWith,
            "$=" => Operator::EndsWith,
            other => return Err(QueryError::UnknownOperator(other.to_string())),
        };
        Ok(op)
    }
}

/// A path-valued filter condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCondition {
    pub operator: Operator,
    /// Candidate values; more than one is OR'd together
    pub values: Vec<String>,
    pub negate: bool,
    pub locale: Locale,
}

impl PathCondition {
    pub fn new(operator: Operator, value: impl Into<String>) -> Self {
        Self {
            operator,
            values: vec![value.into()],
            negate: false,
            locale: Locale::Default,
        }
    }

    pub fn any_of(operator: Operator, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            operator,
            values: values.into_iter().map(Into::into).collect(),
            negate: false,
            locale: Locale::Default,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn in_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }
}

/// Minimal node-id select builder the adapter appends joins and clauses to
#[derive(Debug, Clone)]
pub struct SelectQuery {
    table: String,
    id_column: String,
    joins: Vec<String>,
    join_params: Vec<Value>,
    wheres: Vec<String>,
    where_params: Vec<Value>,
    order_by: Option<String>,
    aliases: usize,
}

impl SelectQuery {
    /// Select `id_column` from `table`.
    pub fn new(table: impl Into<String>, id_column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: id_column.into(),
            joins: Vec::new(),
            join_params: Vec::new(),
            wheres: Vec::new(),
            where_params: Vec::new(),
            order_by: None,
            aliases: 0,
        }
    }

    /// Qualified id column of the base table.
    pub fn id_expr(&self) -> String {
        format!("{}.{}", self.table, self.id_column)
    }

    /// Reserve a fresh alias with the given prefix.
    pub fn next_alias(&mut self, prefix: &str) -> String {
        self.aliases += 1;
        format!("{}{}", prefix, self.aliases)
    }

    pub fn join(&mut self, clause: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.joins.push(clause.into());
        self.join_params.extend(params);
        self
    }

    pub fn where_clause(&mut self, clause: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.wheres.push(clause.into());
        self.where_params.extend(params);
        self
    }

    pub fn order_by(&mut self, clause: impl Into<String>) -> &mut Self {
        self.order_by = Some(clause.into());
        self
    }

    /// SQL text and its positional parameters.
    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT DISTINCT {} FROM {}", self.id_expr(), self.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.wheres.join(" AND "));
        }
        let order = self.order_by.clone().unwrap_or_else(|| self.id_expr());
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);

        let mut params = self.join_params.clone();
        params.extend(self.where_params.iter().cloned());
        (sql, params)
    }
}

/// Emits path-index joins for path conditions
#[derive(Debug, Clone, Copy, Default)]
pub struct PathQueryAdapter {
    sanitizer: PathSanitizer,
}

impl PathQueryAdapter {
    pub fn new(sanitizer: PathSanitizer) -> Self {
        Self { sanitizer }
    }

    /// Join the path table and append the condition's match clause.
    pub fn apply(&self, query: &mut SelectQuery, condition: &PathCondition) -> Result<(), QueryError> {
        let op = condition.operator;
        if condition.values.is_empty() {
            return Err(QueryError::MissingValue);
        }
        if op.is_fulltext() {
            if condition.values.len() > 1 {
                return Err(QueryError::MultiValueUnsupported(op.symbol()));
            }
            if condition.negate {
                return Err(QueryError::NegateUnsupported(op.symbol()));
            }
        }

        let alias = query.next_alias("_pages_paths");
        let id_expr = query.id_expr();
        query.join(
            format!(
                "JOIN {table} AS {alias} ON {alias}.node_id = {id} AND {alias}.locale_id = 0",
                table = PATHS_TABLE,
                alias = alias,
                id = id_expr
            ),
            Vec::new(),
        );

        let (path_expr, rowid_expr) = match condition.locale {
            Locale::Named(id) if id != 0 => {
                let local = format!("{}l", alias);
                query.join(
                    format!(
                        "LEFT JOIN {table} AS {local} ON {local}.node_id = {id_expr} AND {local}.locale_id = ?",
                        table = PATHS_TABLE,
                        local = local,
                        id_expr = id_expr
                    ),
                    vec![Value::Integer(i64::from(id))],
                );
                (
                    format!("COALESCE({local}.path, {alias}.path)", local = local, alias = alias),
                    format!("COALESCE({local}.rowid, {alias}.rowid)", local = local, alias = alias),
                )
            }
            _ => (format!("{}.path", alias), format!("{}.rowid", alias)),
        };

        if let Some(cmp) = op.comparison() {
            let values: Vec<Value> = condition
                .values
                .iter()
                .map(|v| Value::Text(self.sanitizer.storage(v)))
                .collect();
            // Several values: `=` matches any of them, `!=` must differ from all of them.
            let joiner = if op == Operator::NotEqual { " AND " } else { " OR " };
            let clause = vec![format!("{} {} ?", path_expr, cmp); values.len()].join(joiner);
            let clause = if condition.negate {
                format!("NOT ({})", clause)
            } else {
                format!("({})", clause)
            };
            query.where_clause(clause, values);
            return Ok(());
        }

        let value = self.sanitizer.storage(&condition.values[0]);
        match op {
            Operator::ContainsPhrase | Operator::ContainsWords => {
                let expr = fts_expression(op, &value).ok_or(QueryError::MissingValue)?;
                query.where_clause(
                    format!(
                        "{rowid} IN (SELECT rowid FROM {fts} WHERE {fts} MATCH ?)",
                        rowid = rowid_expr,
                        fts = FTS_TABLE
                    ),
                    vec![Value::Text(expr)],
                );
            }
            _ => {
                let escaped = escape_like(&value);
                let pattern = match op {
                    Operator::StartsWith => format!("{}%", escaped),
                    Operator::EndsWith => format!("%{}", escaped),
                    _ => format!("%{}%", escaped),
                };
                query.where_clause(
                    format!("{} LIKE ? ESCAPE '\\'", path_expr),
                    vec![Value::Text(pattern)],
                );
            }
        }
        Ok(())
    }
}

/// FTS5 match expression for a sanitized value; `None` when it holds no words.
fn fts_expression(op: Operator, value: &str) -> Option<String> {
    let words: Vec<String> = value
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '%'))
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{}\"", w.replace('"', "\"\"")))
        .collect();
    if words.is_empty() {
        return None;
    }
    match op {
        Operator::ContainsPhrase => Some(format!("\"{}\"", value.replace('"', "\"\""))),
        _ => Some(words.join(" AND ")),
    }
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
