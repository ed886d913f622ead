//! Typed, parametrized statement builder for the three logical tables.
//!
//! Identifiers come from closed enums ([`Table`], [`Column`]) plus a validated
//! table prefix; every value is bound as a parameter. The rendered SQL uses
//! backtick-quoted identifiers and `?` placeholders, which both SQLite and
//! MySQL accept, so one statement serves every backend.
//!
//! # Example
//!
//! ```rust,ignore
//! let names = TableNames::new("wp_")?;
//! let ids = [RecordId::new(7912), RecordId::new(8016)];
//! let condition = Condition::ids(Column::PostId, Comparator::Equals, &ids);
//! let stmt = Delete::new(Table::Attributes, condition).build(&names);
//! // DELETE FROM `wp_postmeta` WHERE `post_id` IN (?, ?)
//! ```

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use super::error::{DbError, DbResult};
use crate::models::RecordId;

/// Escape character used for `LIKE` patterns.
///
/// `!` rather than a backslash: MySQL treats backslashes in string literals
/// as escapes while SQLite does not.
const LIKE_ESCAPE: char = '!';

/// Logical tables touched by the sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Primary records (`posts`).
    Records,
    /// Translation links (`icl_translations`), keyed by `element_id`.
    TranslationLinks,
    /// Attribute rows (`postmeta`), keyed by `post_id`.
    Attributes,
}

impl Table {
    /// Cascade order for deletions: primary first, then dependents.
    pub const CASCADE: [Table; 3] = [Table::Records, Table::TranslationLinks, Table::Attributes];

    fn base_name(self) -> &'static str {
        match self {
            Table::Records => "posts",
            Table::TranslationLinks => "icl_translations",
            Table::Attributes => "postmeta",
        }
    }

    /// Column that references a primary record id.
    pub fn record_key(self) -> Column {
        match self {
            Table::Records => Column::Id,
            Table::TranslationLinks => Column::ElementId,
            Table::Attributes => Column::PostId,
        }
    }
}

/// Columns referenced by the sweeper's statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Title,
    Name,
    Kind,
    Status,
    Guid,
    ElementId,
    PostId,
    MetaId,
    MetaKey,
    MetaValue,
}

impl Column {
    pub fn as_str(self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::Title => "post_title",
            Column::Name => "post_name",
            Column::Kind => "post_type",
            Column::Status => "post_status",
            Column::Guid => "guid",
            Column::ElementId => "element_id",
            Column::PostId => "post_id",
            Column::MetaId => "meta_id",
            Column::MetaKey => "meta_key",
            Column::MetaValue => "meta_value",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves logical tables to physical names under a validated prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    prefix: String,
}

impl TableNames {
    /// The prefix is spliced into identifiers, so it is restricted to
    /// `[A-Za-z0-9_]`.
    pub fn new(prefix: impl Into<String>) -> DbResult<Self> {
        let prefix = prefix.into();
        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DbError::Validation(format!(
                "invalid table prefix '{prefix}': only letters, digits and '_' are allowed"
            )));
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn name(&self, table: Table) -> String {
        format!("{}{}", self.prefix, table.base_name())
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            prefix: "wp_".to_string(),
        }
    }
}

/// How a column is compared against a list of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// `=` / `IN`.
    #[default]
    Equals,
    /// `<>` / `NOT IN`.
    NotEquals,
    /// `LIKE` against each value, OR-ed together.
    Like,
    /// `>` against a single value (keyset pagination).
    GreaterThan,
}

/// A bound parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

impl From<RecordId> for SqlValue {
    fn from(id: RecordId) -> Self {
        SqlValue::Int(id.as_i64())
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        SqlValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

/// Escape `LIKE` metacharacters so `value` matches literally.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// One WHERE-clause predicate. Multiple conditions are AND-ed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Match {
        column: Column,
        comparator: Comparator,
        values: Vec<SqlValue>,
    },
    /// The record has at least one attribute row under this key.
    HasAttribute(String),
}

impl Condition {
    pub fn new(column: Column, comparator: Comparator, values: Vec<SqlValue>) -> Self {
        Condition::Match {
            column,
            comparator,
            values,
        }
    }

    pub fn equals(column: Column, value: impl Into<SqlValue>) -> Self {
        Self::new(column, Comparator::Equals, vec![value.into()])
    }

    /// Match a concrete id list with the given comparator.
    ///
    /// With [`Comparator::Like`] ids are bound as text, which matches exactly
    /// since ids contain no pattern characters.
    pub fn ids(column: Column, comparator: Comparator, ids: &[RecordId]) -> Self {
        let values = ids
            .iter()
            .map(|id| match comparator {
                Comparator::Like => SqlValue::Text(id.to_string()),
                _ => SqlValue::from(*id),
            })
            .collect();
        Self::new(column, comparator, values)
    }

    /// Values in `column` that start with `prefix`, matched literally.
    pub fn starts_with(column: Column, prefix: &str) -> Self {
        Self::new(
            column,
            Comparator::Like,
            vec![SqlValue::Text(format!("{}%", escape_like(prefix)))],
        )
    }

    fn render(&self, names: &TableNames, sql: &mut String, params: &mut Vec<SqlValue>) {
        match self {
            Condition::Match {
                column,
                comparator,
                values,
            } => render_match(*column, *comparator, values, sql, params),
            Condition::HasAttribute(key) => {
                let _ = write!(
                    sql,
                    "`{}` IN (SELECT `{}` FROM `{}` WHERE `{}` = ?)",
                    Column::Id,
                    Column::PostId,
                    names.name(Table::Attributes),
                    Column::MetaKey,
                );
                params.push(SqlValue::Text(key.clone()));
            }
        }
    }
}

fn render_match(
    column: Column,
    comparator: Comparator,
    values: &[SqlValue],
    sql: &mut String,
    params: &mut Vec<SqlValue>,
) {
    let placeholders = |n: usize| vec!["?"; n].join(", ");

    match (comparator, values.len()) {
        (Comparator::Equals | Comparator::Like | Comparator::GreaterThan, 0) => {
            sql.push_str("1 = 0");
            return;
        }
        (Comparator::NotEquals, 0) => {
            sql.push_str("1 = 1");
            return;
        }
        (Comparator::Equals, 1) => {
            let _ = write!(sql, "`{column}` = ?");
        }
        (Comparator::Equals, n) => {
            let _ = write!(sql, "`{column}` IN ({})", placeholders(n));
        }
        (Comparator::NotEquals, 1) => {
            let _ = write!(sql, "`{column}` <> ?");
        }
        (Comparator::NotEquals, n) => {
            let _ = write!(sql, "`{column}` NOT IN ({})", placeholders(n));
        }
        (Comparator::Like, n) => {
            let clause = vec![format!("`{column}` LIKE ? ESCAPE '{LIKE_ESCAPE}'"); n].join(" OR ");
            if n == 1 {
                sql.push_str(&clause);
            } else {
                let _ = write!(sql, "({clause})");
            }
        }
        (Comparator::GreaterThan, _) => {
            let _ = write!(sql, "`{column}` > ?");
            params.push(values[0].clone());
            return;
        }
    }
    params.extend(values.iter().cloned());
}

fn render_where(
    conditions: &[Condition],
    names: &TableNames,
    sql: &mut String,
    params: &mut Vec<SqlValue>,
) {
    for (i, condition) in conditions.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        condition.render(names, sql, params);
    }
}

/// A rendered statement with its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Human-readable rendering with parameters inlined.
    ///
    /// Only for dry-run output and logs; never executed.
    pub fn preview(&self) -> String {
        let mut out = String::with_capacity(self.sql.len() + self.params.len() * 8);
        let mut params = self.params.iter();
        for c in self.sql.chars() {
            if c == '?' {
                match params.next() {
                    Some(SqlValue::Int(v)) => {
                        let _ = write!(out, "{v}");
                    }
                    Some(SqlValue::Text(v)) => {
                        let _ = write!(out, "'{}'", v.replace('\'', "''"));
                    }
                    None => out.push('?'),
                }
            } else {
                out.push(c);
            }
        }
        out.push(';');
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preview())
    }
}

/// SELECT builder.
#[derive(Debug, Clone)]
pub struct Select {
    table: Table,
    columns: Vec<Column>,
    conditions: Vec<Condition>,
    order_by: Vec<Column>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    pub fn new(table: Table, columns: &[Column]) -> Self {
        Self {
            table,
            columns: columns.to_vec(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn order_by(mut self, column: Column) -> Self {
        self.order_by.push(column);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn build(&self, names: &TableNames) -> Statement {
        let mut params = Vec::new();
        let columns = self
            .columns
            .iter()
            .map(|c| format!("`{c}`"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {columns} FROM `{}`", names.name(self.table));

        render_where(&self.conditions, names, &mut sql, &mut params);

        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|c| format!("`{c}` ASC"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(sql, " ORDER BY {order}");
        }
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(SqlValue::from(limit));
            if let Some(offset) = self.offset {
                sql.push_str(" OFFSET ?");
                params.push(SqlValue::from(offset));
            }
        }

        Statement { sql, params }
    }
}

/// DELETE builder. Always carries at least one condition.
#[derive(Debug, Clone)]
pub struct Delete {
    table: Table,
    conditions: Vec<Condition>,
}

impl Delete {
    pub fn new(table: Table, condition: Condition) -> Self {
        Self {
            table,
            conditions: vec![condition],
        }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn build(&self, names: &TableNames) -> Statement {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM `{}`", names.name(self.table));
        render_where(&self.conditions, names, &mut sql, &mut params);
        Statement { sql, params }
    }
}
