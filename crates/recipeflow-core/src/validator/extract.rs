//! Table references in generated SQL.
//!
//! SQL is parsed with the Snowflake dialect and the relations in FROM/JOIN
//! position are collected, excluding CTE names. SQL that does not parse is scanned
//! with a comment-stripping regex instead.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{ObjectName, ObjectNamePart, Query, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::SnowflakeDialect;
use sqlparser::parser::{Parser, ParserError};

/// A table named in a query, as written (unquoted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub table: String,
    /// The reference exactly as it appeared in the SQL text.
    pub text: String,
}

impl TableRef {
    fn from_parts(mut parts: Vec<String>, text: String) -> Option<Self> {
        let table = parts.pop()?;
        let schema = parts.pop();
        let database = parts.pop();
        Some(Self {
            database,
            schema,
            table,
            text,
        })
    }

    fn key(&self) -> String {
        [self.database.as_deref(), self.schema.as_deref(), Some(&self.table)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".")
            .to_uppercase()
    }
}

/// Table references of one SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedTables {
    pub tables: Vec<TableRef>,
    /// True when the SQL did not parse and the regex scan was used.
    pub used_fallback: bool,
}

pub(crate) fn parse_snowflake(sql: &str) -> Result<Vec<Statement>, ParserError> {
    Parser::parse_sql(&SnowflakeDialect {}, sql)
}

/// Extract the tables `sql` reads from, in order of first appearance, without
/// duplicates.
pub fn extract_table_refs(sql: &str) -> ExtractedTables {
    let (tables, used_fallback) = match parse_snowflake(sql) {
        Ok(statements) => {
            let mut walker = RelationWalker::default();
            for statement in &statements {
                walker.statement(statement);
            }
            (walker.tables, false)
        }
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %_err, "SQL did not parse; scanning FROM/JOIN targets");
            (scan_table_refs(sql), true)
        }
    };

    let mut seen = HashSet::new();
    ExtractedTables {
        tables: tables.into_iter().filter(|t| seen.insert(t.key())).collect(),
        used_fallback,
    }
}

fn object_name_parts(name: &ObjectName) -> Vec<String> {
    name.0
        .iter()
        .filter_map(ObjectNamePart::as_ident)
        .map(|ident| ident.value.clone())
        .collect()
}

#[derive(Default)]
struct RelationWalker {
    tables: Vec<TableRef>,
    // CTE names in scope; references to them are not tables.
    ctes: Vec<HashSet<String>>,
}

impl RelationWalker {
    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Query(query) => self.query(query),
            Statement::Insert(insert) => {
                if let Some(source) = &insert.source {
                    self.query(source);
                }
            }
            Statement::CreateTable(create) => {
                if let Some(query) = &create.query {
                    self.query(query);
                }
            }
            _ => {}
        }
    }

    fn query(&mut self, query: &Query) {
        let mut scope = HashSet::new();
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                scope.insert(cte.alias.name.value.to_uppercase());
            }
        }
        self.ctes.push(scope);
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.query(&cte.query);
            }
        }
        self.set_expr(&query.body);
        self.ctes.pop();
    }

    fn set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => {
                for from in &select.from {
                    self.table_with_joins(from);
                }
            }
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation { left, right, .. } => {
                self.set_expr(left);
                self.set_expr(right);
            }
            _ => {}
        }
    }

    fn table_with_joins(&mut self, from: &TableWithJoins) {
        self.table_factor(&from.relation);
        for join in &from.joins {
            self.table_factor(&join.relation);
        }
    }

    fn table_factor(&mut self, factor: &TableFactor) {
        match factor {
            TableFactor::Table { name, .. } => {
                let parts = object_name_parts(name);
                if parts.len() == 1 && self.is_cte(&parts[0]) {
                    return;
                }
                if let Some(table) = TableRef::from_parts(parts, name.to_string()) {
                    self.tables.push(table);
                }
            }
            TableFactor::Derived { subquery, .. } => self.query(subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.table_with_joins(table_with_joins),
            _ => {}
        }
    }

    fn is_cte(&self, name: &str) -> bool {
        let upper = name.to_uppercase();
        self.ctes.iter().any(|scope| scope.contains(&upper))
    }
}

const NOT_TABLES: &[&str] = &[
    "SELECT", "WHERE", "AND", "OR", "NOT", "IN", "EXISTS", "AS", "ON", "LEFT", "RIGHT", "INNER",
    "OUTER", "CROSS",
];

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)--.*?$").expect("valid regex"));
static TABLE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:FROM|JOIN)\s+((?:[A-Za-z_][A-Za-z0-9_$]*|"(?:[^"]|"")+")(?:\.(?:[A-Za-z_][A-Za-z0-9_$]*|"(?:[^"]|"")+")){0,2})"#,
    )
    .expect("valid regex")
});

fn unquote(part: &str) -> String {
    part.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .map(|inner| inner.replace("\"\"", "\""))
        .unwrap_or_else(|| part.to_string())
}

/// Split a dotted reference on dots outside double quotes.
fn split_reference(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            '.' if !quoted => parts.push(unquote(&std::mem::take(&mut current))),
            _ => current.push(c),
        }
    }
    parts.push(unquote(&current));
    parts
}

/// Regex scan of `FROM`/`JOIN` targets with comments removed.
pub(crate) fn scan_table_refs(sql: &str) -> Vec<TableRef> {
    let clean = BLOCK_COMMENT.replace_all(sql, " ");
    let clean = LINE_COMMENT.replace_all(&clean, "");

    TABLE_REFERENCE
        .captures_iter(&clean)
        .filter_map(|caps| {
            let text = caps.get(1)?.as_str();
            let parts = split_reference(text);
            if parts.len() == 1 && NOT_TABLES.contains(&parts[0].to_uppercase().as_str()) {
                return None;
            }
            TableRef::from_parts(parts, text.to_string())
        })
        .collect()
}
