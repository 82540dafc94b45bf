//! Tabular query results as delivered by the execution collaborator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A column header as delivered: either a bare name or an object with a `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawColumn {
    Name(String),
    Described { name: String },
}

impl RawColumn {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Described { name } => name,
        }
    }
}

/// A row as delivered: positional values or an object keyed by column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawRow {
    Positional(Vec<Value>),
    Keyed(Map<String, Value>),
}

/// Result shape exactly as the execution collaborator returns it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RawResults {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<RawRow>,
}

/// Normalized result: ordered column names and row-major values.
///
/// Column lookups are case-insensitive and resolved once at construction, so
/// consumers never probe `row.FOO` / `row.foo` variants themselves.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResults {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    index: HashMap<String, usize>,
}

impl QueryResults {
    /// Build from positional rows. Short rows are padded with nulls.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        let mut index = HashMap::with_capacity(width);
        for (i, column) in columns.iter().enumerate() {
            index.entry(column.to_uppercase()).or_insert(i);
        }
        Self {
            columns,
            rows,
            index,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `column`, compared case-insensitively.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(&column.to_uppercase()).copied()
    }

    /// Values of one column in row order; empty when the column is absent.
    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let idx = self.column_index(column);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
    }

    /// Row `i` as an object keyed by the original column names.
    pub fn row_object(&self, i: usize) -> Option<Map<String, Value>> {
        let row = self.rows.get(i)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }
}
