//! Declarative extraction of values from query results.
//!
//! Wizard steps name an [`Extractor`] for each output binding. After the caller
//! executes a step's query, the raw result is normalized once with
//! [`normalize_results`] and every binding is evaluated against it to produce the
//! inputs of the next step.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{QueryResults, RawResults, RawRow};

/// Normalize a result as delivered by the execution collaborator.
///
/// Positional rows are taken as-is. Keyed rows are matched to the column list
/// case-insensitively; when no column list was delivered, columns are taken from
/// the keys of the keyed rows in order of first appearance.
pub fn normalize_results(raw: &RawResults) -> QueryResults {
    let mut columns: Vec<String> = raw.columns.iter().map(|c| c.name().to_string()).collect();
    if columns.is_empty() {
        let mut seen = HashSet::new();
        for row in &raw.rows {
            if let RawRow::Keyed(map) = row {
                for key in map.keys() {
                    if seen.insert(key.to_uppercase()) {
                        columns.push(key.clone());
                    }
                }
            }
        }
    }

    let rows = raw
        .rows
        .iter()
        .map(|row| match row {
            RawRow::Positional(values) => values.clone(),
            RawRow::Keyed(map) => {
                let by_upper: HashMap<String, &Value> =
                    map.iter().map(|(k, v)| (k.to_uppercase(), v)).collect();
                columns
                    .iter()
                    .map(|column| {
                        map.get(column)
                            .or_else(|| by_upper.get(&column.to_uppercase()).copied())
                            .cloned()
                            .unwrap_or(Value::Null)
                    })
                    .collect()
            }
        })
        .collect();

    QueryResults::new(columns, rows)
}

/// One extraction rule. Serialized with a `mode` tag, e.g.
/// `{"mode": "collect_array", "column": "GUID", "limit": 10}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Extractor {
    /// Non-null values of one column in row order.
    CollectArray {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    /// First value containing `match` (case-insensitive), else the first row's value.
    FindFirst {
        column: String,
        #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    /// Distinct non-null values pooled across several columns, first seen first.
    UniqueArray {
        columns: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    FirstValue {
        column: String,
    },
    RowCount,
    HasRows,
    /// Whether any row's value equals `match`, ignoring case.
    HasValue {
        column: String,
        #[serde(rename = "match")]
        pattern: String,
    },
    /// Leading rows as objects keyed by column name.
    RowsSlice {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    /// Every row projected onto `columns`.
    ObjectArray {
        columns: Vec<String>,
    },
    /// GUIDs mined from JSON-encoded arrays (lineage `INPUTS`/`OUTPUTS`).
    ///
    /// Accepts native arrays, JSON text, and objects carrying the GUID under `key`.
    /// Text that is not JSON is scanned for GUID-shaped substrings.
    JsonArrayValues {
        columns: Vec<String>,
        #[serde(default = "default_guid_key")]
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
}

fn default_guid_key() -> String {
    "guid".to_string()
}

fn capped(limit: Option<usize>) -> usize {
    limit.unwrap_or(usize::MAX)
}

/// String view used for case-insensitive comparisons.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl Extractor {
    /// Every `mode` tag an extractor can be written with.
    pub const MODES: &'static [&'static str] = &[
        "collect_array",
        "find_first",
        "unique_array",
        "first_value",
        "row_count",
        "has_rows",
        "has_value",
        "rows_slice",
        "object_array",
        "json_array_values",
    ];

    /// Evaluate against normalized results. Never fails; an empty result yields
    /// `[]`, `null`, `0`, or `false` depending on the mode.
    pub fn extract(&self, results: &QueryResults) -> Value {
        match self {
            Self::CollectArray { column, limit } => Value::Array(
                results
                    .column_values(column)
                    .filter(|v| !v.is_null())
                    .take(capped(*limit))
                    .cloned()
                    .collect(),
            ),
            Self::FindFirst { column, pattern } => {
                let needle = pattern.as_deref().map(str::to_lowercase);
                let matched = needle.as_ref().and_then(|needle| {
                    results.column_values(column).find(|v| {
                        text(v).is_some_and(|t| t.to_lowercase().contains(needle.as_str()))
                    })
                });
                matched
                    .or_else(|| results.column_values(column).next())
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            Self::UniqueArray { columns, limit } => {
                let limit = capped(*limit);
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                'rows: for i in 0..results.row_count() {
                    for column in columns {
                        let Some(value) = cell(results, i, column) else {
                            continue;
                        };
                        if out.len() >= limit {
                            break 'rows;
                        }
                        if seen.insert(value.to_string()) {
                            out.push(value.clone());
                        }
                    }
                }
                Value::Array(out)
            }
            Self::FirstValue { column } => results
                .column_values(column)
                .next()
                .cloned()
                .unwrap_or(Value::Null),
            Self::RowCount => Value::from(results.row_count()),
            Self::HasRows => Value::Bool(!results.is_empty()),
            Self::HasValue { column, pattern } => Value::Bool(
                results
                    .column_values(column)
                    .filter_map(text)
                    .any(|t| t.to_lowercase() == pattern.to_lowercase()),
            ),
            Self::RowsSlice { limit } => Value::Array(
                (0..results.row_count())
                    .take(capped(*limit))
                    .filter_map(|i| results.row_object(i))
                    .map(Value::Object)
                    .collect(),
            ),
            Self::ObjectArray { columns } => Value::Array(
                (0..results.row_count())
                    .map(|i| {
                        let record: Map<String, Value> = columns
                            .iter()
                            .map(|c| (c.clone(), cell(results, i, c).cloned().unwrap_or(Value::Null)))
                            .collect();
                        Value::Object(record)
                    })
                    .collect(),
            ),
            Self::JsonArrayValues {
                columns,
                key,
                limit,
            } => {
                let limit = capped(*limit);
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for i in 0..results.row_count() {
                    for column in columns {
                        let Some(value) = cell(results, i, column) else {
                            continue;
                        };
                        for guid in guids_in(value, key, false) {
                            if out.len() < limit && seen.insert(guid.clone()) {
                                out.push(Value::String(guid));
                            }
                        }
                    }
                }
                Value::Array(out)
            }
        }
    }
}

fn cell<'a>(results: &'a QueryResults, row: usize, column: &str) -> Option<&'a Value> {
    let idx = results.column_index(column)?;
    results.rows().get(row)?.get(idx).filter(|v| !v.is_null())
}

static GUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}")
        .expect("valid regex")
});

/// GUIDs in one cell. Items of a JSON array are taken as-is; free text only
/// yields GUID-shaped substrings.
fn guids_in(value: &Value, key: &str, in_array: bool) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .flat_map(|item| guids_in(item, key, true))
            .collect(),
        Value::Object(map) => map
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| text(v))
            .into_iter()
            .collect(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with(['[', '{']) {
                if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                    return guids_in(&parsed, key, in_array);
                }
            } else if in_array && !trimmed.is_empty() {
                return vec![trimmed.to_string()];
            }
            GUID_PATTERN
                .find_iter(trimmed)
                .map(|m| m.as_str().to_string())
                .collect()
        }
        _ => Vec::new(),
    }
}

/// An output binding as written in a recipe. Specs that are not a known extractor
/// are kept and evaluate to `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ExtractorSpec {
    Known(Extractor),
    Unknown(Value),
}

impl ExtractorSpec {
    pub fn extract(&self, results: &QueryResults) -> Value {
        match self {
            Self::Known(extractor) => extractor.extract(results),
            Self::Unknown(_) => Value::Null,
        }
    }

    /// Mode name of an unrecognized binding.
    pub fn mode(&self) -> Option<&str> {
        match self {
            Self::Known(_) => None,
            Self::Unknown(value) => value.get("mode").and_then(Value::as_str),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Whether an unrecognized binding names a real mode but has bad or
    /// missing fields.
    pub fn is_malformed(&self) -> bool {
        self.mode().is_some_and(|mode| Extractor::MODES.contains(&mode))
    }

    /// Why the binding is not a usable extractor; `None` when it is.
    pub fn problem(&self) -> Option<String> {
        let Self::Unknown(value) = self else {
            return None;
        };
        Some(match self.mode() {
            None => "binding has no extractor mode".to_string(),
            Some(mode) if self.is_malformed() => {
                match serde_json::from_value::<Extractor>(value.clone()) {
                    Err(err) => format!("extractor '{mode}' is invalid: {err}"),
                    Ok(_) => format!("extractor '{mode}' is invalid"),
                }
            }
            Some(mode) => format!("unknown extractor mode '{mode}'"),
        })
    }
}

impl From<Extractor> for ExtractorSpec {
    fn from(extractor: Extractor) -> Self {
        Self::Known(extractor)
    }
}

/// Output bindings of a wizard step, by output name.
pub type OutputBindings = BTreeMap<String, ExtractorSpec>;

/// Evaluate every binding and collect the values by name.
pub fn extract_bindings(bindings: &OutputBindings, results: &QueryResults) -> Map<String, Value> {
    bindings
        .iter()
        .map(|(name, spec)| (name.clone(), spec.extract(results)))
        .collect()
}

/// [`extract_bindings`] as a reusable closure over `bindings`.
pub fn build_extractor_from_bindings(
    bindings: &OutputBindings,
) -> impl Fn(&QueryResults) -> Map<String, Value> + '_ {
    move |results| extract_bindings(bindings, results)
}
