//! Values flowing into and out of templates.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

use super::entity::EntityContext;

/// A flat, string-keyed bag of template parameters or wizard inputs.
///
/// Values are JSON so lists (GUID sets) and records can flow between wizard steps.
/// Empty strings and `null` read as absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

/// Accumulated wizard inputs share the parameter representation.
pub type Inputs = Params;

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Insert only when `value` is present.
    pub fn insert_opt(&mut self, key: impl Into<String>, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.0.insert(key.into(), Value::String(value.to_string()));
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !is_blank(v))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// String form of a scalar value. Arrays and objects are not strings.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Non-negative integer, accepting numeric strings.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// List of strings. A scalar reads as a one-element list.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Overlay `other` onto `self`; keys in `other` win.
    pub fn merge(&mut self, other: &Params) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for Params {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// String form of a JSON scalar; `None` for null, arrays and objects.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Set of table names that exist in one schema, compared case-insensitively.
///
/// Names are stored uppercase, matching what the discovery collaborator reports.
/// Deserializing uppercases too.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct TableSet(BTreeSet<String>);

impl<'de> Deserialize<'de> for TableSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<String>::deserialize(deserializer).map(|names| names.into_iter().collect())
    }
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl AsRef<str>) -> bool {
        self.0.insert(name.as_ref().to_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(&name.to_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for TableSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TableSet::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

/// Why a template fell back to a discovery query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum DiscoveryReason {
    /// No viable database/schema/table could be resolved.
    MissingLocation { what: String },
    /// A parameter the query needs is absent (GUID, column, ...).
    MissingParameter { name: String },
    /// The wizard step names a template that does not exist.
    MissingTemplate { id: String },
}

impl DiscoveryReason {
    pub fn describe(&self) -> String {
        match self {
            Self::MissingLocation { what } => format!("could not locate {what}"),
            Self::MissingParameter { name } => format!("missing required parameter '{name}'"),
            Self::MissingTemplate { id } => format!("template '{id}' is not registered"),
        }
    }
}

/// What a template produced: a fully resolved query, or a safe fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum BuildOutcome {
    Resolved {
        sql: String,
    },
    Discovery {
        sql: String,
        /// Title to show instead of the recipe's own.
        title: String,
        reason: DiscoveryReason,
    },
}

impl BuildOutcome {
    pub fn resolved(sql: impl Into<String>) -> Self {
        Self::Resolved { sql: sql.into() }
    }

    pub fn discovery(sql: impl Into<String>, title: impl Into<String>, reason: DiscoveryReason) -> Self {
        Self::Discovery {
            sql: sql.into(),
            title: title.into(),
            reason,
        }
    }

    pub fn sql(&self) -> &str {
        match self {
            Self::Resolved { sql } | Self::Discovery { sql, .. } => sql,
        }
    }

    pub fn into_sql(self) -> String {
        match self {
            Self::Resolved { sql } | Self::Discovery { sql, .. } => sql,
        }
    }

    pub fn is_discovery(&self) -> bool {
        matches!(self, Self::Discovery { .. })
    }
}

/// Output of a flow invocation: a complete, ready-to-run query plus how to run it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuiltQuery {
    pub title: String,
    pub description: String,
    pub sql: String,
    pub database: String,
    pub schema: String,
    pub timeout_seconds: u64,
    pub row_limit: u64,
    pub flow_type: String,
    pub source_entity: EntityContext,
    /// True when the query is a discovery fallback because location data was missing.
    pub requires_context: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<DiscoveryReason>,
}
