//! Entity types: the canonical description of the asset a user selected.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of metadata asset.
///
/// `Unknown` doubles as the wildcard in a recipe's supported entity types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
    Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Table,
    View,
    Column,
    Database,
    Schema,
    Dashboard,
    Pipeline,
    Process,
    GlossaryTerm,
    Metric,
    Connection,
    #[default]
    Unknown,
}

impl EntityType {
    pub const ALL: [EntityType; 12] = [
        EntityType::Table,
        EntityType::View,
        EntityType::Column,
        EntityType::Database,
        EntityType::Schema,
        EntityType::Dashboard,
        EntityType::Pipeline,
        EntityType::Process,
        EntityType::GlossaryTerm,
        EntityType::Metric,
        EntityType::Connection,
        EntityType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::Column => "COLUMN",
            Self::Database => "DATABASE",
            Self::Schema => "SCHEMA",
            Self::Dashboard => "DASHBOARD",
            Self::Pipeline => "PIPELINE",
            Self::Process => "PROCESS",
            Self::GlossaryTerm => "GLOSSARY_TERM",
            Self::Metric => "METRIC",
            Self::Connection => "CONNECTION",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// True for entities that name a physical relation that can be queried.
    pub fn is_relation(&self) -> bool {
        matches!(self, Self::Table | Self::View)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no [`EntityType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityType(pub String);

impl fmt::Display for UnknownEntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown entity type '{}'", self.0)
    }
}

impl std::error::Error for UnknownEntityType {}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    /// Parses the canonical enum name (`GLOSSARY_TERM`), case-insensitively.
    ///
    /// This is not the vendor type mapping; see
    /// [`crate::entity::map_source_type_to_entity_type`] for that.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownEntityType(s.to_string()))
    }
}

/// Canonical view of one metadata row.
///
/// Built fresh per interaction by [`crate::entity::build_entity_context`]. Resolver
/// merges return a new value instead of mutating this one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityContext {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Raw vendor type string the entity type was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_typename: Option<String>,
    /// Vendor-specific attributes that have no canonical field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EntityContext {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            ..Default::default()
        }
    }

    /// Canonical field by name (`guid`, `name`, `qualified_name`, `database`,
    /// `schema`, `table`, `column`, `source_typename`, `entity_type`).
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "guid" => self.guid.as_deref(),
            "name" => self.name.as_deref(),
            "qualified_name" => self.qualified_name.as_deref(),
            "database" => self.database.as_deref(),
            "schema" => self.schema.as_deref(),
            "table" => self.table.as_deref(),
            "column" => self.column.as_deref(),
            "source_typename" => self.source_typename.as_deref(),
            "entity_type" | "type" => Some(self.entity_type.as_str()),
            _ => None,
        }
    }

    /// Best human-readable label: name, then table, then qualified name, then guid.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.table.as_deref())
            .or(self.qualified_name.as_deref())
            .or(self.guid.as_deref())
            .unwrap_or("entity")
    }
}
