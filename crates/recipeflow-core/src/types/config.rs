//! Backend-supplied configuration.
//!
//! The config is read-only input to every flow invocation and is never cached by the
//! engine. All fields have defaults, so `{}` deserializes to a usable config.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata database used when neither the entity nor the config names one.
pub const DEFAULT_METADATA_DB: &str = "FIELD_METADATA";
/// Metadata schema used when neither the entity nor the config names one.
pub const DEFAULT_METADATA_SCHEMA: &str = "PUBLIC";

/// Logical entity tables the engine knows how to use, in priority order.
pub const KNOWN_ENTITIES: &[&str] = &[
    "PROCESS_ENTITY",
    "TABLE_ENTITY",
    "VIEW_ENTITY",
    "COLUMN_ENTITY",
    "DATABASE_ENTITY",
    "SCHEMA_ENTITY",
    "SIGMADATAELEMENT_ENTITY",
    "ATLASGLOSSARY_ENTITY",
    "ATLASGLOSSARYTERM_ENTITY",
    "DBTMODEL_ENTITY",
    "DBTPROCESS_ENTITY",
    "POWERBIDASHBOARD_ENTITY",
    "TABLEAUDASHBOARD_ENTITY",
    "LOOKERQUERY_ENTITY",
];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemConfig {
    pub snowflake: SnowflakeConfig,
    pub query_defaults: QueryDefaults,
    pub features: Features,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SnowflakeConfig {
    /// Operator-configured physical location per logical entity name.
    pub entities: BTreeMap<String, EntityLocation>,
}

/// Physical location of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityLocation {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl EntityLocation {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryDefaults {
    pub metadata_db: Option<String>,
    pub metadata_schema: Option<String>,
    /// Upper bound for every row limit a template emits.
    pub default_row_limit: u64,
    pub default_timeout_sec: u64,
    /// Default row count for sampling queries.
    pub sample_row_limit: u64,
    pub usage_lookback_days: u64,
    /// Upper bound for any day window.
    pub max_lookback_days: u64,
    /// How many entity tables a find-by-guid query may probe.
    pub max_guid_lookup_tables: usize,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            metadata_db: None,
            metadata_schema: None,
            default_row_limit: 10_000,
            default_timeout_sec: 60,
            sample_row_limit: 100,
            usage_lookback_days: 30,
            max_lookback_days: 365,
            max_guid_lookup_tables: 12,
        }
    }
}

impl QueryDefaults {
    /// Clamp a requested row limit into `1..=default_row_limit`.
    pub fn bounded_rows(&self, requested: Option<u64>, fallback: u64) -> u64 {
        let ceiling = self.default_row_limit.max(1);
        requested.unwrap_or(fallback).clamp(1, ceiling)
    }

    /// Clamp a requested day window into `1..=max_lookback_days`.
    pub fn bounded_days(&self, requested: Option<u64>) -> u64 {
        let ceiling = self.max_lookback_days.max(1);
        requested
            .unwrap_or(self.usage_lookback_days)
            .clamp(1, ceiling)
    }
}

/// Feature flags derived from which entity tables exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Features {
    pub lineage: bool,
    pub glossary: bool,
    pub query_history: bool,
    pub bi_usage: bool,
    pub dbt: bool,
    pub governance: bool,
}

impl Features {
    pub fn from_entities(entities: &BTreeMap<String, EntityLocation>) -> Self {
        let has = |name: &str| entities.contains_key(name);
        Self {
            lineage: has("PROCESS_ENTITY") && (has("TABLE_ENTITY") || has("VIEW_ENTITY")),
            glossary: has("ATLASGLOSSARY_ENTITY") || has("ATLASGLOSSARYTERM_ENTITY"),
            query_history: false,
            bi_usage: has("POWERBIDASHBOARD_ENTITY")
                || has("TABLEAUDASHBOARD_ENTITY")
                || has("LOOKERQUERY_ENTITY"),
            dbt: has("DBTMODEL_ENTITY") || has("DBTPROCESS_ENTITY"),
            governance: has("TABLE_ENTITY"),
        }
    }
}

impl SystemConfig {
    /// Rebuild a config from `(database, schema, table)` rows returned by the
    /// entity-table discovery query.
    ///
    /// A row matches a known logical entity when its table name equals the logical
    /// name, or the logical name without its `_ENTITY` suffix. The first match wins.
    pub fn from_discovered_tables<I, D, S, T>(rows: I) -> Self
    where
        I: IntoIterator<Item = (D, S, T)>,
        D: Into<String>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut entities = BTreeMap::new();

        for (database, schema, table) in rows {
            let (database, schema, table) = (database.into(), schema.into(), table.into());
            let upper = table.to_uppercase();
            let matched = KNOWN_ENTITIES
                .iter()
                .find(|known| upper == **known || upper == known.trim_end_matches("_ENTITY"));

            let Some(known) = matched else { continue };
            if entities.contains_key(*known) {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    entity = *known,
                    ignored = %format!("{database}.{schema}.{table}"),
                    "multiple tables match logical entity; keeping the first"
                );
                continue;
            }
            entities.insert(
                known.to_string(),
                EntityLocation::new(database, schema, table),
            );
        }

        let mut query_defaults = QueryDefaults::default();
        if let Some(process) = entities.get("PROCESS_ENTITY") {
            query_defaults.metadata_db = Some(process.database.clone());
            query_defaults.metadata_schema = Some(process.schema.clone());
        }

        Self {
            features: Features::from_entities(&entities),
            snowflake: SnowflakeConfig { entities },
            query_defaults,
        }
    }

    /// Configured metadata database, falling back to [`DEFAULT_METADATA_DB`].
    pub fn metadata_db(&self) -> &str {
        self.query_defaults
            .metadata_db
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_METADATA_DB)
    }

    /// Configured metadata schema, falling back to [`DEFAULT_METADATA_SCHEMA`].
    pub fn metadata_schema(&self) -> &str {
        self.query_defaults
            .metadata_schema
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_METADATA_SCHEMA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_a_valid_config() {
        let config: SystemConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SystemConfig::default());
        assert_eq!(config.metadata_db(), DEFAULT_METADATA_DB);
        assert_eq!(config.metadata_schema(), DEFAULT_METADATA_SCHEMA);
        assert_eq!(config.query_defaults.default_row_limit, 10_000);
    }

    #[test]
    fn test_backend_payload_shape() {
        let json = r#"{
            "snowflake": {
                "entities": {
                    "PROCESS_ENTITY": {"database": "MDLH", "schema": "GOLD", "table": "PROCESS_ENTITY"}
                }
            },
            "queryDefaults": {"metadataDb": "MDLH", "metadataSchema": "GOLD", "defaultRowLimit": 500}
        }"#;
        let config: SystemConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.metadata_db(), "MDLH");
        assert_eq!(config.query_defaults.default_row_limit, 500);
        assert_eq!(config.query_defaults.default_timeout_sec, 60);
        assert_eq!(
            config.snowflake.entities["PROCESS_ENTITY"],
            EntityLocation::new("MDLH", "GOLD", "PROCESS_ENTITY")
        );
    }

    #[test]
    fn test_blank_metadata_db_falls_back() {
        let mut config = SystemConfig::default();
        config.query_defaults.metadata_db = Some("  ".to_string());
        assert_eq!(config.metadata_db(), DEFAULT_METADATA_DB);
    }

    #[test]
    fn test_bounded_rows_and_days() {
        let defaults = QueryDefaults {
            default_row_limit: 1000,
            max_lookback_days: 90,
            ..Default::default()
        };
        assert_eq!(defaults.bounded_rows(None, 100), 100);
        assert_eq!(defaults.bounded_rows(Some(0), 100), 1);
        assert_eq!(defaults.bounded_rows(Some(50_000), 100), 1000);
        assert_eq!(defaults.bounded_days(None), 30);
        assert_eq!(defaults.bounded_days(Some(400)), 90);
    }

    #[test]
    fn test_from_discovered_tables() {
        let config = SystemConfig::from_discovered_tables(vec![
            ("MDLH", "GOLD", "PROCESS_ENTITY"),
            ("MDLH", "GOLD", "TABLE_ENTITY"),
            ("OTHER", "RAW", "TABLE_ENTITY"),
            ("MDLH", "GOLD", "ATLASGLOSSARYTERM"),
            ("MDLH", "GOLD", "CUSTOMERS"),
        ]);

        let entities = &config.snowflake.entities;
        assert_eq!(entities.len(), 3);
        assert_eq!(entities["TABLE_ENTITY"].database, "MDLH");
        assert_eq!(entities["ATLASGLOSSARYTERM_ENTITY"].table, "ATLASGLOSSARYTERM");
        assert_eq!(config.metadata_db(), "MDLH");
        assert_eq!(config.metadata_schema(), "GOLD");
        assert!(config.features.lineage);
        assert!(config.features.glossary);
        assert!(config.features.governance);
        assert!(!config.features.query_history);
        assert!(!config.features.dbt);
    }
}
