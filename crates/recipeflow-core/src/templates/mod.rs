//! SQL templates: pure functions from parameters to SQL text.
//!
//! Every template routes identifiers through [`crate::safety`] and never emits a
//! query against a table it could not locate. When a location or parameter is
//! missing, the template answers with a discovery query instead, reported as
//! [`BuildOutcome::Discovery`].

mod browse;
mod entities;
mod lineage;
mod usage;

use std::collections::BTreeMap;

use crate::error::FlowError;
use crate::location::resolve_entity_table;
use crate::safety::{build_safe_fqn, comment_text, escape_string_value};
use crate::types::{
    BuildOutcome, DiscoveryReason, EntityLocation, Params, SystemConfig, TableSet,
};

/// Registered template ids.
pub mod template_ids {
    pub const LINEAGE: &str = "lineage";
    pub const USAGE: &str = "usage";
    pub const SAMPLE_ROWS: &str = "sample_rows";
    pub const SCHEMA_BROWSE: &str = "schema_browse";
    pub const SHOW_TABLES: &str = "show_tables";
    pub const DESCRIBE_TABLE: &str = "describe_table";
    pub const COLUMN_PROFILE: &str = "column_profile";
    pub const COLUMN_TOP_VALUES: &str = "column_top_values";
    pub const GLOSSARY_LOOKUP: &str = "glossary_lookup";
    pub const FIND_BY_GUID: &str = "find_by_guid";
    pub const ENTITIES_BY_GUID: &str = "entities_by_guid";
    pub const ENTITY_TABLES: &str = "entity_tables";
}

/// Everything a template may read.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub params: &'a Params,
    /// Tables known to exist in the metadata schema.
    pub available_tables: &'a TableSet,
    pub config: &'a SystemConfig,
}

impl<'a> TemplateContext<'a> {
    pub fn new(params: &'a Params, available_tables: &'a TableSet, config: &'a SystemConfig) -> Self {
        Self {
            params,
            available_tables,
            config,
        }
    }

    pub fn param(&self, key: &str) -> Option<String> {
        self.params.get_str(key)
    }

    pub fn metadata_db(&self) -> String {
        self.param("metadata_db")
            .unwrap_or_else(|| self.config.metadata_db().to_string())
    }

    pub fn metadata_schema(&self) -> String {
        self.param("metadata_schema")
            .unwrap_or_else(|| self.config.metadata_schema().to_string())
    }

    /// Requested `limit`, bounded by the configured row ceiling.
    pub fn row_limit(&self, fallback: u64) -> u64 {
        self.config
            .query_defaults
            .bounded_rows(self.params.get_u64("limit"), fallback)
    }

    /// Label for SQL comments.
    pub fn display_name(&self) -> String {
        ["name", "table", "qualified_name", "guid"]
            .iter()
            .find_map(|key| self.param(key))
            .unwrap_or_else(|| "entity".to_string())
    }

    /// Physical location of a logical entity table. Tables found by scanning live
    /// in the metadata schema the parameters name.
    pub fn entity_table(&self, logical: &str) -> Option<EntityLocation> {
        let mut location = resolve_entity_table(logical, self.config, self.available_tables)?;
        if !self
            .config
            .snowflake
            .entities
            .contains_key(&logical.to_uppercase())
        {
            location.database = self.metadata_db();
            location.schema = self.metadata_schema();
        }
        Some(location)
    }

    /// Quoted `database.schema.table` of the entity the parameters describe.
    pub(crate) fn entity_fqn(&self) -> Result<Option<String>, FlowError> {
        let Some(table) = self.param("table") else {
            return Ok(None);
        };
        let database = self.param("database");
        let schema = self.param("schema");
        build_safe_fqn(database.as_deref(), schema.as_deref(), Some(&table)).map(Some)
    }
}

pub(crate) fn location_fqn(location: &EntityLocation) -> Result<String, FlowError> {
    build_safe_fqn(
        Some(&location.database),
        Some(&location.schema),
        Some(&location.table),
    )
}

/// SQL comment lines. Every line passes through [`comment_text`].
pub(crate) fn header<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(|line| format!("-- {}\n", comment_text(line.as_ref())))
        .collect()
}

fn log_fallback(_title: &str, _reason: &DiscoveryReason) {
    #[cfg(feature = "tracing")]
    tracing::debug!(title = _title, reason = %_reason.describe(), "discovery fallback");
}

/// `SHOW TABLES LIKE <pattern>` in the metadata schema.
pub(crate) fn show_tables_like(
    ctx: &TemplateContext<'_>,
    pattern: &str,
    title: &str,
    reason: DiscoveryReason,
) -> Result<BuildOutcome, FlowError> {
    let location = build_safe_fqn(
        Some(&ctx.metadata_db()),
        Some(&ctx.metadata_schema()),
        None,
    )?;
    let sql = format!(
        "{}SHOW TABLES LIKE {} IN {location};",
        header(&[reason.describe().as_str(), "Listing candidate tables instead."]),
        escape_string_value(pattern),
    );
    log_fallback(title, &reason);
    Ok(BuildOutcome::discovery(sql, title, reason))
}

/// Browse whatever level of the hierarchy the parameters reach.
pub(crate) fn browse_fallback(
    ctx: &TemplateContext<'_>,
    reason: DiscoveryReason,
) -> Result<BuildOutcome, FlowError> {
    let (statement, title) = browse_statement(ctx)?;
    let sql = format!("{}{statement}", header(&[reason.describe()]));
    log_fallback(title, &reason);
    Ok(BuildOutcome::discovery(sql, title, reason))
}

fn browse_statement(ctx: &TemplateContext<'_>) -> Result<(String, &'static str), FlowError> {
    let database = ctx.param("database");
    let schema = ctx.param("schema");
    Ok(match (database.as_deref(), schema.as_deref()) {
        (Some(database), Some(schema)) => (
            format!(
                "SHOW TABLES IN SCHEMA {};",
                build_safe_fqn(Some(database), Some(schema), None)?
            ),
            "Browse Tables",
        ),
        (Some(database), None) => (
            format!(
                "SHOW SCHEMAS IN DATABASE {};",
                build_safe_fqn(Some(database), None, None)?
            ),
            "Browse Schemas",
        ),
        _ => ("SHOW DATABASES;".to_string(), "Browse Databases"),
    })
}

/// Signature every template implements.
pub type TemplateFn = fn(&TemplateContext<'_>) -> Result<BuildOutcome, FlowError>;

/// A registered template.
#[derive(Clone, Copy)]
pub struct Template {
    pub description: &'static str,
    pub build: TemplateFn,
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Template id to builder.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in template.
    pub fn builtin() -> Self {
        use template_ids::*;

        let mut registry = Self::new();
        registry.register(LINEAGE, "Upstream or downstream lineage hops", lineage::lineage);
        registry.register(USAGE, "Recent queries that mention the entity", usage::usage);
        registry.register(SAMPLE_ROWS, "Bounded sample of a table", browse::sample_rows);
        registry.register(SCHEMA_BROWSE, "Describe or list the entity's container", browse::schema_browse);
        registry.register(SHOW_TABLES, "Tables in a schema", browse::show_tables);
        registry.register(DESCRIBE_TABLE, "Columns of a table", browse::describe_table);
        registry.register(COLUMN_PROFILE, "Null, distinct, min and max of a column", browse::column_profile);
        registry.register(COLUMN_TOP_VALUES, "Most frequent values of a column", browse::column_top_values);
        registry.register(GLOSSARY_LOOKUP, "Glossary terms by guid, asset, or name", entities::glossary_lookup);
        registry.register(FIND_BY_GUID, "Locate an entity by guid across entity tables", entities::find_by_guid);
        registry.register(ENTITIES_BY_GUID, "Resolve a list of guids in one entity table", entities::entities_by_guid);
        registry.register(ENTITY_TABLES, "Entity tables in the metadata database", entities::entity_tables);
        registry
    }

    /// Add or replace a template.
    pub fn register(&mut self, id: impl Into<String>, description: &'static str, build: TemplateFn) {
        self.templates.insert(id.into(), Template { description, build });
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Run template `id`.
    pub fn build(&self, id: &str, ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
        let template = self
            .get(id)
            .ok_or_else(|| FlowError::UnknownTemplate(id.to_string()))?;
        (template.build)(ctx)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_template() {
        let registry = TemplateRegistry::builtin();
        let params = Params::new();
        let tables = TableSet::new();
        let config = SystemConfig::default();
        let ctx = TemplateContext::new(&params, &tables, &config);
        assert_eq!(
            registry.build("nope", &ctx),
            Err(FlowError::UnknownTemplate("nope".to_string()))
        );
    }

    #[test]
    fn test_builtin_ids() {
        let registry = TemplateRegistry::builtin();
        assert_eq!(registry.len(), 12);
        assert!(registry.contains(template_ids::FIND_BY_GUID));
    }

    #[test]
    fn test_header_neutralizes_newlines() {
        assert_eq!(header(&["a\nDROP TABLE x"]), "-- a DROP TABLE x\n");
    }

    #[test]
    fn test_metadata_params_override_config() {
        let params = Params::new().with("metadata_db", "MDLH");
        let tables = TableSet::new();
        let config = SystemConfig::default();
        let ctx = TemplateContext::new(&params, &tables, &config);
        assert_eq!(ctx.metadata_db(), "MDLH");
        assert_eq!(ctx.metadata_schema(), "PUBLIC");
    }

    #[test]
    fn test_entity_table_uses_metadata_params() {
        let params = Params::new()
            .with("metadata_db", "MDLH")
            .with("metadata_schema", "GOLD");
        let tables: TableSet = ["PROCESS_ENTITY"].into_iter().collect();
        let config = SystemConfig::default();
        let ctx = TemplateContext::new(&params, &tables, &config);
        assert_eq!(
            ctx.entity_table("PROCESS_ENTITY"),
            Some(EntityLocation::new("MDLH", "GOLD", "PROCESS_ENTITY"))
        );
    }

    #[test]
    fn test_browse_levels() {
        let outcome = test_support::run(template_ids::SCHEMA_BROWSE, Params::new(), &[]);
        assert_eq!(outcome.sql(), "SHOW DATABASES;");
    }
}
