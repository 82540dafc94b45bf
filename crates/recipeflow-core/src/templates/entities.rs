//! Lookups against the metadata entity tables.

use std::collections::BTreeSet;

use super::{header, location_fqn, show_tables_like, TemplateContext};
use crate::error::FlowError;
use crate::safety::{
    build_safe_fqn, escape_like_pattern, escape_string_value, like_contains, LIKE_ESCAPE,
};
use crate::types::{BuildOutcome, DiscoveryReason, EntityLocation, EntityType, KNOWN_ENTITIES};

const DEFAULT_LIMIT: u64 = 100;
/// Entity tables listed by the `INFORMATION_SCHEMA` scan unless `limit` says otherwise.
const ENTITY_TABLES_LIMIT: u64 = 1000;
const GLOSSARY_TERMS: &str = "ATLASGLOSSARYTERM_ENTITY";
const DEFAULT_ENTITY_TABLE: &str = "TABLE_ENTITY";

fn missing(name: &str) -> DiscoveryReason {
    DiscoveryReason::MissingParameter {
        name: name.to_string(),
    }
}

fn find_entity_tables(ctx: &TemplateContext<'_>, reason: DiscoveryReason) -> Result<BuildOutcome, FlowError> {
    show_tables_like(ctx, "%_ENTITY", "Find Entity Tables", reason)
}

/// Glossary terms: the term itself when the entity is one, terms assigned to the
/// entity when it has a guid, otherwise a name search (or the first terms).
pub(super) fn glossary_lookup(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    let Some(terms) = ctx.entity_table(GLOSSARY_TERMS) else {
        return show_tables_like(
            ctx,
            "%GLOSSARY%",
            "Find Glossary Tables",
            DiscoveryReason::MissingLocation {
                what: "the glossary term table".to_string(),
            },
        );
    };
    let table = location_fqn(&terms)?;
    let limit = ctx.row_limit(DEFAULT_LIMIT);
    let is_term = ctx
        .param("entity_type")
        .and_then(|t| t.parse::<EntityType>().ok())
        == Some(EntityType::GlossaryTerm);

    let (comment, filter) = match (ctx.param("guid"), ctx.param("term")) {
        (Some(guid), _) if is_term => (
            format!("Glossary term {}", ctx.display_name()),
            format!("WHERE GUID = {}\n", escape_string_value(&guid)),
        ),
        (Some(guid), None) => (
            format!("Glossary terms assigned to {}", ctx.display_name()),
            format!(
                "WHERE ARRAY_TO_STRING(ASSIGNEDENTITIES, ',') ILIKE {} {LIKE_ESCAPE}\n",
                like_contains(&guid)
            ),
        ),
        (_, Some(term)) => (
            format!("Glossary terms matching {term}"),
            format!("WHERE NAME ILIKE {} {LIKE_ESCAPE}\n", like_contains(&term)),
        ),
        (None, None) => ("Glossary terms".to_string(), String::new()),
    };

    Ok(BuildOutcome::resolved(format!(
        "{}SELECT *\nFROM {table}\n{filter}ORDER BY NAME\nLIMIT {limit};",
        header(&[comment])
    )))
}

/// Candidate entity tables for a guid lookup, in probe order: explicit
/// `candidate_tables`, configured entities, then discovered `*_ENTITY` tables.
fn guid_candidates(ctx: &TemplateContext<'_>) -> Vec<(String, EntityLocation)> {
    let at_metadata = |table: &str| {
        EntityLocation::new(ctx.metadata_db(), ctx.metadata_schema(), table.to_uppercase())
    };
    let configured = &ctx.config.snowflake.entities;

    let explicit = ctx
        .params
        .get_list("candidate_tables")
        .into_iter()
        .map(|name| {
            let upper = name.to_uppercase();
            let location = configured
                .get(&upper)
                .cloned()
                .unwrap_or_else(|| at_metadata(&name));
            (upper, location)
        });
    let known = KNOWN_ENTITIES
        .iter()
        .filter_map(|name| configured.get(*name).map(|loc| (name.to_string(), loc.clone())));
    let other_configured = configured
        .iter()
        .filter(|(name, _)| !KNOWN_ENTITIES.contains(&name.as_str()))
        .map(|(name, loc)| (name.clone(), loc.clone()));
    let discovered = ctx
        .available_tables
        .iter()
        .filter(|name| name.ends_with("_ENTITY"))
        .map(|name| (name.to_string(), at_metadata(name)));

    let mut seen = BTreeSet::new();
    explicit
        .chain(known)
        .chain(other_configured)
        .chain(discovered)
        .filter(|(_, loc)| {
            seen.insert((
                loc.database.to_uppercase(),
                loc.schema.to_uppercase(),
                loc.table.to_uppercase(),
            ))
        })
        .take(ctx.config.query_defaults.max_guid_lookup_tables)
        .collect()
}

/// One single-row lookup per candidate table. Entity tables have different
/// shapes, so the lookups are separate statements rather than a UNION.
pub(super) fn find_by_guid(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    let Some(guid) = ctx.param("guid") else {
        return find_entity_tables(ctx, missing("guid"));
    };
    let candidates = guid_candidates(ctx);
    if candidates.is_empty() {
        return find_entity_tables(
            ctx,
            DiscoveryReason::MissingLocation {
                what: "any entity table".to_string(),
            },
        );
    }

    let guid = escape_string_value(&guid);
    let mut sql = header(&[format!(
        "Locate {} across {} entity tables",
        ctx.display_name(),
        candidates.len()
    )]);
    for (name, location) in &candidates {
        sql.push_str(&format!(
            "SELECT {} AS SOURCE_TABLE, * FROM {} WHERE GUID = {guid} LIMIT 1;\n",
            escape_string_value(name),
            location_fqn(location)?,
        ));
    }
    sql.truncate(sql.trim_end().len());
    Ok(BuildOutcome::resolved(sql))
}

/// Rows of one entity table for a list of guids (`guids`), in `entity_table`.
pub(super) fn entities_by_guid(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    let logical = ctx
        .param("entity_table")
        .unwrap_or_else(|| DEFAULT_ENTITY_TABLE.to_string());
    let Some(location) = ctx.entity_table(&logical) else {
        return find_entity_tables(
            ctx,
            DiscoveryReason::MissingLocation {
                what: format!("entity table {logical}"),
            },
        );
    };
    let limit = ctx.row_limit(DEFAULT_LIMIT);
    let guids: Vec<String> = ctx
        .params
        .get_list("guids")
        .iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .map(|guid| escape_string_value(guid))
        .collect();
    if guids.is_empty() {
        return find_entity_tables(ctx, missing("guids"));
    }

    Ok(BuildOutcome::resolved(format!(
        "{}SELECT *\nFROM {}\nWHERE GUID IN ({})\nLIMIT {limit};",
        header(&[format!("{} entities from {}", guids.len(), location.table)]),
        location_fqn(&location)?,
        guids.join(", "),
    )))
}

/// Every `*_ENTITY` table in the metadata database, as `(DATABASE_NAME,
/// SCHEMA_NAME, TABLE_NAME)` rows.
pub(super) fn entity_tables(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    let database = ctx.param("database").unwrap_or_else(|| ctx.metadata_db());
    let catalog = build_safe_fqn(Some(&database), Some("INFORMATION_SCHEMA"), Some("TABLES"))?;
    let pattern = escape_string_value(&format!("%{}", escape_like_pattern("_ENTITY")));
    let limit = ctx.row_limit(ENTITY_TABLES_LIMIT);
    Ok(BuildOutcome::resolved(format!(
        "SELECT
    TABLE_CATALOG AS DATABASE_NAME,
    TABLE_SCHEMA AS SCHEMA_NAME,
    TABLE_NAME
FROM {catalog}
WHERE TABLE_NAME LIKE {pattern} {LIKE_ESCAPE}
ORDER BY TABLE_SCHEMA, TABLE_NAME
LIMIT {limit};"
    )))
}
