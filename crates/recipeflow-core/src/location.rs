//! Where entities and metadata tables physically live.

use crate::types::{EntityContext, EntityLocation, SystemConfig, TableSet};

/// Fill the entity's database and schema from configuration when it carries none.
///
/// Returns a new value; the input entity is left untouched.
pub fn resolve_location(entity: &EntityContext, config: &SystemConfig) -> EntityContext {
    let mut resolved = entity.clone();
    if resolved.database.as_deref().map_or(true, str::is_empty) {
        resolved.database = Some(config.metadata_db().to_string());
    }
    if resolved.schema.as_deref().map_or(true, str::is_empty) {
        resolved.schema = Some(config.metadata_schema().to_string());
    }
    resolved
}

/// Vendor spellings and a generic substring token for a logical entity table.
struct Candidates {
    names: &'static [&'static str],
    token: Option<&'static str>,
}

fn candidates_for(logical: &str) -> Candidates {
    match logical {
        "PROCESS_ENTITY" => Candidates {
            names: &["PROCESS_ENTITY", "PROCESS", "LINEAGE_PROCESS_ENTITY", "LINEAGE_ENTITY"],
            token: Some("PROCESS"),
        },
        "ATLASGLOSSARYTERM_ENTITY" => Candidates {
            names: &[
                "ATLASGLOSSARYTERM_ENTITY",
                "ATLASGLOSSARYTERM",
                "GLOSSARYTERM_ENTITY",
                "GLOSSARY_TERM_ENTITY",
            ],
            token: Some("GLOSSARYTERM"),
        },
        "ATLASGLOSSARY_ENTITY" => Candidates {
            names: &["ATLASGLOSSARY_ENTITY", "ATLASGLOSSARY", "GLOSSARY_ENTITY"],
            token: None,
        },
        "TABLE_ENTITY" => Candidates {
            names: &["TABLE_ENTITY", "TABLE", "SNOWFLAKETABLE_ENTITY"],
            token: None,
        },
        "COLUMN_ENTITY" => Candidates {
            names: &["COLUMN_ENTITY", "COLUMN", "SNOWFLAKECOLUMN_ENTITY"],
            token: None,
        },
        _ => Candidates {
            names: &[],
            token: None,
        },
    }
}

/// Find the physical table backing a logical entity table such as `PROCESS_ENTITY`.
///
/// An operator-configured location wins. Otherwise `available_tables` (the tables
/// discovered in the metadata schema) is scanned for the canonical name, then known
/// vendor variants, then a table containing the entity's generic token. `None` means
/// nothing plausible exists and the caller should emit a discovery query.
pub fn resolve_entity_table(
    logical: &str,
    config: &SystemConfig,
    available_tables: &TableSet,
) -> Option<EntityLocation> {
    let logical = logical.to_uppercase();
    if let Some(location) = config.snowflake.entities.get(&logical) {
        return Some(location.clone());
    }

    let at_metadata = |table: &str| {
        EntityLocation::new(config.metadata_db(), config.metadata_schema(), table)
    };

    let candidates = candidates_for(&logical);
    let stem = logical.strip_suffix("_ENTITY").unwrap_or(&logical);
    let exact = std::iter::once(logical.as_str())
        .chain(candidates.names.iter().copied())
        .chain(std::iter::once(stem))
        .find(|name| available_tables.contains(name));
    if let Some(name) = exact {
        return Some(at_metadata(&name.to_uppercase()));
    }

    let token = candidates.token?;
    let mut containing = available_tables.iter().filter(|t| t.contains(token));
    let first = containing.next()?;
    let preferred = std::iter::once(first)
        .chain(containing)
        .find(|t| t.ends_with("_ENTITY"))
        .unwrap_or(first);
    Some(at_metadata(preferred))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityType;

    fn tables(names: &[&str]) -> TableSet {
        names.iter().collect()
    }

    #[test]
    fn test_entity_location_wins() {
        let mut entity = EntityContext::new(EntityType::Table);
        entity.database = Some("SALES".to_string());
        let resolved = resolve_location(&entity, &SystemConfig::default());
        assert_eq!(resolved.database.as_deref(), Some("SALES"));
        assert_eq!(resolved.schema.as_deref(), Some("PUBLIC"));
        assert_eq!(entity.schema, None);
    }

    #[test]
    fn test_config_defaults_fill_location() {
        let mut config = SystemConfig::default();
        config.query_defaults.metadata_db = Some("MDLH".to_string());
        config.query_defaults.metadata_schema = Some("GOLD".to_string());
        let resolved = resolve_location(&EntityContext::default(), &config);
        assert_eq!(resolved.database.as_deref(), Some("MDLH"));
        assert_eq!(resolved.schema.as_deref(), Some("GOLD"));
    }

    #[test]
    fn test_configured_entity_table_wins() {
        let mut config = SystemConfig::default();
        config.snowflake.entities.insert(
            "PROCESS_ENTITY".to_string(),
            EntityLocation::new("LINEAGE", "CORE", "PROCESSES"),
        );
        let found = resolve_entity_table("process_entity", &config, &tables(&["PROCESS_ENTITY"]));
        assert_eq!(found, Some(EntityLocation::new("LINEAGE", "CORE", "PROCESSES")));
    }

    #[test]
    fn test_candidate_order() {
        let config = SystemConfig::default();
        let found = resolve_entity_table(
            "PROCESS_ENTITY",
            &config,
            &tables(&["process", "PROCESS_ENTITY"]),
        );
        assert_eq!(found.unwrap().table, "PROCESS_ENTITY");

        let found = resolve_entity_table("PROCESS_ENTITY", &config, &tables(&["process"]));
        assert_eq!(
            found,
            Some(EntityLocation::new("FIELD_METADATA", "PUBLIC", "PROCESS"))
        );
    }

    #[test]
    fn test_token_match_prefers_entity_tables() {
        let config = SystemConfig::default();
        let found = resolve_entity_table(
            "PROCESS_ENTITY",
            &config,
            &tables(&["AIRFLOW_PROCESS_LOG", "DBTPROCESS_ENTITY"]),
        );
        assert_eq!(found.unwrap().table, "DBTPROCESS_ENTITY");

        let found =
            resolve_entity_table("PROCESS_ENTITY", &config, &tables(&["AIRFLOW_PROCESS_LOG"]));
        assert_eq!(found.unwrap().table, "AIRFLOW_PROCESS_LOG");
    }

    #[test]
    fn test_nothing_found() {
        let config = SystemConfig::default();
        assert_eq!(resolve_entity_table("PROCESS_ENTITY", &config, &TableSet::new()), None);
        assert_eq!(
            resolve_entity_table("COLUMN_ENTITY", &config, &tables(&["MY_COLUMNS"])),
            None
        );
    }
}
