//! Normalizing heterogeneous metadata rows into [`EntityContext`].

use serde_json::{Map, Value};

use crate::types::{scalar_to_string, EntityContext, EntityType, Params};

/// Canonical entity fields exposed to templates as parameters.
pub const ENTITY_PARAM_FIELDS: [&str; 9] = [
    "guid",
    "name",
    "qualified_name",
    "database",
    "schema",
    "table",
    "column",
    "source_typename",
    "entity_type",
];

/// Template parameters carrying the entity's canonical fields. Absent fields are
/// left out.
pub fn entity_params(entity: &EntityContext) -> Params {
    let mut params = Params::new();
    for field in ENTITY_PARAM_FIELDS {
        params.insert_opt(field, entity.field(field));
    }
    params
}

/// Map a raw vendor type string onto an [`EntityType`].
///
/// Total and case-insensitive: the whole input is case-folded (lowercased, then
/// uppercased) before everything but ASCII letters is dropped, so characters such
/// as `ſ` or the Kelvin sign fold onto the letters they stand for. The key is then
/// checked against ordered substring rules. The first rule that matches wins; no
/// match yields [`EntityType::Unknown`].
pub fn map_source_type_to_entity_type(raw: &str) -> EntityType {
    let key: String = raw
        .to_lowercase()
        .to_uppercase()
        .chars()
        .filter(char::is_ascii_alphabetic)
        .collect();
    let has = |needle: &str| key.contains(needle);
    let any = |needles: &[&str]| needles.iter().any(|n| key.contains(n));

    if has("GLOSSARY") && has("TERM") {
        EntityType::GlossaryTerm
    } else if any(&[
        "DASHBOARD", "REPORT", "CHART", "TABLEAU", "LOOKER", "POWERBI", "SIGMA",
    ]) {
        EntityType::Dashboard
    } else if any(&["PROCESS", "LINEAGE"]) {
        EntityType::Process
    } else if any(&["PIPELINE", "DAG", "AIRFLOW"]) {
        EntityType::Pipeline
    } else if any(&["METRIC", "MEASURE"]) {
        EntityType::Metric
    } else if has("COLUMN") {
        EntityType::Column
    } else if has("VIEW") {
        EntityType::View
    } else if has("TABLE") {
        EntityType::Table
    } else if has("SCHEMA") {
        EntityType::Schema
    } else if has("DATABASE") {
        EntityType::Database
    } else if has("CONNECTION") {
        EntityType::Connection
    } else {
        EntityType::Unknown
    }
}

/// Accepted spellings per canonical field, compared after lowercasing and
/// dropping underscores. The canonical spelling comes first.
const GUID: &[&str] = &["guid", "entityguid"];
const NAME: &[&str] = &["name", "displayname"];
const QUALIFIED_NAME: &[&str] = &["qualifiedname"];
const DATABASE: &[&str] = &["database", "databasename", "tablecatalog"];
const SCHEMA: &[&str] = &["schema", "schemaname", "tableschema"];
const TABLE: &[&str] = &["table", "tablename"];
const COLUMN: &[&str] = &["column", "columnname"];
const SOURCE_TYPENAME: &[&str] = &["sourcetypename", "typename", "entitytype", "type"];

const FIELDS: [&[&str]; 8] = [
    GUID,
    NAME,
    QUALIFIED_NAME,
    DATABASE,
    SCHEMA,
    TABLE,
    COLUMN,
    SOURCE_TYPENAME,
];

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// First non-blank value among `aliases`, in alias order.
fn pick(keyed: &[(String, &String, &Value)], aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        keyed
            .iter()
            .filter(|(norm, _, _)| norm == alias)
            .find_map(|(_, _, value)| scalar_to_string(value))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Build an [`EntityContext`] from one metadata row.
///
/// Never fails: fields that cannot be found stay `None`. Keys that match no
/// canonical field are kept in `extra`.
pub fn build_entity_context(row: &Map<String, Value>) -> EntityContext {
    let keyed: Vec<(String, &String, &Value)> = row
        .iter()
        .map(|(key, value)| (normalize_key(key), key, value))
        .collect();

    let source_typename = pick(&keyed, SOURCE_TYPENAME);
    let entity_type = source_typename
        .as_deref()
        .map(map_source_type_to_entity_type)
        .unwrap_or_default();

    let extra = keyed
        .iter()
        .filter(|(norm, _, _)| !FIELDS.iter().any(|aliases| aliases.contains(&norm.as_str())))
        .map(|(_, key, value)| ((*key).clone(), (*value).clone()))
        .collect();

    let mut entity = EntityContext {
        entity_type,
        guid: pick(&keyed, GUID),
        name: pick(&keyed, NAME),
        qualified_name: pick(&keyed, QUALIFIED_NAME),
        database: pick(&keyed, DATABASE),
        schema: pick(&keyed, SCHEMA),
        table: pick(&keyed, TABLE),
        column: pick(&keyed, COLUMN),
        source_typename,
        extra,
    };
    fill_from_qualified_name(&mut entity);
    fill_from_name(&mut entity);
    entity
}

/// Fill missing location fields from a slash-separated qualified name such as
/// `default/snowflake/1700000000/DB/SCHEMA/TABLE`.
fn fill_from_qualified_name(entity: &mut EntityContext) {
    let Some(qualified) = entity.qualified_name.as_deref() else {
        return;
    };
    if !qualified.contains('/') {
        return;
    }
    let segments: Vec<&str> = qualified
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    // Number of trailing segments that name the location, outermost first.
    let depth = match entity.entity_type {
        EntityType::Column => 4,
        EntityType::Table | EntityType::View => 3,
        EntityType::Schema => 2,
        EntityType::Database => 1,
        _ => return,
    };
    if segments.len() < depth {
        return;
    }
    let tail = &segments[segments.len() - depth..];
    let slots = [
        &mut entity.database,
        &mut entity.schema,
        &mut entity.table,
        &mut entity.column,
    ];
    for (slot, segment) in slots.into_iter().zip(tail) {
        if slot.is_none() {
            *slot = Some((*segment).to_string());
        }
    }
}

fn fill_from_name(entity: &mut EntityContext) {
    let name = entity.name.clone();
    match entity.entity_type {
        EntityType::Table | EntityType::View if entity.table.is_none() => entity.table = name,
        EntityType::Column if entity.column.is_none() => entity.column = name,
        EntityType::Schema if entity.schema.is_none() => entity.schema = name,
        EntityType::Database if entity.database.is_none() => entity.database = name,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("Table", EntityType::Table)]
    #[case("SnowflakeTable", EntityType::Table)]
    #[case("View", EntityType::View)]
    #[case("MaterialisedView", EntityType::View)]
    #[case("Column", EntityType::Column)]
    #[case("AtlasGlossaryTerm", EntityType::GlossaryTerm)]
    #[case("glossary_term", EntityType::GlossaryTerm)]
    #[case("PowerBIDashboard", EntityType::Dashboard)]
    #[case("TableauWorkbook", EntityType::Dashboard)]
    #[case("LookerQuery", EntityType::Dashboard)]
    #[case("SigmaDataElement", EntityType::Dashboard)]
    #[case("Process", EntityType::Process)]
    #[case("ColumnProcess", EntityType::Process)]
    #[case("DbtProcess", EntityType::Process)]
    #[case("AirflowDag", EntityType::Pipeline)]
    #[case("DbtMetric", EntityType::Metric)]
    #[case("Schema", EntityType::Schema)]
    #[case("Database", EntityType::Database)]
    #[case("SnowflakeConnection", EntityType::Connection)]
    #[case("", EntityType::Unknown)]
    #[case("Readme", EntityType::Unknown)]
    #[case("1234!!", EntityType::Unknown)]
    fn test_source_type_mapping(#[case] raw: &str, #[case] expected: EntityType) {
        assert_eq!(map_source_type_to_entity_type(raw), expected);
    }

    #[rstest]
    #[case("ſchema", EntityType::Schema)]
    #[case("LOO\u{212A}ER", EntityType::Dashboard)]
    #[case("ﬁle_Table", EntityType::Table)]
    fn test_source_type_mapping_folds_non_ascii_case(#[case] raw: &str, #[case] expected: EntityType) {
        assert_eq!(map_source_type_to_entity_type(raw), expected);
        assert_eq!(map_source_type_to_entity_type(&raw.to_uppercase()), expected);
        assert_eq!(map_source_type_to_entity_type(&raw.to_lowercase()), expected);
    }

    #[test]
    fn test_build_entity_context_reads_aliases() {
        let row = json!({
            "GUID": "g-1",
            "displayName": "Orders",
            "QUALIFIEDNAME": "default/snowflake/1/SALES/PUBLIC/ORDERS",
            "TYPENAME": "Table",
            "ownerUsers": ["alice"],
        });
        let entity = build_entity_context(row.as_object().unwrap());

        assert_eq!(entity.entity_type, EntityType::Table);
        assert_eq!(entity.guid.as_deref(), Some("g-1"));
        assert_eq!(entity.name.as_deref(), Some("Orders"));
        assert_eq!(entity.database.as_deref(), Some("SALES"));
        assert_eq!(entity.schema.as_deref(), Some("PUBLIC"));
        assert_eq!(entity.table.as_deref(), Some("ORDERS"));
        assert_eq!(entity.source_typename.as_deref(), Some("Table"));
        assert_eq!(entity.extra.get("ownerUsers"), Some(&json!(["alice"])));
        assert!(!entity.extra.contains_key("GUID"));
    }

    #[test]
    fn test_explicit_fields_win_over_qualified_name() {
        let row = json!({
            "typeName": "Column",
            "qualifiedName": "default/snowflake/1/DB/SCH/TBL/COL",
            "database_name": "OTHER_DB",
        });
        let entity = build_entity_context(row.as_object().unwrap());
        assert_eq!(entity.entity_type, EntityType::Column);
        assert_eq!(entity.database.as_deref(), Some("OTHER_DB"));
        assert_eq!(entity.schema.as_deref(), Some("SCH"));
        assert_eq!(entity.table.as_deref(), Some("TBL"));
        assert_eq!(entity.column.as_deref(), Some("COL"));
    }

    #[test]
    fn test_entity_params() {
        let mut entity = EntityContext::new(EntityType::Table);
        entity.table = Some("ORDERS".to_string());
        let params = entity_params(&entity);
        assert_eq!(params.get_str("table").as_deref(), Some("ORDERS"));
        assert_eq!(params.get_str("entity_type").as_deref(), Some("TABLE"));
        assert!(!params.contains("guid"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_empty_row_is_unknown() {
        let entity = build_entity_context(&Map::new());
        assert_eq!(entity, EntityContext::default());
    }

    #[test]
    fn test_table_name_falls_back_to_name() {
        let row = json!({"name": "CUSTOMERS", "type": "VIEW", "guid": 42});
        let entity = build_entity_context(row.as_object().unwrap());
        assert_eq!(entity.entity_type, EntityType::View);
        assert_eq!(entity.table.as_deref(), Some("CUSTOMERS"));
        assert_eq!(entity.guid.as_deref(), Some("42"));
    }

    #[test]
    fn test_blank_values_read_as_absent() {
        let row = json!({"name": "  ", "table_name": "T", "typename": null});
        let entity = build_entity_context(row.as_object().unwrap());
        assert_eq!(entity.name, None);
        assert_eq!(entity.table.as_deref(), Some("T"));
        assert_eq!(entity.entity_type, EntityType::Unknown);
    }
}
