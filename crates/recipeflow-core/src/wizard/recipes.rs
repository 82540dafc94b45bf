//! Built-in wizards.

use serde_json::json;

use super::{FlowStep, SkipCondition, WizardRecipe};
use crate::extractors::Extractor;
use crate::templates::template_ids;
use crate::types::Inputs;

pub mod wizard_ids {
    pub const LINEAGE_WIZARD: &str = "LINEAGE_WIZARD";
    pub const TABLE_EXPLORER: &str = "TABLE_EXPLORER";
    pub const ENTITY_DISCOVERY: &str = "ENTITY_DISCOVERY";
}

fn column(name: &str) -> String {
    name.to_string()
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Processes touching the entity, then the assets on the other side, then an
/// optional sample of the first related table.
fn lineage_wizard() -> WizardRecipe {
    WizardRecipe {
        id: wizard_ids::LINEAGE_WIZARD.to_string(),
        label: "Trace Lineage".to_string(),
        description: "Follow lineage processes to related assets".to_string(),
        default_inputs: Inputs::new().with("direction", "UPSTREAM"),
        steps: vec![
            FlowStep::new("processes", "Find Lineage Processes", template_ids::LINEAGE)
                .description("Processes that read or write this entity")
                .bind_output(
                    "related_guids",
                    Extractor::JsonArrayValues {
                        columns: columns(&["HOP_GUIDS"]),
                        key: "guid".to_string(),
                        limit: Some(50),
                    },
                )
                .bind_output("process_count", Extractor::RowCount),
            FlowStep::new("related", "Related Assets", template_ids::ENTITIES_BY_GUID)
                .description("Tables on the other side of those processes")
                .bind_input("related_guids", "guids")
                .skip_when(
                    SkipCondition::InputEmpty {
                        input: "related_guids".to_string(),
                    },
                    "No lineage processes reference this entity",
                )
                .bind_output(
                    "related_assets",
                    Extractor::ObjectArray {
                        columns: columns(&["GUID", "NAME", "DATABASENAME", "SCHEMANAME"]),
                    },
                )
                .bind_output("sample_table", Extractor::FirstValue { column: column("NAME") })
                .bind_output("sample_database", Extractor::FirstValue { column: column("DATABASENAME") })
                .bind_output("sample_schema", Extractor::FirstValue { column: column("SCHEMANAME") }),
            FlowStep::new("sample", "Sample Related Table", template_ids::SAMPLE_ROWS)
                .optional()
                .bind_input("sample_table", "table")
                .bind_input("sample_database", "database")
                .bind_input("sample_schema", "schema")
                .skip_when(
                    SkipCondition::InputMissing {
                        input: "sample_table".to_string(),
                    },
                    "No related table to sample",
                ),
        ],
    }
}

/// Columns, a sample, and an optional per-column profile.
fn table_explorer() -> WizardRecipe {
    WizardRecipe {
        id: wizard_ids::TABLE_EXPLORER.to_string(),
        label: "Explore Table".to_string(),
        description: "Describe, sample, and profile a table".to_string(),
        default_inputs: Inputs::new(),
        steps: vec![
            FlowStep::new("describe", "Columns", template_ids::DESCRIBE_TABLE)
                .bind_output(
                    "column_names",
                    Extractor::CollectArray {
                        column: column("name"),
                        limit: Some(500),
                    },
                )
                .bind_output("column_count", Extractor::RowCount),
            FlowStep::new("sample", "Sample Rows", template_ids::SAMPLE_ROWS)
                .bind_output("has_data", Extractor::HasRows),
            FlowStep::new("profile", "Profile a Column", template_ids::COLUMN_PROFILE)
                .description("Null, distinct, and range statistics for one column")
                .optional()
                .requires(&["column"])
                .skip_when(
                    SkipCondition::InputEquals {
                        input: "has_data".to_string(),
                        value: json!(false),
                    },
                    "Table has no rows to profile",
                ),
        ],
    }
}

/// Entity tables in the metadata database, then the table holding the entity's guid.
fn entity_discovery() -> WizardRecipe {
    WizardRecipe {
        id: wizard_ids::ENTITY_DISCOVERY.to_string(),
        label: "Discover Entity Tables".to_string(),
        description: "List metadata entity tables and locate this entity".to_string(),
        default_inputs: Inputs::new(),
        steps: vec![
            FlowStep::new("entity_tables", "Entity Tables", template_ids::ENTITY_TABLES)
                .bind_input("metadata_db", "database")
                .bind_output(
                    "candidate_tables",
                    Extractor::CollectArray {
                        column: column("TABLE_NAME"),
                        limit: None,
                    },
                )
                .bind_output("entity_table_count", Extractor::RowCount),
            FlowStep::new("locate", "Find by GUID", template_ids::FIND_BY_GUID)
                .skip_when(
                    SkipCondition::InputMissing {
                        input: "guid".to_string(),
                    },
                    "Entity has no GUID",
                )
                .bind_output(
                    "source_table",
                    Extractor::FirstValue {
                        column: column("SOURCE_TABLE"),
                    },
                ),
        ],
    }
}

pub fn builtin_wizards() -> Vec<WizardRecipe> {
    vec![lineage_wizard(), table_explorer(), entity_discovery()]
}
