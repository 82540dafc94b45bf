//! Flows shipped with the engine.

use super::FlowRecipe;
use crate::templates::template_ids;
use crate::types::EntityType::{self, *};

/// Built-in flow ids.
pub mod flow_ids {
    pub const LINEAGE_UPSTREAM: &str = "LINEAGE_UPSTREAM";
    pub const LINEAGE_DOWNSTREAM: &str = "LINEAGE_DOWNSTREAM";
    pub const USAGE: &str = "USAGE";
    pub const SAMPLE_ROWS: &str = "SAMPLE_ROWS";
    pub const SCHEMA_BROWSE: &str = "SCHEMA_BROWSE";
    pub const GLOSSARY: &str = "GLOSSARY";
    pub const FIND_BY_GUID: &str = "FIND_BY_GUID";
    pub const COLUMN_PROFILE: &str = "COLUMN_PROFILE";
    pub const COLUMN_TOP_VALUES: &str = "COLUMN_TOP_VALUES";
}

const LINEAGE_TYPES: &[EntityType] = &[Table, View, Column, Process, Dashboard, Pipeline];

pub fn builtin_flows() -> Vec<FlowRecipe> {
    vec![
        FlowRecipe::new(flow_ids::LINEAGE_UPSTREAM, "Upstream Lineage", template_ids::LINEAGE)
            .description("Processes that produce this asset and the assets they read from")
            .entity_types(LINEAGE_TYPES)
            .default_param("direction", "UPSTREAM"),
        FlowRecipe::new(flow_ids::LINEAGE_DOWNSTREAM, "Downstream Lineage", template_ids::LINEAGE)
            .description("Processes that read this asset and the assets they write to")
            .entity_types(LINEAGE_TYPES)
            .default_param("direction", "DOWNSTREAM"),
        FlowRecipe::new(flow_ids::USAGE, "Query Usage", template_ids::USAGE)
            .description("Recent queries that mention this asset")
            .entity_types(&[Table, View, Column])
            .default_from_entity("search", "table"),
        FlowRecipe::new(flow_ids::SAMPLE_ROWS, "Sample Rows", template_ids::SAMPLE_ROWS)
            .description("A bounded sample of the table's rows")
            .entity_types(&[Table, View]),
        FlowRecipe::new(flow_ids::SCHEMA_BROWSE, "Browse Schema", template_ids::SCHEMA_BROWSE)
            .description("Describe the table or list what its container holds")
            .entity_types(&[Table, View, Database, Schema]),
        FlowRecipe::new(flow_ids::GLOSSARY, "Glossary Terms", template_ids::GLOSSARY_LOOKUP)
            .description("Glossary terms for this asset")
            .entity_types(&[GlossaryTerm, Table, View, Column]),
        FlowRecipe::new(flow_ids::FIND_BY_GUID, "Find by GUID", template_ids::FIND_BY_GUID)
            .description("Locate the entity's row in every entity table")
            .entity_types(&[Unknown]),
        FlowRecipe::new(flow_ids::COLUMN_PROFILE, "Column Profile", template_ids::COLUMN_PROFILE)
            .description("Null, distinct, min and max for this column")
            .entity_types(&[Column]),
        FlowRecipe::new(flow_ids::COLUMN_TOP_VALUES, "Top Values", template_ids::COLUMN_TOP_VALUES)
            .description("Most frequent values of this column")
            .entity_types(&[Column]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::validate_all;
    use crate::templates::TemplateRegistry;

    #[test]
    fn test_builtin_flows_are_valid() {
        let flows = builtin_flows();
        let issues = validate_all(
            flows.iter().map(|f| (f.id.as_str(), f)),
            &TemplateRegistry::builtin(),
        );
        assert!(issues.is_empty(), "{issues:?}");
    }
}
