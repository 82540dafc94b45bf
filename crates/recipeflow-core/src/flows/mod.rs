//! Single-step flow recipes: which entities a flow applies to, its default
//! parameters, and the template it runs.
//!
//! Recipes are plain data so operators can ship new ones as JSON. Structural
//! problems are caught by [`validate_recipe`] when a registry is built; invalid
//! recipes are reported and left out, never offered as runnable.

mod builtin;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub use builtin::{builtin_flows, flow_ids};

use crate::templates::TemplateRegistry;
use crate::types::{issue_codes, EntityContext, EntityType, Inputs, Issue, Params};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowRecipe {
    pub id: String,
    pub label: String,
    pub description: String,
    /// Canonical entity type names. `UNKNOWN` matches every entity.
    pub supported_entity_types: Vec<String>,
    /// Id of the template that builds the query.
    pub template: String,
    /// Parameters applied before caller overrides.
    pub defaults: Params,
    /// Parameters copied from entity fields: parameter name to field name.
    pub entity_defaults: BTreeMap<String, String>,
}

impl FlowRecipe {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            template: template.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn entity_types(mut self, types: &[EntityType]) -> Self {
        self.supported_entity_types = types.iter().map(|t| t.as_str().to_string()).collect();
        self
    }

    pub fn default_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.defaults.insert(key, value);
        self
    }

    pub fn default_from_entity(mut self, param: impl Into<String>, field: impl Into<String>) -> Self {
        self.entity_defaults.insert(param.into(), field.into());
        self
    }

    /// Default inputs for `entity`: static defaults, then entity-derived ones.
    pub fn build_defaults(&self, entity: &EntityContext) -> Inputs {
        let mut inputs = self.defaults.clone();
        for (param, field) in &self.entity_defaults {
            inputs.insert_opt(param.as_str(), entity.field(field));
        }
        inputs
    }
}

/// Outcome of [`validate_recipe`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecipeValidation {
    pub valid: bool,
    pub errors: Vec<Issue>,
    /// Parsed entity types when valid.
    #[serde(skip)]
    pub entity_types: BTreeSet<EntityType>,
}

/// Check one recipe registered under `key` against `templates`.
pub fn validate_recipe(key: &str, recipe: &FlowRecipe, templates: &TemplateRegistry) -> RecipeValidation {
    let mut errors = Vec::new();
    let mut error = |code: &str, message: String| {
        errors.push(Issue::error(code, message).with_subject(key));
    };

    for (field, value) in [
        ("id", &recipe.id),
        ("label", &recipe.label),
        ("template", &recipe.template),
    ] {
        if value.trim().is_empty() {
            error(issue_codes::RECIPE_MISSING_FIELD, format!("missing required field '{field}'"));
        }
    }
    if !recipe.id.is_empty() && recipe.id != key {
        error(
            issue_codes::RECIPE_ID_MISMATCH,
            format!("id '{}' does not match registry key '{key}'", recipe.id),
        );
    }
    if recipe.supported_entity_types.is_empty() {
        error(issue_codes::RECIPE_NO_ENTITY_TYPES, "no supported entity types".to_string());
    }

    let mut entity_types = BTreeSet::new();
    for name in &recipe.supported_entity_types {
        match name.parse::<EntityType>() {
            Ok(t) => {
                entity_types.insert(t);
            }
            Err(err) => error(issue_codes::RECIPE_UNKNOWN_ENTITY_TYPE, err.to_string()),
        }
    }
    if !recipe.template.trim().is_empty() && !templates.contains(&recipe.template) {
        error(
            issue_codes::RECIPE_UNKNOWN_TEMPLATE,
            format!("template '{}' is not registered", recipe.template),
        );
    }

    RecipeValidation {
        valid: errors.is_empty(),
        errors,
        entity_types,
    }
}

/// Validate every recipe; returns all diagnostics. Never fails.
pub fn validate_all<'a, I>(recipes: I, templates: &TemplateRegistry) -> Vec<Issue>
where
    I: IntoIterator<Item = (&'a str, &'a FlowRecipe)>,
{
    recipes
        .into_iter()
        .flat_map(|(key, recipe)| validate_recipe(key, recipe, templates).errors)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::template_ids;

    fn recipe() -> FlowRecipe {
        FlowRecipe::new("SAMPLE", "Sample", template_ids::SAMPLE_ROWS)
            .entity_types(&[EntityType::Table])
    }

    #[test]
    fn test_valid_recipe() {
        let result = validate_recipe("SAMPLE", &recipe(), &TemplateRegistry::builtin());
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.entity_types, BTreeSet::from([EntityType::Table]));
    }

    #[test]
    fn test_every_problem_is_reported() {
        let mut bad = recipe();
        bad.id = "OTHER".to_string();
        bad.label = " ".to_string();
        bad.template = "nope".to_string();
        bad.supported_entity_types = vec!["TABLE".to_string(), "SPREADSHEET".to_string()];

        let result = validate_recipe("SAMPLE", &bad, &TemplateRegistry::builtin());
        assert!(!result.valid);
        let codes: Vec<&str> = result.errors.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![
                issue_codes::RECIPE_MISSING_FIELD,
                issue_codes::RECIPE_ID_MISMATCH,
                issue_codes::RECIPE_UNKNOWN_ENTITY_TYPE,
                issue_codes::RECIPE_UNKNOWN_TEMPLATE,
            ]
        );
        assert!(result.errors.iter().all(|i| i.subject.as_deref() == Some("SAMPLE")));
    }

    #[test]
    fn test_empty_entity_types() {
        let mut bad = recipe();
        bad.supported_entity_types.clear();
        let result = validate_recipe("SAMPLE", &bad, &TemplateRegistry::builtin());
        assert_eq!(result.errors[0].code, issue_codes::RECIPE_NO_ENTITY_TYPES);
    }

    #[test]
    fn test_validate_all_collects() {
        let good = recipe();
        let mut bad = recipe();
        bad.template = String::new();
        let issues = validate_all(
            [("SAMPLE", &good), ("SAMPLE", &bad)],
            &TemplateRegistry::builtin(),
        );
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_build_defaults_layers() {
        let recipe = FlowRecipe::new("USAGE", "Usage", template_ids::USAGE)
            .default_param("days", 14)
            .default_param("search", "static")
            .default_from_entity("search", "name");
        let mut entity = EntityContext::new(EntityType::Table);
        entity.table = Some("ORDERS".to_string());
        entity.name = Some("Orders".to_string());

        let inputs = recipe.build_defaults(&entity);
        assert_eq!(inputs.get_u64("days"), Some(14));
        assert_eq!(inputs.get_str("search").as_deref(), Some("Orders"));
        assert!(!inputs.contains("table"));
    }

    #[test]
    fn test_recipe_from_json() {
        let recipe: FlowRecipe = serde_json::from_str(
            r#"{"id": "X", "label": "X", "template": "usage",
                "supportedEntityTypes": ["TABLE"], "defaults": {"days": 7}}"#,
        )
        .unwrap();
        assert_eq!(recipe.defaults.get_u64("days"), Some(7));
        assert!(validate_recipe("X", &recipe, &TemplateRegistry::builtin()).valid);
    }
}
