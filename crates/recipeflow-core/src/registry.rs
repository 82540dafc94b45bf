//! The flow registry: validated flows and wizards, built once and shared.
//!
//! [`RegistryBuilder`] validates every recipe as it builds. The lenient
//! [`RegistryBuilder::build`] drops invalid recipes and keeps their diagnostics;
//! [`RegistryBuilder::build_strict`] refuses to build when any recipe is invalid.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::entity::entity_params;
use crate::error::FlowError;
use crate::flows::{builtin_flows, validate_recipe, FlowRecipe};
use crate::location::resolve_location;
use crate::templates::{TemplateContext, TemplateRegistry};
use crate::types::{
    issue_codes, BuildOutcome, BuiltQuery, EntityContext, EntityType, Issue, Params, SystemConfig,
    TableSet,
};
use crate::validator::{validate_query_tables, TableStatus};
use crate::wizard::{build_flow_from_recipe, builtin_wizards, validate_wizard, WizardFlow, WizardRecipe};

/// Recipes shipped as a JSON document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeFile {
    pub flows: Vec<FlowRecipe>,
    pub wizards: Vec<WizardRecipe>,
}

#[derive(Debug, Clone)]
struct RegisteredFlow {
    recipe: FlowRecipe,
    entity_types: BTreeSet<EntityType>,
}

impl RegisteredFlow {
    fn applies_to(&self, entity_type: EntityType) -> bool {
        self.entity_types.contains(&entity_type) || self.entity_types.contains(&EntityType::Unknown)
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    templates: TemplateRegistry,
    flows: IndexMap<String, RegisteredFlow>,
    wizards: IndexMap<String, WizardRecipe>,
    diagnostics: Vec<Issue>,
}

#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    templates: TemplateRegistry,
    flows: Vec<(String, FlowRecipe)>,
    wizards: Vec<WizardRecipe>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// Builder with the built-in templates and no recipes.
    pub fn new() -> Self {
        Self {
            templates: TemplateRegistry::builtin(),
            flows: Vec::new(),
            wizards: Vec::new(),
        }
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    /// Register `recipe` under its own id.
    pub fn add_flow(self, recipe: FlowRecipe) -> Self {
        let key = recipe.id.clone();
        self.add_flow_as(key, recipe)
    }

    pub fn add_flow_as(mut self, key: impl Into<String>, recipe: FlowRecipe) -> Self {
        self.flows.push((key.into(), recipe));
        self
    }

    pub fn add_flows(self, recipes: impl IntoIterator<Item = FlowRecipe>) -> Self {
        recipes.into_iter().fold(self, Self::add_flow)
    }

    pub fn add_wizard(mut self, recipe: WizardRecipe) -> Self {
        self.wizards.push(recipe);
        self
    }

    pub fn add_wizards(self, recipes: impl IntoIterator<Item = WizardRecipe>) -> Self {
        recipes.into_iter().fold(self, Self::add_wizard)
    }

    pub fn add_recipe_file(self, file: RecipeFile) -> Self {
        self.add_flows(file.flows).add_wizards(file.wizards)
    }

    /// Build, dropping invalid recipes. Their problems are kept in
    /// [`Registry::diagnostics`].
    pub fn build(self) -> Registry {
        let mut diagnostics = Vec::new();
        let mut flows = IndexMap::new();

        for (key, recipe) in self.flows {
            if flows.contains_key(&key) {
                diagnostics.push(
                    Issue::error(
                        issue_codes::RECIPE_DUPLICATE_ID,
                        format!("flow '{key}' is registered more than once; keeping the first"),
                    )
                    .with_subject(&key),
                );
                continue;
            }
            let validation = validate_recipe(&key, &recipe, &self.templates);
            if !validation.valid {
                #[cfg(feature = "tracing")]
                tracing::warn!(flow = %key, errors = validation.errors.len(), "rejected flow recipe");
                diagnostics.extend(validation.errors);
                continue;
            }
            flows.insert(
                key,
                RegisteredFlow {
                    recipe,
                    entity_types: validation.entity_types,
                },
            );
        }

        let mut wizards = IndexMap::new();
        for recipe in self.wizards {
            let mut issues = validate_wizard(&recipe, &self.templates);
            if wizards.contains_key(&recipe.id) {
                issues.push(
                    Issue::error(
                        issue_codes::RECIPE_DUPLICATE_ID,
                        format!("wizard '{}' is registered more than once; keeping the first", recipe.id),
                    )
                    .with_subject(&recipe.id),
                );
            }
            let rejected = issues.iter().any(Issue::is_error);
            diagnostics.extend(issues);
            if rejected {
                #[cfg(feature = "tracing")]
                tracing::warn!(wizard = %recipe.id, "rejected wizard recipe");
                continue;
            }
            wizards.insert(recipe.id.clone(), recipe);
        }

        Registry {
            templates: self.templates,
            flows,
            wizards,
            diagnostics,
        }
    }

    /// Build, failing with every diagnostic when any recipe is invalid.
    pub fn build_strict(self) -> Result<Registry, Vec<Issue>> {
        let registry = self.build();
        if registry.diagnostics.iter().any(Issue::is_error) {
            Err(registry.diagnostics)
        } else {
            Ok(registry)
        }
    }
}

/// How usable a flow is for an entity right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FlowReadiness {
    /// Builds a complete query against tables that exist.
    Ready,
    /// Builds a discovery query instead.
    Fallback,
    /// Fails to build or reads tables that do not exist.
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RankedFlow {
    pub flow_id: String,
    pub label: String,
    pub readiness: FlowReadiness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<BuiltQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_tables: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Registry {
    /// Built-in templates, flows, and wizards.
    pub fn builtin() -> Self {
        RegistryBuilder::new()
            .add_flows(builtin_flows())
            .add_wizards(builtin_wizards())
            .build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Problems found while building; rejected recipes are not registered.
    pub fn diagnostics(&self) -> &[Issue] {
        &self.diagnostics
    }

    pub fn flow(&self, id: &str) -> Option<&FlowRecipe> {
        self.flows.get(id).map(|f| &f.recipe)
    }

    /// Registered flows in registration order.
    pub fn flows(&self) -> impl Iterator<Item = &FlowRecipe> {
        self.flows.values().map(|f| &f.recipe)
    }

    pub fn wizard(&self, id: &str) -> Option<&WizardRecipe> {
        self.wizards.get(id)
    }

    pub fn wizards(&self) -> impl Iterator<Item = &WizardRecipe> {
        self.wizards.values()
    }

    /// Flows supporting `entity_type`, including wildcard (`UNKNOWN`) flows.
    pub fn get_flows_for_entity_type(&self, entity_type: EntityType) -> Vec<&FlowRecipe> {
        self.flows
            .values()
            .filter(|f| f.applies_to(entity_type))
            .map(|f| &f.recipe)
            .collect()
    }

    /// Build the query of flow `flow_type` for `entity`.
    ///
    /// Parameters are layered: entity fields (after location resolution), the
    /// metadata location, the recipe defaults, then `overrides`; later layers win.
    pub fn build_flow_query(
        &self,
        flow_type: &str,
        entity: &EntityContext,
        overrides: &Params,
        available_tables: &TableSet,
        config: &SystemConfig,
    ) -> Result<BuiltQuery, FlowError> {
        let flow = self
            .flows
            .get(flow_type)
            .ok_or_else(|| FlowError::UnknownFlow(flow_type.to_string()))?;
        let recipe = &flow.recipe;
        let resolved = resolve_location(entity, config);

        let mut params = entity_params(&resolved);
        params.insert("metadata_db", config.metadata_db());
        params.insert("metadata_schema", config.metadata_schema());
        params.merge(&recipe.build_defaults(&resolved));
        params.merge(overrides);

        let ctx = TemplateContext::new(&params, available_tables, config);
        let outcome = self.templates.build(&recipe.template, &ctx)?;
        let defaults = &config.query_defaults;
        let row_limit = defaults.bounded_rows(params.get_u64("limit"), defaults.default_row_limit);

        let (title, description, fallback_reason, sql) = match outcome {
            BuildOutcome::Resolved { sql } => {
                (recipe.label.clone(), recipe.description.clone(), None, sql)
            }
            BuildOutcome::Discovery { sql, title, reason } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(flow = %flow_type, reason = %reason.describe(), "flow fell back to discovery");
                (title, reason.describe(), Some(reason), sql)
            }
        };

        Ok(BuiltQuery {
            title,
            description,
            sql,
            database: resolved.database.clone().unwrap_or_default(),
            schema: resolved.schema.clone().unwrap_or_default(),
            timeout_seconds: defaults.default_timeout_sec,
            row_limit,
            flow_type: recipe.id.clone(),
            requires_context: fallback_reason.is_some(),
            fallback_reason,
            source_entity: resolved,
        })
    }

    /// Wizard `id` bound to `config`.
    pub fn wizard_flow<'a>(&'a self, id: &str, config: &'a SystemConfig) -> Result<WizardFlow<'a>, FlowError> {
        self.wizards
            .get(id)
            .and_then(|recipe| build_flow_from_recipe(recipe, &self.templates, config))
            .ok_or_else(|| FlowError::UnknownWizard(id.to_string()))
    }

    /// Build every flow that applies to `entity` and order them by readiness,
    /// then label.
    pub fn rank_flows(
        &self,
        entity: &EntityContext,
        available_tables: &TableSet,
        config: &SystemConfig,
    ) -> Vec<RankedFlow> {
        let mut ranked: Vec<RankedFlow> = self
            .get_flows_for_entity_type(entity.entity_type)
            .into_iter()
            .map(|recipe| {
                let built =
                    self.build_flow_query(&recipe.id, entity, &Params::new(), available_tables, config);
                let mut ranked = RankedFlow {
                    flow_id: recipe.id.clone(),
                    label: recipe.label.clone(),
                    readiness: FlowReadiness::Ready,
                    query: None,
                    missing_tables: Vec::new(),
                    error: None,
                };
                match built {
                    Err(err) => {
                        ranked.readiness = FlowReadiness::Blocked;
                        ranked.error = Some(err.to_string());
                    }
                    Ok(query) => {
                        if query.requires_context {
                            ranked.readiness = FlowReadiness::Fallback;
                        } else {
                            let report = validate_query_tables(
                                &query.sql,
                                config.metadata_db(),
                                config.metadata_schema(),
                                available_tables,
                            );
                            ranked.missing_tables = report
                                .tables
                                .into_iter()
                                .filter(|t| t.status == TableStatus::Missing)
                                .map(|t| t.fully_qualified)
                                .collect();
                            if !ranked.missing_tables.is_empty() {
                                ranked.readiness = FlowReadiness::Blocked;
                            }
                        }
                        ranked.query = Some(query);
                    }
                }
                ranked
            })
            .collect();
        ranked.sort_by(|a, b| a.readiness.cmp(&b.readiness).then_with(|| a.label.cmp(&b.label)));
        ranked
    }
}
