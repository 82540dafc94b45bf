use serde_json::{Map, Value};

use super::{FlowStep, WizardRecipe};
use crate::entity::entity_params;
use crate::error::FlowError;
use crate::extractors::extract_bindings;
use crate::location::{resolve_entity_table, resolve_location};
use crate::templates::{header, TemplateContext, TemplateRegistry};
use crate::types::{
    BuildOutcome, DiscoveryReason, EntityContext, Inputs, Params, QueryResults, SystemConfig,
    TableSet,
};

/// A wizard recipe bound to the templates and configuration it runs with.
#[derive(Debug, Clone, Copy)]
pub struct WizardFlow<'a> {
    pub recipe: &'a WizardRecipe,
    templates: &'a TemplateRegistry,
    config: &'a SystemConfig,
}

/// Bind `recipe` for execution. `None` when the recipe has no steps.
pub fn build_flow_from_recipe<'a>(
    recipe: &'a WizardRecipe,
    templates: &'a TemplateRegistry,
    config: &'a SystemConfig,
) -> Option<WizardFlow<'a>> {
    if recipe.steps.is_empty() {
        return None;
    }
    Some(WizardFlow {
        recipe,
        templates,
        config,
    })
}

impl<'a> WizardFlow<'a> {
    pub fn id(&self) -> &str {
        &self.recipe.id
    }

    pub fn len(&self) -> usize {
        self.recipe.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipe.steps.is_empty()
    }

    pub fn config(&self) -> &'a SystemConfig {
        self.config
    }

    pub fn step(&self, index: usize) -> Option<WizardStep<'a>> {
        self.recipe.steps.get(index).map(|step| WizardStep { flow: *self, step })
    }

    pub fn steps(&self) -> impl Iterator<Item = WizardStep<'a>> + '_ {
        (0..self.len()).filter_map(|i| self.step(i))
    }

    /// Inputs for the first step: recipe defaults, then entity fields, the
    /// resolved location, and the metadata location. `has_lineage` records
    /// whether a lineage process table could be located.
    pub fn build_initial_inputs(&self, entity: &EntityContext, available_tables: &TableSet) -> Inputs {
        let resolved = resolve_location(entity, self.config);
        let mut inputs = self.recipe.default_inputs.clone();
        inputs.merge(&entity_params(&resolved));
        inputs.insert("metadata_db", self.config.metadata_db());
        inputs.insert("metadata_schema", self.config.metadata_schema());
        inputs.insert(
            "has_lineage",
            resolve_entity_table("PROCESS_ENTITY", self.config, available_tables).is_some(),
        );
        inputs
    }
}

/// One step of a bound wizard.
#[derive(Debug, Clone, Copy)]
pub struct WizardStep<'a> {
    flow: WizardFlow<'a>,
    pub step: &'a FlowStep,
}

impl WizardStep<'_> {
    /// Template parameters: entity fields, accumulated inputs, the metadata
    /// location, then input bindings copied onto their parameter names.
    pub fn params(&self, entity: &EntityContext, inputs: &Inputs) -> Params {
        let config = self.flow.config;
        let resolved = resolve_location(entity, config);
        let mut params = entity_params(&resolved);
        params.merge(inputs);
        if !params.contains("metadata_db") {
            params.insert("metadata_db", config.metadata_db());
        }
        if !params.contains("metadata_schema") {
            params.insert("metadata_schema", config.metadata_schema());
        }
        for (input, param) in &self.step.input_bindings {
            if let Some(value) = inputs.get(input) {
                params.insert(param.as_str(), value.clone());
            }
        }
        params
    }

    /// Build the step query. An unregistered template yields a commented no-op
    /// query instead of an error.
    pub fn build_query(
        &self,
        entity: &EntityContext,
        inputs: &Inputs,
        available_tables: &TableSet,
    ) -> Result<BuildOutcome, FlowError> {
        let id = &self.step.query_id;
        if !self.flow.templates.contains(id) {
            #[cfg(feature = "tracing")]
            tracing::warn!(wizard = %self.flow.recipe.id, step = %self.step.id, template = %id, "missing template");
            let sql = format!(
                "{}SELECT NULL AS MISSING_TEMPLATE WHERE FALSE;",
                header(&[
                    format!("Missing template '{id}' for step '{}'.", self.step.id),
                    "This step cannot run; skip it or fix the recipe.".to_string(),
                ])
            );
            return Ok(BuildOutcome::discovery(
                sql,
                "Missing Template",
                DiscoveryReason::MissingTemplate { id: id.clone() },
            ));
        }
        let params = self.params(entity, inputs);
        let ctx = TemplateContext::new(&params, available_tables, self.flow.config);
        self.flow.templates.build(id, &ctx)
    }

    /// Values for the following steps, mined from this step's result.
    pub fn extract_data_for_next(&self, results: &QueryResults) -> Map<String, Value> {
        extract_bindings(&self.step.output_bindings, results)
    }
}
