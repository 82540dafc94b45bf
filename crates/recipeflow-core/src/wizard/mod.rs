//! Multi-step wizards.
//!
//! A [`WizardRecipe`] is an ordered list of [`FlowStep`]s. Each step runs one
//! template; the caller executes the query, and the step's output bindings mine
//! the result for inputs of the following steps. [`WizardState`] tracks one run.

mod builder;
mod recipes;
mod state;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

pub use builder::{build_flow_from_recipe, WizardFlow, WizardStep};
pub use recipes::{builtin_wizards, wizard_ids};
pub use state::{StepAction, StepResult, WizardState, WizardStatus};

use crate::extractors::OutputBindings;
use crate::templates::TemplateRegistry;
use crate::types::{issue_codes, Inputs, Issue};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardRecipe {
    pub id: String,
    pub label: String,
    pub description: String,
    pub steps: Vec<FlowStep>,
    /// Inputs seeded before the first step, below entity-derived values.
    pub default_inputs: Inputs,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowStep {
    pub id: String,
    pub title: String,
    pub description: String,
    pub optional: bool,
    /// Template that builds the step query.
    pub query_id: String,
    /// Input name to template parameter name.
    pub input_bindings: BTreeMap<String, String>,
    /// Output name to extractor.
    pub output_bindings: OutputBindings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_if: Option<SkipCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_message: Option<String>,
    /// Inputs the user must supply before the step can run.
    pub required_inputs: Vec<String>,
}

impl FlowStep {
    pub fn new(id: impl Into<String>, title: impl Into<String>, query_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            query_id: query_id.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn bind_input(mut self, input: impl Into<String>, param: impl Into<String>) -> Self {
        self.input_bindings.insert(input.into(), param.into());
        self
    }

    pub fn bind_output(mut self, output: impl Into<String>, extractor: crate::extractors::Extractor) -> Self {
        self.output_bindings.insert(output.into(), extractor.into());
        self
    }

    pub fn skip_when(mut self, condition: SkipCondition, message: impl Into<String>) -> Self {
        self.skip_if = Some(condition);
        self.skip_message = Some(message.into());
        self
    }

    pub fn requires(mut self, inputs: &[&str]) -> Self {
        self.required_inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether the step should be skipped given the accumulated inputs.
    pub fn should_skip(&self, inputs: &Inputs) -> bool {
        self.skip_if
            .as_ref()
            .is_some_and(|condition| condition.holds(inputs))
    }

    /// Required inputs not yet present.
    pub fn missing_inputs(&self, inputs: &Inputs) -> Vec<String> {
        self.required_inputs
            .iter()
            .filter(|name| !inputs.contains(name))
            .cloned()
            .collect()
    }
}

/// Predicate deciding whether a step is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum SkipCondition {
    /// The input is absent.
    InputMissing { input: String },
    /// The input is absent, an empty list, or an empty object.
    InputEmpty { input: String },
    /// The input equals `value`; strings compare case-insensitively.
    InputEquals { input: String, value: Value },
}

impl SkipCondition {
    pub fn holds(&self, inputs: &Inputs) -> bool {
        match self {
            Self::InputMissing { input } => !inputs.contains(input),
            Self::InputEmpty { input } => match inputs.get(input) {
                None => true,
                Some(Value::Array(items)) => items.is_empty(),
                Some(Value::Object(map)) => map.is_empty(),
                Some(_) => false,
            },
            Self::InputEquals { input, value } => match (inputs.get(input), value) {
                (Some(Value::String(a)), Value::String(b)) => a.eq_ignore_ascii_case(b),
                (Some(actual), expected) => actual == expected,
                (None, expected) => expected.is_null(),
            },
        }
    }
}

/// Structural diagnostics for a wizard recipe.
///
/// Steps naming an unknown template or extractor are warnings: they still run,
/// degrading to a visible no-op query or a `null` output.
pub fn validate_wizard(recipe: &WizardRecipe, templates: &TemplateRegistry) -> Vec<Issue> {
    let mut issues = Vec::new();
    if recipe.steps.is_empty() {
        issues.push(
            Issue::error(issue_codes::WIZARD_NO_STEPS, "wizard has no steps").with_subject(&recipe.id),
        );
    }
    let mut seen = HashSet::new();
    for step in &recipe.steps {
        let subject = format!("{}.{}", recipe.id, step.id);
        if !seen.insert(step.id.as_str()) {
            issues.push(
                Issue::error(
                    issue_codes::WIZARD_DUPLICATE_STEP,
                    format!("step id '{}' is used more than once", step.id),
                )
                .with_subject(&subject),
            );
        }
        if !templates.contains(&step.query_id) {
            issues.push(
                Issue::warning(
                    issue_codes::WIZARD_UNKNOWN_TEMPLATE,
                    format!("template '{}' is not registered", step.query_id),
                )
                .with_subject(&subject),
            );
        }
        for (output, spec) in &step.output_bindings {
            let Some(problem) = spec.problem() else {
                continue;
            };
            let code = if spec.is_malformed() {
                issue_codes::WIZARD_INVALID_EXTRACTOR
            } else {
                issue_codes::WIZARD_UNKNOWN_EXTRACTOR
            };
            issues.push(
                Issue::warning(code, format!("output '{output}': {problem}")).with_subject(&subject),
            );
        }
    }
    issues
}
