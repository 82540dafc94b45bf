use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::WizardFlow;
use crate::error::FlowError;
use crate::types::{BuildOutcome, EntityContext, Inputs, QueryResults, TableSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WizardStatus {
    #[default]
    Idle,
    RunningStep,
    AwaitingInput,
    StepComplete,
    Error,
    FlowComplete,
}

/// Log entry for one step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub success: bool,
    pub extracted_data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_message: Option<String>,
}

impl StepResult {
    pub fn success(step_id: impl Into<String>, extracted_data: Map<String, Value>) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            extracted_data,
            ..Default::default()
        }
    }

    pub fn failure(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn skipped(step_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            skipped: true,
            skip_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// What the caller should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Execute `outcome.sql()` and hand the result to [`WizardState::complete_step`].
    Run {
        step_id: String,
        title: String,
        outcome: BuildOutcome,
    },
    /// Supply `missing` via [`WizardState::provide_inputs`], or skip an optional step.
    AwaitInput {
        step_id: String,
        missing: Vec<String>,
    },
    Complete,
}

/// Progress of one wizard run. Dropping the value cancels the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub flow_id: String,
    pub current_step_index: usize,
    pub inputs: Inputs,
    pub step_results: Vec<StepResult>,
    pub status: WizardStatus,
    pub is_complete: bool,
}

impl WizardState {
    pub fn new(flow: &WizardFlow<'_>, inputs: Inputs) -> Self {
        Self {
            flow_id: flow.id().to_string(),
            current_step_index: 0,
            inputs,
            step_results: Vec::new(),
            status: if flow.is_empty() {
                WizardStatus::FlowComplete
            } else {
                WizardStatus::Idle
            },
            is_complete: flow.is_empty(),
        }
    }

    /// Move to the current step.
    ///
    /// Steps whose skip condition holds are recorded as skipped and passed over.
    /// A step with missing required inputs parks the wizard in
    /// [`WizardStatus::AwaitingInput`]. Otherwise the step query is built and the
    /// wizard enters [`WizardStatus::RunningStep`]. A build error is recorded as a
    /// failed step and returned.
    pub fn prepare_step(
        &mut self,
        flow: &WizardFlow<'_>,
        entity: &EntityContext,
        available_tables: &TableSet,
    ) -> Result<StepAction, FlowError> {
        loop {
            if self.is_complete {
                return Ok(StepAction::Complete);
            }
            let Some(current) = flow.step(self.current_step_index) else {
                self.finish();
                return Ok(StepAction::Complete);
            };
            let step = current.step;

            if step.should_skip(&self.inputs) {
                let message = step
                    .skip_message
                    .clone()
                    .unwrap_or_else(|| format!("Skipped '{}'", step.title));
                #[cfg(feature = "tracing")]
                tracing::debug!(wizard = %self.flow_id, step = %step.id, "step skipped");
                self.advance(StepResult::skipped(&step.id, message), flow);
                continue;
            }

            let missing = step.missing_inputs(&self.inputs);
            if !missing.is_empty() {
                #[cfg(feature = "tracing")]
                tracing::debug!(wizard = %self.flow_id, step = %step.id, ?missing, "awaiting input");
                self.status = WizardStatus::AwaitingInput;
                return Ok(StepAction::AwaitInput {
                    step_id: step.id.clone(),
                    missing,
                });
            }

            return match current.build_query(entity, &self.inputs, available_tables) {
                Ok(outcome) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(wizard = %self.flow_id, step = %step.id, discovery = outcome.is_discovery(), "running step");
                    self.status = WizardStatus::RunningStep;
                    Ok(StepAction::Run {
                        step_id: step.id.clone(),
                        title: step.title.clone(),
                        outcome,
                    })
                }
                Err(err) => {
                    self.fail_step(err.to_string(), flow);
                    Err(err)
                }
            };
        }
    }

    /// True between [`Self::prepare_step`] handing out a query and that query's
    /// result or failure being recorded.
    pub fn is_running(&self) -> bool {
        self.status == WizardStatus::RunningStep
    }

    /// Mine the executed step's result and advance. Returns the extracted data.
    ///
    /// Only a step that is running can be completed; otherwise nothing changes
    /// and the returned map is empty.
    pub fn complete_step(&mut self, flow: &WizardFlow<'_>, results: &QueryResults) -> Map<String, Value> {
        if !self.is_running() {
            #[cfg(feature = "tracing")]
            tracing::debug!(wizard = %self.flow_id, status = ?self.status, "ignored results for a step that is not running");
            return Map::new();
        }
        let Some(step) = flow.step(self.current_step_index) else {
            return Map::new();
        };
        let data = step.extract_data_for_next(results);
        self.advance(StepResult::success(&step.step.id, data.clone()), flow);
        data
    }

    /// Record a failed build or execution of the current step. The index does not
    /// move; preparing the step again retries it.
    pub fn fail_step(&mut self, error: impl Into<String>, flow: &WizardFlow<'_>) {
        let step_id = flow
            .step(self.current_step_index)
            .map(|s| s.step.id.clone())
            .unwrap_or_default();
        let error = error.into();
        #[cfg(feature = "tracing")]
        tracing::debug!(wizard = %self.flow_id, step = %step_id, %error, "step failed");
        self.step_results.push(StepResult::failure(step_id, error));
        self.status = WizardStatus::Error;
    }

    /// Merge `result` into the inputs, log it, and move to the next step. No-op
    /// once the wizard is complete.
    pub fn advance(&mut self, result: StepResult, flow: &WizardFlow<'_>) {
        if self.is_complete {
            return;
        }
        for (key, value) in &result.extracted_data {
            self.inputs.insert(key.as_str(), value.clone());
        }
        self.step_results.push(result);
        self.current_step_index += 1;
        if self.current_step_index >= flow.len() {
            self.finish();
        } else {
            self.status = WizardStatus::StepComplete;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(wizard = %self.flow_id, index = self.current_step_index, complete = self.is_complete, "advanced");
    }

    /// Add user-supplied inputs; a wizard awaiting input becomes ready again.
    pub fn provide_inputs(&mut self, inputs: &Inputs) {
        self.inputs.merge(inputs);
        if self.status == WizardStatus::AwaitingInput {
            self.status = WizardStatus::Idle;
        }
    }

    /// Skip the current step at the user's request. Only an optional step that
    /// has been prepared (running or awaiting input) can be skipped; returns
    /// whether the step was skipped.
    pub fn skip_current(&mut self, flow: &WizardFlow<'_>) -> bool {
        if self.is_complete
            || !matches!(self.status, WizardStatus::RunningStep | WizardStatus::AwaitingInput)
        {
            return false;
        }
        let Some(step) = flow.step(self.current_step_index) else {
            return false;
        };
        if !step.step.optional {
            return false;
        }
        let message = step
            .step
            .skip_message
            .clone()
            .unwrap_or_else(|| "Skipped by user".to_string());
        self.advance(StepResult::skipped(&step.step.id, message), flow);
        true
    }

    fn finish(&mut self) {
        self.is_complete = true;
        self.status = WizardStatus::FlowComplete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::Extractor;
    use crate::templates::{template_ids, TemplateRegistry};
    use crate::types::{EntityType, SystemConfig};
    use crate::wizard::{build_flow_from_recipe, FlowStep, SkipCondition, WizardRecipe};
    use serde_json::json;

    fn explorer() -> WizardRecipe {
        WizardRecipe {
            id: "EXPLORE".to_string(),
            label: "Explore".to_string(),
            steps: vec![
                FlowStep::new("sample", "Sample", template_ids::SAMPLE_ROWS)
                    .bind_output("has_data", Extractor::HasRows),
                FlowStep::new("profile", "Profile", template_ids::COLUMN_PROFILE)
                    .optional()
                    .requires(&["column"]),
                FlowStep::new("top", "Top values", template_ids::COLUMN_TOP_VALUES)
                    .skip_when(
                        SkipCondition::InputEquals {
                            input: "has_data".to_string(),
                            value: json!(false),
                        },
                        "Table is empty",
                    ),
            ],
            ..Default::default()
        }
    }

    fn entity() -> EntityContext {
        let mut entity = EntityContext::new(EntityType::Table);
        entity.database = Some("DB".to_string());
        entity.schema = Some("S".to_string());
        entity.table = Some("T".to_string());
        entity
    }

    fn rows(n: usize) -> QueryResults {
        QueryResults::new(vec!["A".to_string()], (0..n).map(|i| vec![json!(i)]).collect())
    }

    #[test]
    fn test_run_to_completion_with_input() {
        let recipe = explorer();
        let templates = TemplateRegistry::builtin();
        let config = SystemConfig::default();
        let flow = build_flow_from_recipe(&recipe, &templates, &config).unwrap();
        let tables = TableSet::new();
        let mut state = WizardState::new(&flow, Inputs::new());
        assert_eq!(state.status, WizardStatus::Idle);

        let action = state.prepare_step(&flow, &entity(), &tables).unwrap();
        assert!(matches!(action, StepAction::Run { ref step_id, .. } if step_id == "sample"));
        assert_eq!(state.status, WizardStatus::RunningStep);
        state.complete_step(&flow, &rows(3));
        assert_eq!(state.inputs.get("has_data"), Some(&json!(true)));

        let action = state.prepare_step(&flow, &entity(), &tables).unwrap();
        assert_eq!(
            action,
            StepAction::AwaitInput {
                step_id: "profile".to_string(),
                missing: vec!["column".to_string()],
            }
        );
        state.provide_inputs(&Inputs::new().with("column", "ID"));
        let StepAction::Run { outcome, .. } = state.prepare_step(&flow, &entity(), &tables).unwrap() else {
            panic!("expected a runnable step");
        };
        assert!(outcome.sql().contains("COUNT(DISTINCT ID)"));
        state.complete_step(&flow, &rows(1));

        state.prepare_step(&flow, &entity(), &tables).unwrap();
        state.complete_step(&flow, &rows(1));
        assert!(state.is_complete);
        assert_eq!(state.status, WizardStatus::FlowComplete);
        assert_eq!(state.step_results.len(), 3);
        assert_eq!(state.prepare_step(&flow, &entity(), &tables).unwrap(), StepAction::Complete);
    }

    #[test]
    fn test_skip_optional_and_auto_skip() {
        let recipe = explorer();
        let templates = TemplateRegistry::builtin();
        let config = SystemConfig::default();
        let flow = build_flow_from_recipe(&recipe, &templates, &config).unwrap();
        let tables = TableSet::new();
        let mut state = WizardState::new(&flow, Inputs::new());

        assert!(!state.skip_current(&flow));
        state.prepare_step(&flow, &entity(), &tables).unwrap();
        state.complete_step(&flow, &rows(0));

        state.prepare_step(&flow, &entity(), &tables).unwrap();
        assert!(state.skip_current(&flow));

        // has_data is false, so the last step skips itself.
        assert_eq!(state.prepare_step(&flow, &entity(), &tables).unwrap(), StepAction::Complete);
        let last = state.step_results.last().unwrap();
        assert!(last.skipped);
        assert_eq!(last.skip_message.as_deref(), Some("Table is empty"));
        assert!(state.is_complete);
    }

    #[test]
    fn test_failure_does_not_advance() {
        let recipe = explorer();
        let templates = TemplateRegistry::builtin();
        let config = SystemConfig::default();
        let flow = build_flow_from_recipe(&recipe, &templates, &config).unwrap();
        let mut state = WizardState::new(&flow, Inputs::new());

        let mut bad = entity();
        bad.table = Some("bad\0name".to_string());
        assert!(state.prepare_step(&flow, &bad, &TableSet::new()).is_err());
        assert_eq!(state.status, WizardStatus::Error);
        assert_eq!(state.current_step_index, 0);
        assert!(!state.step_results[0].success);

        state.fail_step("warehouse timeout", &flow);
        assert_eq!(state.step_results.len(), 2);
        assert!(state.prepare_step(&flow, &entity(), &TableSet::new()).is_ok());
    }

    #[test]
    fn test_results_without_running_step_are_ignored() {
        let recipe = explorer();
        let templates = TemplateRegistry::builtin();
        let config = SystemConfig::default();
        let flow = build_flow_from_recipe(&recipe, &templates, &config).unwrap();
        let tables = TableSet::new();

        let mut fresh = WizardState::new(&flow, Inputs::new());
        assert!(fresh.complete_step(&flow, &rows(2)).is_empty());
        assert_eq!(fresh.current_step_index, 0);
        assert_eq!(fresh.status, WizardStatus::Idle);
        assert!(fresh.step_results.is_empty());

        let mut state = WizardState::new(&flow, Inputs::new());
        state.prepare_step(&flow, &entity(), &tables).unwrap();
        assert!(state.is_running());
        state.complete_step(&flow, &rows(1));
        assert!(matches!(
            state.prepare_step(&flow, &entity(), &tables).unwrap(),
            StepAction::AwaitInput { .. }
        ));
        assert!(state.complete_step(&flow, &rows(1)).is_empty());
        assert_eq!(state.current_step_index, 1);
        assert_eq!(state.status, WizardStatus::AwaitingInput);
        assert_eq!(state.step_results.len(), 1);

        state.fail_step("warehouse timeout", &flow);
        assert!(state.complete_step(&flow, &rows(1)).is_empty());
        assert_eq!(state.current_step_index, 1);
    }

    #[test]
    fn test_skip_requires_a_prepared_step() {
        let recipe = WizardRecipe {
            id: "OPTIONAL_FIRST".to_string(),
            label: "Optional first".to_string(),
            steps: vec![
                FlowStep::new("peek", "Peek", template_ids::SAMPLE_ROWS).optional(),
                FlowStep::new("describe", "Describe", template_ids::DESCRIBE_TABLE),
            ],
            ..Default::default()
        };
        let templates = TemplateRegistry::builtin();
        let config = SystemConfig::default();
        let flow = build_flow_from_recipe(&recipe, &templates, &config).unwrap();

        let mut state = WizardState::new(&flow, Inputs::new());
        assert!(!state.skip_current(&flow));
        assert_eq!(state.current_step_index, 0);

        state.prepare_step(&flow, &entity(), &TableSet::new()).unwrap();
        assert!(state.skip_current(&flow));
        assert_eq!(state.current_step_index, 1);
        assert_eq!(state.status, WizardStatus::StepComplete);
        assert!(!state.skip_current(&flow));
    }

    #[test]
    fn test_advance_is_monotonic() {
        let recipe = explorer();
        let templates = TemplateRegistry::builtin();
        let config = SystemConfig::default();
        let flow = build_flow_from_recipe(&recipe, &templates, &config).unwrap();
        let mut state = WizardState::new(&flow, Inputs::new());
        for expected in 1..=3 {
            state.advance(StepResult::success("x", Map::new()), &flow);
            assert_eq!(state.current_step_index, expected);
        }
        assert!(state.is_complete);
        let before = state.clone();
        state.advance(StepResult::success("x", Map::new()), &flow);
        assert_eq!(state, before);
    }
}
