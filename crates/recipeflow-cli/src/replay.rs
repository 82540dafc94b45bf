//! Replaying a wizard against recorded query results.
//!
//! The CLI never executes SQL. Each step's query is built as the browser would
//! build it, and the results recorded for that step id stand in for execution.

use recipeflow_core::{
    normalize_results, EntityContext, Inputs, RawResults, StepAction, TableSet, WizardFlow,
    WizardState,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStatus {
    Ran,
    Skipped,
    Failed,
    AwaitingInput,
}

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStep {
    pub step_id: String,
    pub status: ReplayStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub discovery: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extracted: Map<String, Value>,
}

impl ReplayStep {
    fn new(step_id: impl Into<String>, status: ReplayStatus) -> Self {
        Self {
            step_id: step_id.into(),
            status,
            title: None,
            sql: None,
            discovery: false,
            message: None,
            extracted: Map::new(),
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub wizard: String,
    pub steps: Vec<ReplayStep>,
    pub state: WizardState,
}

impl ReplayReport {
    /// True when every step ran or was skipped and the wizard finished.
    pub fn succeeded(&self) -> bool {
        self.state.is_complete
            && self
                .steps
                .iter()
                .all(|s| matches!(s.status, ReplayStatus::Ran | ReplayStatus::Skipped))
    }
}

/// Drive `flow` to completion, feeding each step the results recorded for it.
///
/// Stops at the first step that fails to build, has no recorded results, or needs
/// inputs nobody supplied. Optional steps waiting for input are skipped.
pub fn replay_wizard(
    flow: &WizardFlow<'_>,
    entity: &EntityContext,
    available_tables: &TableSet,
    inputs: &Inputs,
    recorded: &BTreeMap<String, RawResults>,
) -> ReplayReport {
    let mut initial = flow.build_initial_inputs(entity, available_tables);
    initial.merge(inputs);
    let mut state = WizardState::new(flow, initial);
    let mut steps = Vec::new();

    loop {
        let logged = state.step_results.len();
        let action = state.prepare_step(flow, entity, available_tables);
        steps.extend(
            state.step_results[logged..]
                .iter()
                .filter(|r| r.skipped)
                .map(|r| {
                    let step = ReplayStep::new(&r.step_id, ReplayStatus::Skipped);
                    match &r.skip_message {
                        Some(message) => step.with_message(message),
                        None => step,
                    }
                }),
        );

        match action {
            Ok(StepAction::Complete) => break,
            Ok(StepAction::Run {
                step_id,
                title,
                outcome,
            }) => {
                let mut step = ReplayStep::new(&step_id, ReplayStatus::Ran);
                step.title = Some(title);
                step.discovery = outcome.is_discovery();
                step.sql = Some(outcome.into_sql());

                let Some(raw) = recorded.get(&step_id) else {
                    let message = format!("no recorded results for step '{step_id}'");
                    state.fail_step(&message, flow);
                    step.status = ReplayStatus::Failed;
                    steps.push(step.with_message(message));
                    break;
                };
                tracing::info!(step = %step_id, "replaying recorded results");
                step.extracted = state.complete_step(flow, &normalize_results(raw));
                steps.push(step);
            }
            Ok(StepAction::AwaitInput { step_id, missing }) => {
                if state.skip_current(flow) {
                    let message = state
                        .step_results
                        .last()
                        .and_then(|r| r.skip_message.clone())
                        .unwrap_or_default();
                    steps.push(ReplayStep::new(step_id, ReplayStatus::Skipped).with_message(message));
                    continue;
                }
                steps.push(
                    ReplayStep::new(step_id, ReplayStatus::AwaitingInput)
                        .with_message(format!("missing inputs: {}", missing.join(", "))),
                );
                break;
            }
            Err(err) => {
                let step_id = state
                    .step_results
                    .last()
                    .map(|r| r.step_id.clone())
                    .unwrap_or_default();
                steps.push(ReplayStep::new(step_id, ReplayStatus::Failed).with_message(err.to_string()));
                break;
            }
        }
    }

    ReplayReport {
        wizard: flow.id().to_string(),
        steps,
        state,
    }
}
