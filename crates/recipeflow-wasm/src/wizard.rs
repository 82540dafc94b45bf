//! Stateless wizard stepping across the JS boundary.
//!
//! The browser owns the [`WizardState`]. Each call hands it back together with
//! whatever happened since the last call (results of the running step, new user
//! inputs, a skip request, an execution error) and receives the updated state
//! plus the next action.

use recipeflow_core::{
    build_entity_context, normalize_results, BuildOutcome, DiscoveryReason, Inputs, RawResults,
    StepAction, WizardState,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;

use crate::{error_codes, failure_json, parse_request, registry_with, to_json, EntityRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WizardRequest {
    wizard_id: String,
    /// Absent on the first call.
    #[serde(default)]
    state: Option<WizardState>,
    /// Results of the step the previous call asked to run.
    #[serde(default)]
    results: Option<RawResults>,
    /// Execution error of that step, instead of results.
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    inputs: Inputs,
    /// Skip the current step (optional steps only).
    #[serde(default)]
    skip: bool,
    #[serde(flatten)]
    context: EntityRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
enum Action {
    Run {
        step_id: String,
        title: String,
        sql: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        fallback_reason: Option<DiscoveryReason>,
    },
    AwaitInput {
        step_id: String,
        missing: Vec<String>,
    },
    Failed {
        message: String,
    },
    Complete,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WizardResponse {
    state: WizardState,
    action: Action,
    /// Data mined from `results`, already merged into `state.inputs`.
    #[serde(skip_serializing_if = "Map::is_empty")]
    extracted: Map<String, Value>,
}

/// Advance a wizard by one interaction.
#[wasm_bindgen]
pub fn wizard_step_json(request_json: &str) -> String {
    let request: WizardRequest = match parse_request(request_json) {
        Ok(request) => request,
        Err(failure) => return failure,
    };
    let registry = match registry_with(request.context.recipes) {
        Ok(registry) => registry,
        Err(failure) => return failure,
    };
    let config = &request.context.config;
    let tables = &request.context.available_tables;
    let flow = match registry.wizard_flow(&request.wizard_id, config) {
        Ok(flow) => flow,
        Err(err) => return failure_json(error_codes::WIZARD_ERROR, err.to_string()),
    };
    let entity = build_entity_context(&request.context.entity);

    let mut state = match request.state {
        Some(state) if state.flow_id != flow.id() => {
            return failure_json(
                error_codes::WIZARD_ERROR,
                format!("state belongs to wizard '{}', not '{}'", state.flow_id, flow.id()),
            );
        }
        Some(state) => state,
        None => {
            let mut inputs = flow.build_initial_inputs(&entity, tables);
            inputs.merge(&request.inputs);
            WizardState::new(&flow, inputs)
        }
    };

    let reports_execution = request.error.is_some() || request.results.is_some();
    if reports_execution && !state.is_running() {
        return failure_json(
            error_codes::WIZARD_ERROR,
            "results or an error were sent but no step is running",
        );
    }

    let mut extracted = Map::new();
    if let Some(error) = request.error {
        state.fail_step(error, &flow);
    } else if let Some(results) = &request.results {
        extracted = state.complete_step(&flow, &normalize_results(results));
    } else if request.skip && !state.skip_current(&flow) {
        return failure_json(
            error_codes::WIZARD_ERROR,
            "only an optional step that was prepared can be skipped",
        );
    }
    state.provide_inputs(&request.inputs);

    let action = match state.prepare_step(&flow, &entity, tables) {
        Ok(StepAction::Run {
            step_id,
            title,
            outcome,
        }) => {
            let fallback_reason = match &outcome {
                BuildOutcome::Discovery { reason, .. } => Some(reason.clone()),
                BuildOutcome::Resolved { .. } => None,
            };
            Action::Run {
                step_id,
                title,
                sql: outcome.into_sql(),
                fallback_reason,
            }
        }
        Ok(StepAction::AwaitInput { step_id, missing }) => Action::AwaitInput { step_id, missing },
        Ok(StepAction::Complete) => Action::Complete,
        Err(err) => Action::Failed {
            message: err.to_string(),
        },
    };

    to_json(&WizardResponse {
        state,
        action,
        extracted,
    })
}
