//! Browser bindings. Every entry point takes a JSON request and returns JSON.
//!
//! No entry point throws: failures come back as `{"error": Issue}` objects.

mod wizard;

use recipeflow_core::extractors::extract_bindings;
use recipeflow_core::{
    build_entity_context, normalize_results, validate_query_tables, Issue, OutputBindings, Params,
    RawResults, RecipeFile, Registry, RegistryBuilder, SystemConfig, TableSet,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::OnceLock;
use wasm_bindgen::prelude::*;

pub use wizard::wizard_step_json;

pub(crate) mod error_codes {
    pub const REQUEST_PARSE_ERROR: &str = "REQUEST_PARSE_ERROR";
    pub const SERIALIZATION_ERROR: &str = "SERIALIZATION_ERROR";
    pub const BUILD_ERROR: &str = "BUILD_ERROR";
    pub const INVALID_RECIPES: &str = "INVALID_RECIPES";
    pub const WIZARD_ERROR: &str = "WIZARD_ERROR";
}

#[derive(Serialize)]
struct Failure {
    error: Issue,
}

pub(crate) fn failure_json(code: &str, message: impl Into<String>) -> String {
    serde_json::to_string(&Failure {
        error: Issue::error(code, message),
    })
    .unwrap_or_else(|_| r#"{"error":{"severity":"error","code":"SERIALIZATION_ERROR","message":"Failed to serialize error result"}}"#.to_string())
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| failure_json(error_codes::SERIALIZATION_ERROR, e.to_string()))
}

pub(crate) fn parse_request<T: DeserializeOwned>(request_json: &str) -> Result<T, String> {
    serde_json::from_str(request_json).map_err(|e| {
        failure_json(
            error_codes::REQUEST_PARSE_ERROR,
            format!("Invalid request format: {e}"),
        )
    })
}

fn builtin_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::builtin)
}

/// The built-in registry, or a fresh one that also holds `extra` recipes.
pub(crate) fn registry_with(extra: Option<RecipeFile>) -> Result<Cow<'static, Registry>, String> {
    let Some(extra) = extra else {
        return Ok(Cow::Borrowed(builtin_registry()));
    };
    RegistryBuilder::new()
        .add_flows(recipeflow_core::builtin_flows())
        .add_wizards(recipeflow_core::builtin_wizards())
        .add_recipe_file(extra)
        .build_strict()
        .map(Cow::Owned)
        .map_err(|issues| {
            let messages: Vec<String> = issues
                .iter()
                .filter(|i| i.is_error())
                .map(|i| format!("[{}] {}", i.code, i.message))
                .collect();
            failure_json(error_codes::INVALID_RECIPES, messages.join("; "))
        })
}

/// Fields shared by requests that act on one entity.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct EntityRequest {
    /// Metadata row as returned by the entity query.
    pub entity: Map<String, Value>,
    pub available_tables: TableSet,
    pub config: SystemConfig,
    pub recipes: Option<RecipeFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildRequest {
    flow_type: String,
    #[serde(default)]
    overrides: Params,
    #[serde(flatten)]
    context: EntityRequest,
}

/// Build the query of one flow for an entity.
#[wasm_bindgen]
pub fn build_flow_query_json(request_json: &str) -> String {
    let request: BuildRequest = match parse_request(request_json) {
        Ok(request) => request,
        Err(failure) => return failure,
    };
    let registry = match registry_with(request.context.recipes) {
        Ok(registry) => registry,
        Err(failure) => return failure,
    };
    let entity = build_entity_context(&request.context.entity);
    match registry.build_flow_query(
        &request.flow_type,
        &entity,
        &request.overrides,
        &request.context.available_tables,
        &request.context.config,
    ) {
        Ok(query) => to_json(&query),
        Err(err) => failure_json(error_codes::BUILD_ERROR, err.to_string()),
    }
}

/// Flows that apply to an entity, best first.
#[wasm_bindgen]
pub fn get_flows_for_entity_json(request_json: &str) -> String {
    let request: EntityRequest = match parse_request(request_json) {
        Ok(request) => request,
        Err(failure) => return failure,
    };
    let registry = match registry_with(request.recipes) {
        Ok(registry) => registry,
        Err(failure) => return failure,
    };
    let entity = build_entity_context(&request.entity);
    to_json(&registry.rank_flows(&entity, &request.available_tables, &request.config))
}

/// The normalized entity a metadata row describes.
#[wasm_bindgen]
pub fn build_entity_context_json(row_json: &str) -> String {
    match parse_request::<Map<String, Value>>(row_json) {
        Ok(row) => to_json(&build_entity_context(&row)),
        Err(failure) => failure,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    sql: String,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    available_tables: TableSet,
    #[serde(default)]
    config: SystemConfig,
}

/// Check the tables a query reads. Unqualified references resolve to
/// `database`/`schema`, else to the configured metadata location.
#[wasm_bindgen]
pub fn validate_query_tables_json(request_json: &str) -> String {
    let request: ValidateRequest = match parse_request(request_json) {
        Ok(request) => request,
        Err(failure) => return failure,
    };
    let database = request
        .database
        .as_deref()
        .unwrap_or(request.config.metadata_db());
    let schema = request
        .schema
        .as_deref()
        .unwrap_or(request.config.metadata_schema());
    to_json(&validate_query_tables(
        &request.sql,
        database,
        schema,
        &request.available_tables,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractRequest {
    results: RawResults,
    bindings: OutputBindings,
}

/// Evaluate output bindings against a query result.
#[wasm_bindgen]
pub fn run_extractors_json(request_json: &str) -> String {
    match parse_request::<ExtractRequest>(request_json) {
        Ok(request) => to_json(&extract_bindings(
            &request.bindings,
            &normalize_results(&request.results),
        )),
        Err(failure) => failure,
    }
}

/// Every registered flow and wizard recipe.
#[wasm_bindgen]
pub fn list_recipes_json() -> String {
    let registry = builtin_registry();
    to_json(&RecipeFile {
        flows: registry.flows().cloned().collect(),
        wizards: registry.wizards().cloned().collect(),
    })
}

/// Get version information
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Report panics on the browser console.
#[wasm_bindgen]
pub fn install_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Forward core tracing events to the browser console.
#[cfg(feature = "tracing")]
#[wasm_bindgen]
pub fn enable_tracing() {
    tracing_wasm::set_as_global_default();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(f: fn(&str) -> String, request: Value) -> Value {
        serde_json::from_str(&f(&request.to_string())).unwrap()
    }

    fn orders() -> Value {
        json!({
            "GUID": "g-1",
            "TYPENAME": "Table",
            "NAME": "ORDERS",
            "DATABASENAME": "SALES",
            "SCHEMANAME": "PUBLIC"
        })
    }

    #[test]
    fn test_build_flow_query() {
        let result = call(
            build_flow_query_json,
            json!({
                "flowType": "SAMPLE_ROWS",
                "entity": orders(),
                "overrides": {"limit": 3}
            }),
        );
        assert_eq!(result["sql"], "-- Sample of ORDERS\nSELECT * FROM SALES.PUBLIC.ORDERS LIMIT 3;");
        assert_eq!(result["requiresContext"], false);
    }

    #[test]
    fn test_unknown_flow_is_an_error_object() {
        let result = call(
            build_flow_query_json,
            json!({"flowType": "NOPE", "entity": orders()}),
        );
        assert_eq!(result["error"]["code"], error_codes::BUILD_ERROR);
    }

    #[test]
    fn test_invalid_request() {
        let parsed: Value = serde_json::from_str(&build_flow_query_json("{not json")).unwrap();
        assert_eq!(parsed["error"]["code"], error_codes::REQUEST_PARSE_ERROR);
        assert_eq!(parsed["error"]["severity"], "error");
    }

    #[test]
    fn test_invalid_extra_recipes() {
        let result = call(
            get_flows_for_entity_json,
            json!({
                "entity": orders(),
                "recipes": {"flows": [{"id": "BROKEN", "label": "Broken", "template": "nope"}]}
            }),
        );
        assert_eq!(result["error"]["code"], error_codes::INVALID_RECIPES);
    }

    #[test]
    fn test_flows_for_entity() {
        let result = call(
            get_flows_for_entity_json,
            json!({"entity": orders(), "availableTables": ["PROCESS_ENTITY"]}),
        );
        let flows = result.as_array().unwrap();
        assert!(flows.iter().any(|f| f["flowId"] == "LINEAGE_DOWNSTREAM"));
    }

    #[test]
    fn test_validate_query_tables() {
        let result = call(
            validate_query_tables_json,
            json!({
                "sql": "SELECT * FROM PROCESS_ENTITY",
                "availableTables": ["PROCESS"]
            }),
        );
        assert_eq!(result["valid"], false);
        assert_eq!(
            result["suggestedQuery"],
            "SELECT * FROM FIELD_METADATA.PUBLIC.PROCESS"
        );
    }

    #[test]
    fn test_run_extractors() {
        let result = call(
            run_extractors_json,
            json!({
                "results": {"columns": ["guid"], "rows": [["a"], ["b"], ["c"]]},
                "bindings": {
                    "guids": {"mode": "collect_array", "column": "GUID", "limit": 2},
                    "count": {"mode": "row_count"},
                    "odd": {"mode": "sideways"}
                }
            }),
        );
        assert_eq!(result, json!({"guids": ["a", "b"], "count": 3, "odd": null}));
    }

    #[test]
    fn test_entity_context() {
        let result: Value = serde_json::from_str(&build_entity_context_json(&orders().to_string())).unwrap();
        assert_eq!(result["type"], "TABLE");
        assert_eq!(result["table"], "ORDERS");
    }

    #[test]
    fn test_list_recipes() {
        let result: Value = serde_json::from_str(&list_recipes_json()).unwrap();
        assert!(!result["flows"].as_array().unwrap().is_empty());
        assert_eq!(result["wizards"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_get_version() {
        assert!(!get_version().is_empty());
    }
}
