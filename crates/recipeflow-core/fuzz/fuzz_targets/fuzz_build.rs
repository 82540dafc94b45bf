//! Fuzz target for flow building.
//!
//! Arbitrary metadata rows and parameter values go through the built-in flows.
//! Building and ranking must not panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use recipeflow_core::{build_entity_context, Params, Registry, SystemConfig, TableSet};
use serde_json::{Map, Value};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    fields: Vec<(String, String)>,
    params: Vec<(String, String)>,
    tables: Vec<String>,
    flow_idx: u8,
}

fuzz_target!(|input: FuzzInput| {
    let row: Map<String, Value> = input
        .fields
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    let entity = build_entity_context(&row);

    let mut overrides = Params::new();
    for (key, value) in input.params {
        overrides.insert(key, value);
    }
    let tables: TableSet = input.tables.iter().collect();
    let config = SystemConfig::default();

    let registry = Registry::builtin();
    let flows: Vec<_> = registry.flows().collect();
    if flows.is_empty() {
        return;
    }
    let flow = flows[usize::from(input.flow_idx) % flows.len()];
    let _ = registry.build_flow_query(&flow.id, &entity, &overrides, &tables, &config);
    let _ = registry.rank_flows(&entity, &tables, &config);
});
