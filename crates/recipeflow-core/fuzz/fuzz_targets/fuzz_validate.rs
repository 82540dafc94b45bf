//! Fuzz target for the query table validator.
//!
//! `validate_query_tables()` must not panic on arbitrary SQL, including input the
//! parser rejects and the regex scan has to handle.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use recipeflow_core::{validate_query_tables, TableSet};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    sql: String,
    database: String,
    schema: String,
    tables: Vec<String>,
}

fuzz_target!(|input: FuzzInput| {
    let tables: TableSet = input.tables.iter().collect();
    let report = validate_query_tables(&input.sql, &input.database, &input.schema, &tables);
    if let Some(suggested) = report.suggested_query {
        assert!(!report.valid);
        let _ = validate_query_tables(&suggested, &input.database, &input.schema, &tables);
    }
});
