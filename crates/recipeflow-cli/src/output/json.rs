//! JSON output formatting.

use anyhow::{Context, Result};
use serde::Serialize;

/// Format any report as JSON.
///
/// If `compact` is true, outputs minified JSON without whitespace.
pub fn format_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    json.context("Failed to serialize output")
}
