//! Fuzzy lookup of replacement tables when an expected table is missing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::safety::build_safe_fqn;
use crate::types::TableSet;

/// Score at or above which a replacement is confident enough to rewrite a query.
pub const CONFIDENT_SCORE: f64 = 0.6;

/// A table that could stand in for a missing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeTable {
    pub table_name: String,
    /// Quoted `database.schema.table`, safe to splice into SQL.
    pub fully_qualified: String,
    pub score: f64,
    pub reason: String,
}

fn normalize(name: &str) -> String {
    name.to_uppercase().replace("_ENTITY", "").replace('_', "")
}

fn score_table(target: &str, table: &str, table_name: &str) -> Option<(f64, &'static str)> {
    if table == target {
        Some((1.0, "exact match"))
    } else if table.contains(target) || target.contains(table) {
        Some((0.8, "similar name"))
    } else if target.chars().count() >= 4
        && table.starts_with(&target.chars().take(4).collect::<String>())
    {
        Some((0.6, "same category"))
    } else if table_name.to_uppercase().ends_with("_ENTITY") {
        Some((0.3, "entity table"))
    } else {
        None
    }
}

/// Rank tables in `available` that could replace `target`, best first.
///
/// Names are compared uppercase with `_ENTITY` and underscores removed. Equal scores
/// are ordered by Jaro-Winkler similarity, then by name.
pub fn find_alternative_tables(
    target: &str,
    database: &str,
    schema: &str,
    available: &TableSet,
    limit: usize,
) -> Vec<AlternativeTable> {
    let wanted = normalize(target);
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<(f64, f64, AlternativeTable)> = available
        .iter()
        .filter_map(|table_name| {
            let normalized = normalize(table_name);
            if normalized.is_empty() {
                return None;
            }
            let (score, reason) = score_table(&wanted, &normalized, table_name)?;
            let fully_qualified =
                build_safe_fqn(Some(database), Some(schema), Some(table_name)).ok()?;
            let similarity = strsim::jaro_winkler(&wanted, &normalized);
            Some((
                score,
                similarity,
                AlternativeTable {
                    table_name: table_name.to_string(),
                    fully_qualified,
                    score,
                    reason: reason.to_string(),
                },
            ))
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.total_cmp(&a.1))
            .then_with(|| a.2.table_name.cmp(&b.2.table_name))
    });
    ranked.truncate(limit);
    ranked.into_iter().map(|(_, _, alt)| alt).collect()
}

/// The best replacement when it clears [`CONFIDENT_SCORE`].
pub fn confident_alternative(alternatives: &[AlternativeTable]) -> Option<&AlternativeTable> {
    alternatives
        .first()
        .filter(|alt| alt.score >= CONFIDENT_SCORE)
}
