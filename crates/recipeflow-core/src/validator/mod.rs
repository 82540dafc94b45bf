//! Pre-flight check of the tables a query reads.
//!
//! Before a built query is executed, its table references are compared against the
//! tables discovered in the target schema. Missing tables come back with ranked
//! alternatives and, when one is confident enough, a rewritten query.

mod extract;

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use extract::{extract_table_refs, ExtractedTables, TableRef};

use crate::discovery::{confident_alternative, find_alternative_tables, AlternativeTable};
use crate::safety::build_safe_fqn;
use crate::types::{issue_codes, Issue, TableSet};

/// Alternatives reported per missing table.
const MAX_ALTERNATIVES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    /// Found in the discovered schema.
    Present,
    /// Belongs to the discovered schema but is not in it.
    Missing,
    /// Lives in another database or schema; nothing is known about it.
    Unverified,
}

/// Verdict for one table reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableCheck {
    pub reference: TableRef,
    pub fully_qualified: String,
    pub status: TableStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<AlternativeTable>,
}

/// Result of [`validate_query_tables`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryTableValidation {
    /// False when at least one table is missing.
    pub valid: bool,
    pub tables: Vec<TableCheck>,
    pub issues: Vec<Issue>,
    /// Replacement candidates for all missing tables, best first per table.
    pub suggestions: Vec<AlternativeTable>,
    /// The query with every confidently replaceable table swapped in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_query: Option<String>,
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_uppercase() == b.to_uppercase()
}

/// Check the tables referenced by `sql` against `available`, the tables discovered
/// in `database.schema`. Unqualified references resolve against that location.
///
/// A query with no table references (`SHOW`, `DESCRIBE`, ...) is valid.
pub fn validate_query_tables(
    sql: &str,
    database: &str,
    schema: &str,
    available: &TableSet,
) -> QueryTableValidation {
    let extracted = extract_table_refs(sql);
    let mut issues = Vec::new();
    if extracted.used_fallback {
        issues.push(Issue::info(
            issue_codes::PARSE_FALLBACK,
            "Query did not parse; table references were found by pattern scan",
        ));
    }
    if extracted.tables.is_empty() {
        issues.push(Issue::info(
            issue_codes::NO_TABLES_DETECTED,
            "No tables detected in query (might be a SHOW/DESCRIBE command)",
        ));
        return QueryTableValidation {
            valid: true,
            tables: Vec::new(),
            issues,
            suggestions: Vec::new(),
            suggested_query: None,
        };
    }

    let mut tables = Vec::with_capacity(extracted.tables.len());
    let mut suggestions = Vec::new();
    let mut replacements: Vec<(String, String)> = Vec::new();

    for reference in extracted.tables {
        let ref_db = reference.database.as_deref().unwrap_or(database);
        let ref_schema = reference.schema.as_deref().unwrap_or(schema);
        let fully_qualified = build_safe_fqn(Some(ref_db), Some(ref_schema), Some(&reference.table))
            .unwrap_or_else(|_| reference.text.clone());

        let in_scope = same_name(ref_db, database) && same_name(ref_schema, schema);
        let (status, alternatives) = if !in_scope {
            issues.push(
                Issue::info(
                    issue_codes::UNVERIFIED_TABLE,
                    format!("Table {fully_qualified} is outside {database}.{schema} and was not checked"),
                )
                .with_subject(&fully_qualified),
            );
            (TableStatus::Unverified, Vec::new())
        } else if available.contains(&reference.table) {
            (TableStatus::Present, Vec::new())
        } else {
            let alternatives =
                find_alternative_tables(&reference.table, database, schema, available, MAX_ALTERNATIVES);
            let message = match confident_alternative(&alternatives) {
                Some(best) => {
                    replacements.push((reference.text.clone(), best.fully_qualified.clone()));
                    format!(
                        "Table {fully_qualified} does not exist; did you mean {}?",
                        best.fully_qualified
                    )
                }
                None => format!("Table {fully_qualified} does not exist"),
            };
            issues.push(Issue::error(issue_codes::MISSING_TABLE, message).with_subject(&fully_qualified));
            suggestions.extend(alternatives.iter().cloned());
            (TableStatus::Missing, alternatives)
        };

        tables.push(TableCheck {
            reference,
            fully_qualified,
            status,
            alternatives,
        });
    }

    let valid = tables.iter().all(|t| t.status != TableStatus::Missing);
    let suggested_query = (!replacements.is_empty()).then(|| {
        replacements
            .iter()
            .fold(sql.to_string(), |query, (from, to)| replace_reference(&query, from, to))
    });

    #[cfg(feature = "tracing")]
    tracing::debug!(
        tables = tables.len(),
        valid,
        rewritten = suggested_query.is_some(),
        "validated query tables"
    );

    QueryTableValidation {
        valid,
        tables,
        issues,
        suggestions,
        suggested_query,
    }
}

/// Replace `FROM <from>` / `JOIN <from>` with the same keyword followed by `to`.
fn replace_reference(sql: &str, from: &str, to: &str) -> String {
    let pattern = format!(
        r#"(?i)\b((?:FROM|JOIN)\s+){}([^A-Za-z0-9_$."]|$)"#,
        regex::escape(from)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return sql.to_string();
    };
    re.replace_all(sql, |caps: &regex::Captures<'_>| {
        format!("{}{to}{}", &caps[1], &caps[2])
    })
    .into_owned()
}

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Whitespace-normalized SQL, for comparing queries in diagnostics.
pub fn normalize_sql(sql: &str) -> String {
    WHITESPACE.replace_all(sql.trim(), " ").into_owned()
}
