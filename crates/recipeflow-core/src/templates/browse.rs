//! Introspection and sampling of the entity's own table.

use super::{browse_fallback, browse_statement, header, TemplateContext};
use crate::error::FlowError;
use crate::safety::{build_safe_fqn, escape_string_value, quote_identifier_part};
use crate::types::{BuildOutcome, DiscoveryReason};

const TOP_VALUES_LIMIT: u64 = 20;

fn missing(name: &str) -> DiscoveryReason {
    DiscoveryReason::MissingParameter {
        name: name.to_string(),
    }
}

pub(super) fn sample_rows(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    let Some(table) = ctx.entity_fqn()? else {
        return browse_fallback(ctx, missing("table"));
    };
    let limit = ctx.row_limit(ctx.config.query_defaults.sample_row_limit);
    Ok(BuildOutcome::resolved(format!(
        "{}SELECT * FROM {table} LIMIT {limit};",
        header(&[format!("Sample of {}", ctx.display_name())])
    )))
}

/// `DESCRIBE TABLE` when a table is known, otherwise the deepest `SHOW` that the
/// parameters allow. Always resolves.
pub(super) fn schema_browse(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    if let Some(table) = ctx.entity_fqn()? {
        return Ok(BuildOutcome::resolved(format!("DESCRIBE TABLE {table};")));
    }
    let (statement, _) = browse_statement(ctx)?;
    Ok(BuildOutcome::resolved(statement))
}

/// Tables of `database.schema` (metadata location by default), optionally filtered
/// by a caller-supplied LIKE `pattern`.
pub(super) fn show_tables(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    let database = ctx.param("database").unwrap_or_else(|| ctx.metadata_db());
    let schema = ctx.param("schema").unwrap_or_else(|| ctx.metadata_schema());
    let location = build_safe_fqn(Some(&database), Some(&schema), None)?;
    let sql = match ctx.param("pattern") {
        Some(pattern) => format!(
            "SHOW TABLES LIKE {} IN SCHEMA {location};",
            escape_string_value(&pattern)
        ),
        None => format!("SHOW TABLES IN SCHEMA {location};"),
    };
    Ok(BuildOutcome::resolved(sql))
}

pub(super) fn describe_table(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    match ctx.entity_fqn()? {
        Some(table) => Ok(BuildOutcome::resolved(format!("DESCRIBE TABLE {table};"))),
        None => browse_fallback(ctx, missing("table")),
    }
}

/// Table and column identifiers, or the fallback to take when either is missing.
fn column_target(
    ctx: &TemplateContext<'_>,
) -> Result<Result<(String, String), BuildOutcome>, FlowError> {
    let Some(table) = ctx.entity_fqn()? else {
        return browse_fallback(ctx, missing("table")).map(Err);
    };
    let Some(column) = ctx.param("column") else {
        let reason = missing("column");
        let sql = format!(
            "{}DESCRIBE TABLE {table};",
            header(&[reason.describe().as_str(), "Pick a column from the table description."])
        );
        return Ok(Err(BuildOutcome::discovery(sql, "Pick a Column", reason)));
    };
    Ok(Ok((table, quote_identifier_part(&column)?)))
}

pub(super) fn column_profile(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    let (table, column) = match column_target(ctx)? {
        Ok(target) => target,
        Err(fallback) => return Ok(fallback),
    };
    Ok(BuildOutcome::resolved(format!(
        "{header}\
SELECT
    COUNT(*) AS TOTAL_ROWS,
    COUNT({column}) AS NON_NULL_ROWS,
    COUNT(DISTINCT {column}) AS DISTINCT_VALUES,
    MIN({column}) AS MIN_VALUE,
    MAX({column}) AS MAX_VALUE
FROM {table};",
        header = header(&[format!("Profile of {table}.{column}")]),
    )))
}

pub(super) fn column_top_values(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    let (table, column) = match column_target(ctx)? {
        Ok(target) => target,
        Err(fallback) => return Ok(fallback),
    };
    let limit = ctx.row_limit(TOP_VALUES_LIMIT);
    Ok(BuildOutcome::resolved(format!(
        "{header}\
SELECT
    {column} AS VALUE,
    COUNT(*) AS OCCURRENCES
FROM {table}
GROUP BY 1
ORDER BY 2 DESC
LIMIT {limit};",
        header = header(&[format!("Most frequent values of {table}.{column}")]),
    )))
}
