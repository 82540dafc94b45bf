//! Query-history search.

use super::{browse_fallback, header, TemplateContext};
use crate::error::FlowError;
use crate::safety::{like_contains, LIKE_ESCAPE};
use crate::types::{BuildOutcome, DiscoveryReason};

const DEFAULT_LIMIT: u64 = 100;

/// Recent queries whose text mentions the entity.
///
/// The search term is `search`, else the table name, else the entity name. The
/// day window comes from `days` and is bounded by `maxLookbackDays`.
pub(super) fn usage(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    let Some(term) = ["search", "table", "name"]
        .iter()
        .find_map(|key| ctx.param(key))
    else {
        return browse_fallback(
            ctx,
            DiscoveryReason::MissingParameter {
                name: "search".to_string(),
            },
        );
    };

    let days = ctx
        .config
        .query_defaults
        .bounded_days(ctx.params.get_u64("days"));
    let limit = ctx.row_limit(DEFAULT_LIMIT);

    let sql = format!(
        "{header}\
SELECT
    QUERY_ID,
    USER_NAME,
    ROLE_NAME,
    WAREHOUSE_NAME,
    START_TIME,
    TOTAL_ELAPSED_TIME,
    QUERY_TEXT
FROM SNOWFLAKE.ACCOUNT_USAGE.QUERY_HISTORY
WHERE START_TIME >= DATEADD('day', -{days}, CURRENT_TIMESTAMP())
  AND QUERY_TEXT ILIKE {pattern} {escape}
ORDER BY START_TIME DESC
LIMIT {limit};",
        header = header(&[format!("Queries mentioning {term} in the last {days} days")]),
        pattern = like_contains(&term),
        escape = LIKE_ESCAPE,
    );
    Ok(BuildOutcome::resolved(sql))
}

#[cfg(test)]
mod tests {
    use crate::templates::template_ids::USAGE;
    use crate::templates::test_support::{run, run_with};
    use crate::types::{Params, SystemConfig};

    #[test]
    fn test_usage_query() {
        let params = Params::new().with("table", "ORDERS").with("days", 7);
        let sql = run(USAGE, params, &[]).into_sql();
        assert!(sql.starts_with("-- Queries mentioning ORDERS in the last 7 days\n"));
        assert!(sql.contains("DATEADD('day', -7, CURRENT_TIMESTAMP())"));
        assert!(sql.contains("QUERY_TEXT ILIKE '%ORDERS%' ESCAPE '\\\\'"));
        assert!(sql.ends_with("LIMIT 100;"));
    }

    #[test]
    fn test_days_are_bounded() {
        let mut config = SystemConfig::default();
        config.query_defaults.max_lookback_days = 90;
        let params = Params::new().with("search", "x").with("days", 10_000);
        let sql = run_with(USAGE, params, &[], &config).into_sql();
        assert!(sql.contains("DATEADD('day', -90,"));
    }

    #[test]
    fn test_underscores_are_literal() {
        let params = Params::new().with("search", "MY_TABLE");
        let sql = run(USAGE, params, &[]).into_sql();
        assert!(sql.contains("ILIKE '%MY\\\\_TABLE%'"));
    }

    #[test]
    fn test_no_term_browses() {
        let params = Params::new().with("database", "DB");
        let outcome = run(USAGE, params, &[]);
        assert!(outcome.is_discovery());
        assert!(outcome.sql().ends_with("SHOW SCHEMAS IN DATABASE DB;"));
    }
}
