//! Lineage hops through the process entity table.

use super::{header, location_fqn, show_tables_like, TemplateContext};
use crate::error::FlowError;
use crate::safety::{like_contains, LIKE_ESCAPE};
use crate::types::{BuildOutcome, DiscoveryReason};

const DEFAULT_LIMIT: u64 = 100;

/// Direction of a lineage trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upstream,
    Downstream,
}

impl Direction {
    /// Parses `direction`, defaulting to upstream for anything but "downstream".
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("downstream") => Self::Downstream,
            _ => Self::Upstream,
        }
    }

    /// (column searched for the entity, column holding the next hop).
    ///
    /// Upstream: processes that produced the entity, whose inputs are the hops.
    fn columns(self) -> (&'static str, &'static str) {
        match self {
            Self::Upstream => ("OUTPUTS", "INPUTS"),
            Self::Downstream => ("INPUTS", "OUTPUTS"),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Upstream => "Upstream",
            Self::Downstream => "Downstream",
        }
    }
}

pub(super) fn lineage(ctx: &TemplateContext<'_>) -> Result<BuildOutcome, FlowError> {
    let Some(process) = ctx.entity_table("PROCESS_ENTITY") else {
        return show_tables_like(
            ctx,
            "%PROCESS%",
            "Find Lineage Tables",
            DiscoveryReason::MissingLocation {
                what: "the lineage process table".to_string(),
            },
        );
    };
    let Some(guid) = ctx.param("guid") else {
        return show_tables_like(
            ctx,
            "%_ENTITY",
            "Find Entity Tables",
            DiscoveryReason::MissingParameter {
                name: "guid".to_string(),
            },
        );
    };

    let direction = Direction::from_param(ctx.param("direction").as_deref());
    let (matched, hops) = direction.columns();
    let limit = ctx.row_limit(DEFAULT_LIMIT);

    let sql = format!(
        "{header}\
SELECT
    p.GUID AS PROCESS_GUID,
    p.NAME AS PROCESS_NAME,
    p.{hops} AS HOP_GUIDS,
    p.{matched} AS MATCHED_GUIDS
FROM {table} p
WHERE ARRAY_TO_STRING(p.{matched}, ',') ILIKE {pattern} {escape}
LIMIT {limit};",
        header = header(&[format!(
            "{} lineage for {}",
            direction.label(),
            ctx.display_name()
        )]),
        table = location_fqn(&process)?,
        pattern = like_contains(&guid),
        escape = LIKE_ESCAPE,
    );
    Ok(BuildOutcome::resolved(sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::test_support::run;
    use crate::templates::template_ids::LINEAGE;
    use crate::types::Params;

    #[test]
    fn test_upstream_searches_outputs() {
        let params = Params::new().with("guid", "g-1").with("name", "Orders");
        let outcome = run(LINEAGE, params, &["PROCESS_ENTITY"]);
        insta::assert_snapshot!(outcome.sql(), @r"
        -- Upstream lineage for Orders
        SELECT
            p.GUID AS PROCESS_GUID,
            p.NAME AS PROCESS_NAME,
            p.INPUTS AS HOP_GUIDS,
            p.OUTPUTS AS MATCHED_GUIDS
        FROM FIELD_METADATA.PUBLIC.PROCESS_ENTITY p
        WHERE ARRAY_TO_STRING(p.OUTPUTS, ',') ILIKE '%g-1%' ESCAPE '\\'
        LIMIT 100;
        ");
    }

    #[test]
    fn test_downstream_swaps_columns() {
        let params = Params::new()
            .with("guid", "g-1")
            .with("direction", "DOWNSTREAM")
            .with("limit", 5);
        let sql = run(LINEAGE, params, &["PROCESS_ENTITY"]).into_sql();
        assert!(sql.contains("p.OUTPUTS AS HOP_GUIDS"));
        assert!(sql.contains("ARRAY_TO_STRING(p.INPUTS, ',')"));
        assert!(sql.ends_with("LIMIT 5;"));
    }

    #[test]
    fn test_missing_process_table_falls_back() {
        let outcome = run(LINEAGE, Params::new().with("guid", "g"), &["TABLE_ENTITY"]);
        match outcome {
            BuildOutcome::Discovery { sql, title, reason } => {
                assert!(sql.contains("SHOW TABLES LIKE '%PROCESS%' IN FIELD_METADATA.PUBLIC;"));
                assert_eq!(title, "Find Lineage Tables");
                assert!(matches!(reason, DiscoveryReason::MissingLocation { .. }));
            }
            other => panic!("expected discovery, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_guid_falls_back() {
        let outcome = run(LINEAGE, Params::new(), &["PROCESS_ENTITY"]);
        assert!(outcome.is_discovery());
        assert!(outcome.sql().contains("missing required parameter 'guid'"));
    }

    #[test]
    fn test_guid_cannot_escape_literal() {
        let params = Params::new().with("guid", "x' OR 1=1 --");
        let sql = run(LINEAGE, params, &["PROCESS_ENTITY"]).into_sql();
        assert!(sql.contains("ILIKE '%x'' OR 1=1 --%' ESCAPE"));
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!(Direction::from_param(Some(" downstream ")), Direction::Downstream);
        assert_eq!(Direction::from_param(Some("sideways")), Direction::Upstream);
        assert_eq!(Direction::from_param(None), Direction::Upstream);
    }
}
