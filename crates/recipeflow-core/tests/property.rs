use proptest::prelude::*;
use recipeflow_core::{
    build_safe_fqn, escape_identifier, escape_string_literal, map_source_type_to_entity_type,
    wizard::{build_flow_from_recipe, FlowStep, StepResult, WizardRecipe, WizardState},
    Extractor, QueryResults, SystemConfig, TemplateRegistry,
};
use serde_json::{json, Map, Value};
use sqlparser::dialect::SnowflakeDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

fn tokens(sql: &str) -> Vec<Token> {
    Tokenizer::new(&SnowflakeDialect {}, sql)
        .tokenize()
        .expect("tokenizes")
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_)))
        .collect()
}

fn extractor() -> impl Strategy<Value = (Extractor, Value)> {
    let column = "[A-Za-z_]{1,8}";
    prop_oneof![
        (column, proptest::option::of(0usize..10)).prop_map(|(column, limit)| {
            (Extractor::CollectArray { column, limit }, json!([]))
        }),
        (column, proptest::option::of(column)).prop_map(|(column, pattern)| {
            (Extractor::FindFirst { column, pattern }, Value::Null)
        }),
        (prop::collection::vec(column, 0..4), proptest::option::of(0usize..10)).prop_map(
            |(columns, limit)| (Extractor::UniqueArray { columns, limit }, json!([]))
        ),
        column.prop_map(|column| (Extractor::FirstValue { column }, Value::Null)),
        Just((Extractor::RowCount, json!(0))),
        Just((Extractor::HasRows, json!(false))),
        (column, column).prop_map(|(column, pattern)| {
            (Extractor::HasValue { column, pattern }, json!(false))
        }),
        proptest::option::of(0usize..10).prop_map(|limit| (Extractor::RowsSlice { limit }, json!([]))),
        prop::collection::vec(column, 0..4)
            .prop_map(|columns| (Extractor::ObjectArray { columns }, json!([]))),
        (prop::collection::vec(column, 0..4), column).prop_map(|(columns, key)| {
            (
                Extractor::JsonArrayValues {
                    columns,
                    key,
                    limit: None,
                },
                json!([]),
            )
        }),
    ]
}

fn recipe_with_steps(n: usize) -> WizardRecipe {
    WizardRecipe {
        id: "W".to_string(),
        label: "W".to_string(),
        steps: (0..n)
            .map(|i| FlowStep::new(format!("s{i}"), "Step", "sample_rows"))
            .collect(),
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn string_literal_is_one_token_with_original_text(value in "[ -~éü中\t]{0,40}") {
        let literal = escape_string_literal(Some(value.as_str()));
        let sql = format!("SELECT * FROM t WHERE name = {literal}");
        let toks = tokens(&sql);
        prop_assert_eq!(toks.last(), Some(&Token::SingleQuotedString(value.clone())));
        prop_assert_eq!(toks.len(), 8);
    }

    #[test]
    fn identifier_is_one_quoted_word(value in "[ -~éü中]{1,40}") {
        let quoted = escape_identifier(&value).unwrap();
        let toks = tokens(&quoted);
        prop_assert_eq!(toks.len(), 1);
        match &toks[0] {
            Token::Word(word) => {
                prop_assert_eq!(word.quote_style, Some('"'));
                prop_assert_eq!(&word.value, &value);
            }
            other => prop_assert!(false, "unexpected token {:?}", other),
        }
    }

    #[test]
    fn fqn_dots_match_present_parts(
        database in proptest::option::of("[A-Za-z0-9_ \\-]{0,12}"),
        schema in proptest::option::of("[A-Za-z0-9_ \\-]{0,12}"),
        table in proptest::option::of("[A-Za-z0-9_ \\-]{0,12}"),
    ) {
        let fqn = build_safe_fqn(database.as_deref(), schema.as_deref(), table.as_deref()).unwrap();
        let present = [&database, &schema, &table]
            .iter()
            .filter(|p| p.as_deref().is_some_and(|s| !s.is_empty()))
            .count();
        prop_assert_eq!(fqn.matches('.').count(), present.saturating_sub(1));
        prop_assert!(!fqn.starts_with('.'));
        prop_assert!(!fqn.ends_with('.'));
        prop_assert!(!fqn.contains(".."));
    }

    #[test]
    fn entity_type_mapping_ignores_case(raw in any::<String>()) {
        let mapped = map_source_type_to_entity_type(&raw);
        prop_assert_eq!(mapped, map_source_type_to_entity_type(&raw.to_uppercase()));
        prop_assert_eq!(mapped, map_source_type_to_entity_type(&raw.to_lowercase()));
    }

    #[test]
    fn entity_type_mapping_is_total(raw in any::<String>()) {
        let _ = map_source_type_to_entity_type(&raw);
    }

    #[test]
    fn wizard_advance_is_monotonic(steps in 1usize..6, advances in 0usize..10) {
        let recipe = recipe_with_steps(steps);
        let templates = TemplateRegistry::builtin();
        let config = SystemConfig::default();
        let flow = build_flow_from_recipe(&recipe, &templates, &config).unwrap();
        let mut state = WizardState::new(&flow, Default::default());

        let mut previous = state.current_step_index;
        for _ in 0..advances {
            let was_complete = state.is_complete;
            state.advance(StepResult::success("s", Map::new()), &flow);
            if was_complete {
                prop_assert_eq!(state.current_step_index, previous);
            } else {
                prop_assert!(state.current_step_index > previous);
            }
            previous = state.current_step_index;
        }
        prop_assert_eq!(state.current_step_index, advances.min(steps));
        prop_assert_eq!(state.is_complete, advances >= steps);
    }

    #[test]
    fn extractors_are_safe_on_empty_results((extractor, expected) in extractor()) {
        prop_assert_eq!(extractor.extract(&QueryResults::empty()), expected);
    }

    #[test]
    fn extractors_never_panic(
        (extractor, _) in extractor(),
        rows in prop::collection::vec(prop::collection::vec("[ -~]{0,12}", 0..4), 0..6),
    ) {
        let columns = vec!["A".to_string(), "b".to_string(), "GUID".to_string()];
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Value::String).collect())
            .collect();
        let _ = extractor.extract(&QueryResults::new(columns, rows));
    }
}
