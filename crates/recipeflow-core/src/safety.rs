//! Identifier and literal quoting.
//!
//! Every identifier and literal that reaches SQL text passes through this module.
//! Literals target Snowflake, where a backslash inside single quotes starts an escape
//! sequence, so both `'` and `\` are doubled.

use crate::error::{FlowError, IdentifierProblem, MAX_IDENTIFIER_LEN};

/// True iff `s` matches `[A-Za-z_][A-Za-z0-9_]*` and is at most 255 characters.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    s.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(s: &str) -> Result<(), FlowError> {
    if s.is_empty() {
        return Err(FlowError::invalid_identifier(s, IdentifierProblem::Empty));
    }
    if s.contains('\0') {
        return Err(FlowError::invalid_identifier(s, IdentifierProblem::ContainsNul));
    }
    if s.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(FlowError::invalid_identifier(s, IdentifierProblem::TooLong));
    }
    Ok(())
}

/// Double internal `"` and wrap in `"`.
pub fn escape_identifier(s: &str) -> Result<String, FlowError> {
    check_identifier(s)?;
    Ok(format!("\"{}\"", s.replace('"', "\"\"")))
}

/// Bare identifier when already valid, escaped otherwise.
pub fn quote_identifier_part(s: &str) -> Result<String, FlowError> {
    if is_valid_identifier(s) {
        Ok(s.to_string())
    } else {
        escape_identifier(s)
    }
}

/// Join the present parts of a qualified name, quoting each as needed.
///
/// Absent or empty parts are omitted entirely, so the result never carries
/// leading, trailing, or doubled dots.
pub fn build_safe_fqn(
    database: Option<&str>,
    schema: Option<&str>,
    table: Option<&str>,
) -> Result<String, FlowError> {
    let parts = [database, schema, table]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .map(quote_identifier_part)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("."))
}

/// Quote a string literal; `None` becomes the bare `NULL` token.
pub fn escape_string_literal(value: Option<&str>) -> String {
    match value {
        Some(value) => escape_string_value(value),
        None => "NULL".to_string(),
    }
}

/// Quote a string literal, doubling `'` and `\`.
pub fn escape_string_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Escape LIKE wildcards with a backslash. The result is not quoted; pair it with
/// `ESCAPE '\\'` (see [`LIKE_ESCAPE`]).
pub fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `ESCAPE` clause matching [`escape_like_pattern`].
pub const LIKE_ESCAPE: &str = "ESCAPE '\\\\'";

/// Quoted `'%value%'` pattern for a substring match.
pub fn like_contains(value: &str) -> String {
    escape_string_value(&format!("%{}%", escape_like_pattern(value)))
}

/// Make text safe inside a `--` comment: control characters become spaces.
pub fn comment_text(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best-effort identifier suggestion. Never used for executable SQL.
///
/// Uppercases, replaces characters outside `[A-Z0-9_]` with `_`, and prefixes a
/// leading digit with `_`. Returns `_` for input with nothing usable.
pub fn sanitize_identifier(value: &str) -> String {
    let mut out: String = value
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .take(MAX_IDENTIFIER_LEN)
        .collect();
    if out.is_empty() {
        return "_".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
        out.truncate(MAX_IDENTIFIER_LEN);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("ORDERS"));
        assert!(is_valid_identifier("_tmp1"));
        assert!(is_valid_identifier(&"a".repeat(255)));
        assert!(!is_valid_identifier(&"a".repeat(256)));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("my-table"));
        assert!(!is_valid_identifier("a\0"));
        assert!(!is_valid_identifier("café"));
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("my-table").unwrap(), "\"my-table\"");
        assert_eq!(escape_identifier("a\"b").unwrap(), "\"a\"\"b\"");
        assert!(matches!(
            escape_identifier(""),
            Err(FlowError::InvalidIdentifier {
                problem: IdentifierProblem::Empty,
                ..
            })
        ));
        assert!(matches!(
            escape_identifier("a\0b"),
            Err(FlowError::InvalidIdentifier {
                problem: IdentifierProblem::ContainsNul,
                ..
            })
        ));
        assert!(matches!(
            escape_identifier(&"x".repeat(256)),
            Err(FlowError::InvalidIdentifier {
                problem: IdentifierProblem::TooLong,
                ..
            })
        ));
    }

    #[test]
    fn test_build_safe_fqn_quotes_only_when_needed() {
        assert_eq!(
            build_safe_fqn(Some("my-db"), Some("my-schema"), Some("my-table")).unwrap(),
            "\"my-db\".\"my-schema\".\"my-table\""
        );
        assert_eq!(
            build_safe_fqn(Some("DB"), Some("PUBLIC"), Some("ORDERS")).unwrap(),
            "DB.PUBLIC.ORDERS"
        );
        assert_eq!(build_safe_fqn(None, Some("S"), Some("T")).unwrap(), "S.T");
        assert_eq!(build_safe_fqn(Some("D"), None, Some("T")).unwrap(), "D.T");
        assert_eq!(build_safe_fqn(Some(""), Some("S"), None).unwrap(), "S");
        assert_eq!(build_safe_fqn(None, None, None).unwrap(), "");
    }

    #[test]
    fn test_build_safe_fqn_rejects_nul() {
        assert!(build_safe_fqn(Some("DB"), Some("a\0"), Some("T")).is_err());
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(escape_string_value("O'Brien"), "'O''Brien'");
        assert_eq!(escape_string_literal(Some("x")), "'x'");
        assert_eq!(escape_string_literal(None), "NULL");
        assert_eq!(escape_string_value("a\\b"), "'a\\\\b'");
        assert_eq!(
            escape_string_value("'; DROP TABLE x; --"),
            "'''; DROP TABLE x; --'"
        );
    }

    #[test]
    fn test_like_helpers() {
        assert_eq!(escape_like_pattern("a_b%c\\"), "a\\_b\\%c\\\\");
        assert_eq!(like_contains("ORDERS"), "'%ORDERS%'");
        assert_eq!(like_contains("MY_T"), "'%MY\\\\_T%'");
        assert_eq!(LIKE_ESCAPE, "ESCAPE '\\\\'");
    }

    #[test]
    fn test_comment_text_cannot_break_out() {
        assert_eq!(comment_text("Orders\nDROP TABLE x"), "Orders DROP TABLE x");
        assert_eq!(comment_text("a\r\n\tb"), "a b");
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("my-table"), "MY_TABLE");
        assert_eq!(sanitize_identifier("1st col"), "_1ST_COL");
        assert_eq!(sanitize_identifier("   "), "_");
        assert!(is_valid_identifier(&sanitize_identifier("9; drop")));
    }
}
