//! Error types for flow building and recipe loading.
//!
//! # Error Handling Strategy
//!
//! This crate uses two complementary error handling patterns:
//!
//! - [`FlowError`]: Programmer-facing misuse that must stop the caller, such as an
//!   unknown flow id or an identifier that cannot be quoted. Returned as
//!   `Result<T, FlowError>`.
//!
//! - [`crate::types::Issue`]: Non-fatal findings (rejected recipes, missing tables,
//!   unverifiable references). These are accumulated and returned alongside a usable
//!   result, so a flow that cannot be fully resolved still yields a runnable query.
//!
//! Data-shape problems (absent tables, unresolved locations, missing GUIDs) are not
//! errors at all: templates answer them with a discovery query, see
//! [`crate::types::BuildOutcome::Discovery`].

use std::fmt;

/// Maximum identifier length accepted by the safety layer.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Why an identifier was refused by the safety layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierProblem {
    /// The identifier was empty.
    Empty,
    /// The identifier contained a NUL byte.
    ContainsNul,
    /// The identifier exceeded [`MAX_IDENTIFIER_LEN`] characters.
    TooLong,
}

impl fmt::Display for IdentifierProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "identifier is empty"),
            Self::ContainsNul => write!(f, "identifier contains a NUL byte"),
            Self::TooLong => write!(
                f,
                "identifier exceeds {MAX_IDENTIFIER_LEN} characters"
            ),
        }
    }
}

/// Errors surfaced to callers of the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("invalid identifier {value:?}: {problem}")]
    InvalidIdentifier {
        value: String,
        problem: IdentifierProblem,
    },

    #[error("unknown flow '{0}'")]
    UnknownFlow(String),

    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("unknown wizard '{0}'")]
    UnknownWizard(String),

    #[error("recipe '{id}' is invalid: {}", .errors.join("; "))]
    RecipeValidation { id: String, errors: Vec<String> },
}

impl FlowError {
    pub(crate) fn invalid_identifier(value: &str, problem: IdentifierProblem) -> Self {
        // NUL bytes and very long values make poor error messages.
        let mut shown: String = value.chars().take(64).collect();
        shown.retain(|c| c != '\0');
        Self::InvalidIdentifier {
            value: shown,
            problem,
        }
    }
}

/// Error reported by a table discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("table discovery failed for {database}.{schema}: {message}")]
pub struct DiscoveryError {
    pub database: String,
    pub schema: String,
    pub message: String,
}

impl DiscoveryError {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_identifier_message() {
        let err = FlowError::invalid_identifier("", IdentifierProblem::Empty);
        assert_eq!(err.to_string(), "invalid identifier \"\": identifier is empty");
    }

    #[test]
    fn test_invalid_identifier_strips_nul_and_truncates() {
        let long = format!("a\0{}", "b".repeat(300));
        let err = FlowError::invalid_identifier(&long, IdentifierProblem::TooLong);
        match err {
            FlowError::InvalidIdentifier { value, problem } => {
                assert!(!value.contains('\0'));
                assert_eq!(value.chars().count(), 63);
                assert_eq!(problem, IdentifierProblem::TooLong);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_recipe_validation_joins_errors() {
        let err = FlowError::RecipeValidation {
            id: "USAGE".to_string(),
            errors: vec!["missing label".to_string(), "no entity types".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "recipe 'USAGE' is invalid: missing label; no entity types"
        );
    }

    #[test]
    fn test_discovery_error_display() {
        let err = DiscoveryError::new("DB", "PUBLIC", "timeout");
        assert_eq!(
            err.to_string(),
            "table discovery failed for DB.PUBLIC: timeout"
        );
    }
}
