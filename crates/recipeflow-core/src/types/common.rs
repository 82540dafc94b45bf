//! Common types shared across the engine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A non-fatal finding (recipe diagnostic, validator finding, fallback notice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Severity level
    pub severity: Severity,

    /// Machine-readable issue code
    pub code: String,

    /// Human-readable message
    pub message: String,

    /// Optional: the recipe, step, or table the issue is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Issue {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
            subject: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            subject: None,
        }
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            code: code.into(),
            message: message.into(),
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Machine-readable issue codes.
pub mod issue_codes {
    // Recipe loading
    pub const RECIPE_MISSING_FIELD: &str = "RECIPE_MISSING_FIELD";
    pub const RECIPE_ID_MISMATCH: &str = "RECIPE_ID_MISMATCH";
    pub const RECIPE_NO_ENTITY_TYPES: &str = "RECIPE_NO_ENTITY_TYPES";
    pub const RECIPE_UNKNOWN_ENTITY_TYPE: &str = "RECIPE_UNKNOWN_ENTITY_TYPE";
    pub const RECIPE_UNKNOWN_TEMPLATE: &str = "RECIPE_UNKNOWN_TEMPLATE";
    pub const RECIPE_DUPLICATE_ID: &str = "RECIPE_DUPLICATE_ID";

    // Wizard loading
    pub const WIZARD_NO_STEPS: &str = "WIZARD_NO_STEPS";
    pub const WIZARD_UNKNOWN_TEMPLATE: &str = "WIZARD_UNKNOWN_TEMPLATE";
    pub const WIZARD_UNKNOWN_EXTRACTOR: &str = "WIZARD_UNKNOWN_EXTRACTOR";
    pub const WIZARD_INVALID_EXTRACTOR: &str = "WIZARD_INVALID_EXTRACTOR";
    pub const WIZARD_DUPLICATE_STEP: &str = "WIZARD_DUPLICATE_STEP";

    // Table validation
    pub const MISSING_TABLE: &str = "MISSING_TABLE";
    pub const UNVERIFIED_TABLE: &str = "UNVERIFIED_TABLE";
    pub const NO_TABLES_DETECTED: &str = "NO_TABLES_DETECTED";
    pub const PARSE_FALLBACK: &str = "PARSE_FALLBACK";

    // Flow building
    pub const DISCOVERY_FALLBACK: &str = "DISCOVERY_FALLBACK";
}
