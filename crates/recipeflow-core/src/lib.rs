//! Recipe-driven query flow engine.
//!
//! Maps metadata entities onto parameterized SQL recipes, interpolates every
//! identifier and literal through a quoting layer, drives multi-step wizards whose
//! steps feed each other through declarative extractors, and degrades to
//! discovery queries when the tables a recipe expects cannot be located.
//!
//! The engine performs no I/O. Query execution and table discovery belong to the
//! caller, see [`discovery::TableDiscovery`].

pub mod discovery;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod flows;
pub mod location;
pub mod registry;
pub mod safety;
pub mod templates;
pub mod types;
pub mod validator;
pub mod wizard;

pub use discovery::{AlternativeTable, CacheSettings, TableCatalog, TableDiscovery};
pub use entity::{build_entity_context, entity_params, map_source_type_to_entity_type};
pub use error::{DiscoveryError, FlowError, IdentifierProblem};
pub use extractors::{
    build_extractor_from_bindings, normalize_results, Extractor, ExtractorSpec, OutputBindings,
};
pub use flows::{builtin_flows, flow_ids, validate_all, validate_recipe, FlowRecipe, RecipeValidation};
pub use location::{resolve_entity_table, resolve_location};
pub use registry::{FlowReadiness, RankedFlow, RecipeFile, Registry, RegistryBuilder};
pub use safety::{
    build_safe_fqn, escape_identifier, escape_string_literal, escape_string_value,
    is_valid_identifier, sanitize_identifier,
};
pub use templates::{template_ids, TemplateContext, TemplateRegistry};
pub use types::{
    issue_codes, BuildOutcome, BuiltQuery, DiscoveryReason, EntityContext, EntityLocation,
    EntityType, Inputs, Issue, Params, QueryDefaults, QueryResults, RawResults, Severity,
    SystemConfig, TableSet,
};
pub use validator::{extract_table_refs, validate_query_tables, QueryTableValidation, TableStatus};
pub use wizard::{
    build_flow_from_recipe, builtin_wizards, wizard_ids, FlowStep, SkipCondition, StepAction,
    StepResult, WizardFlow, WizardRecipe, WizardState, WizardStatus,
};
