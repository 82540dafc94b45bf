//! Types for the recipe flow engine API.
//!
//! This module defines the values that cross the engine boundary: entity contexts,
//! backend configuration, template parameters, built queries, and query results.

mod common;
mod config;
mod entity;
mod query;
mod results;

pub use common::{issue_codes, Issue, Severity};
pub use config::{
    EntityLocation, Features, QueryDefaults, SnowflakeConfig, SystemConfig, DEFAULT_METADATA_DB,
    DEFAULT_METADATA_SCHEMA, KNOWN_ENTITIES,
};
pub use entity::{EntityContext, EntityType, UnknownEntityType};
pub use query::{
    scalar_to_string, BuildOutcome, BuiltQuery, DiscoveryReason, Inputs, Params, TableSet,
};
pub use results::{QueryResults, RawColumn, RawResults, RawRow};
