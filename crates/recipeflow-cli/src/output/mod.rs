//! Output formatting modules.

pub mod json;
pub mod text;

pub use json::format_json;
pub use text::{
    format_built_query, format_diagnostics, format_ranked_flows, format_replay, format_validation,
};
