//! RecipeFlow CLI library.
//!
//! This module exposes internal types for testing purposes.
//! The main entry point is the `recipeflow` binary.

pub mod cli;
pub mod input;
pub mod output;
pub mod replay;

pub use cli::Args;
