//! Input handling: SQL files, JSON documents, and command-line key/value pairs.

use anyhow::{bail, Context, Result};
use recipeflow_core::{
    build_entity_context, EntityContext, Params, RawResults, RecipeFile, SystemConfig, TableSet,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::cli::TablesArgs;

/// A named SQL document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSource {
    pub name: String,
    pub content: String,
}

/// Read SQL input from files or stdin.
///
/// If no files are provided, reads from stdin.
pub fn read_sql_input(files: &[PathBuf]) -> Result<Vec<SqlSource>> {
    if files.is_empty() {
        return Ok(vec![SqlSource {
            name: "<stdin>".to_string(),
            content: read_stdin()?,
        }]);
    }
    files
        .iter()
        .map(|path| {
            Ok(SqlSource {
                name: path.display().to_string(),
                content: read_text(path)?,
            })
        })
        .collect()
}

fn read_stdin() -> Result<String> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read from stdin")?;
    Ok(content)
}

/// File contents, or stdin for `-`.
fn read_text(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return read_stdin();
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_text(path)?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON in {}", path.display()))
}

/// Configuration from `--config`, or the defaults.
pub fn read_config(path: Option<&Path>) -> Result<SystemConfig> {
    match path {
        Some(path) => read_json(path),
        None => Ok(SystemConfig::default()),
    }
}

/// The entity described by a metadata row.
pub fn read_entity(path: &Path) -> Result<EntityContext> {
    let row: Map<String, Value> = read_json(path)
        .with_context(|| format!("{} must hold a JSON object", path.display()))?;
    Ok(build_entity_context(&row))
}

/// Tables from `--tables` and `--tables-file`, combined.
pub fn read_tables(args: &TablesArgs) -> Result<TableSet> {
    let mut tables: TableSet = args
        .tables
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if let Some(path) = &args.tables_file {
        for name in parse_table_list(&read_text(path)?)
            .with_context(|| format!("Failed to read tables from {}", path.display()))?
        {
            tables.insert(name);
        }
    }
    Ok(tables)
}

/// A JSON array of names, or one name per line. `#` starts a comment line.
fn parse_table_list(content: &str) -> Result<Vec<String>> {
    if content.trim_start().starts_with('[') {
        let names: Vec<String> = serde_json::from_str(content)?;
        return Ok(names);
    }
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Parse `KEY=VALUE` pairs. Values that parse as JSON keep their type.
pub fn parse_key_values(pairs: &[String]) -> Result<Params> {
    let mut params = Params::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("expected KEY=VALUE, got '{pair}'");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("empty key in '{pair}'");
        }
        let value = value.trim();
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        params.insert(key, value);
    }
    Ok(params)
}

pub fn read_recipe_file(path: &Path) -> Result<RecipeFile> {
    read_json(path)
}

/// Recorded results keyed by step id.
pub fn read_recorded_results(path: &Path) -> Result<BTreeMap<String, RawResults>> {
    read_json(path)
}
