//! CLI argument parsing using clap.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// RecipeFlow - recipe-driven SQL flows over metadata entities
#[derive(Parser, Debug)]
#[command(name = "recipeflow")]
#[command(about = "Build, check, and replay metadata query flows", long_about = None)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// System configuration JSON (entity locations and query defaults)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Extra recipe files to register next to the built-in recipes (can be repeated)
    #[arg(long = "recipes", value_name = "FILE", global = true)]
    pub recipe_files: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Compact JSON output (no pretty-printing)
    #[arg(short, long, global = true)]
    pub compact: bool,

    /// Suppress informational issues in text output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log more (repeat for trace); RECIPEFLOW_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank the flows that apply to an entity
    Flows(EntityArgs),

    /// Build the query of one flow
    Build {
        /// Flow id (e.g. LINEAGE_UPSTREAM, SAMPLE_ROWS)
        flow: String,

        #[command(flatten)]
        entity: EntityArgs,

        /// Parameter override in KEY=VALUE format (can be repeated)
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Replay a wizard against recorded query results
    Wizard {
        /// Wizard id (e.g. LINEAGE_WIZARD)
        wizard: String,

        #[command(flatten)]
        entity: EntityArgs,

        /// JSON object mapping step ids to recorded results
        #[arg(long, value_name = "FILE")]
        results: PathBuf,

        /// Initial wizard input in KEY=VALUE format (can be repeated)
        #[arg(short, long = "input", value_name = "KEY=VALUE")]
        inputs: Vec<String>,
    },

    /// Check the tables a SQL file reads against the discovered tables
    Check {
        /// SQL files to check (reads from stdin if none provided)
        #[arg(value_name = "FILES")]
        files: Vec<PathBuf>,

        #[command(flatten)]
        tables: TablesArgs,

        /// Database unqualified references resolve to (defaults to the metadata database)
        #[arg(long)]
        database: Option<String>,

        /// Schema unqualified references resolve to (defaults to the metadata schema)
        #[arg(long)]
        schema: Option<String>,
    },

    /// Validate recipe files without registering them
    Recipes {
        /// Recipe files (JSON with `flows` and `wizards`)
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the JSON schema of an input document
    Schema {
        #[arg(value_enum)]
        document: SchemaDocument,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct EntityArgs {
    /// Metadata row describing the entity, as a JSON file ("-" for stdin)
    #[arg(short, long, value_name = "FILE")]
    pub entity: PathBuf,

    #[command(flatten)]
    pub tables: TablesArgs,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct TablesArgs {
    /// Comma-separated tables known to exist in the metadata schema
    #[arg(short, long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// File listing tables (one per line, or a JSON array)
    #[arg(long, value_name = "FILE")]
    pub tables_file: Option<PathBuf>,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Documents with a published JSON schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SchemaDocument {
    /// Recipe file with flows and wizards
    Recipes,
    /// System configuration
    Config,
    /// Recorded query results
    Results,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let args = Args::parse_from([
            "recipeflow",
            "build",
            "LINEAGE_UPSTREAM",
            "--entity",
            "orders.json",
            "--tables",
            "PROCESS_ENTITY,TABLE_ENTITY",
            "-p",
            "direction=DOWNSTREAM",
            "-f",
            "json",
        ]);
        assert_eq!(args.format, OutputFormat::Json);
        match args.command {
            Command::Build {
                flow,
                entity,
                params,
            } => {
                assert_eq!(flow, "LINEAGE_UPSTREAM");
                assert_eq!(entity.entity, PathBuf::from("orders.json"));
                assert_eq!(entity.tables.tables, vec!["PROCESS_ENTITY", "TABLE_ENTITY"]);
                assert_eq!(params, vec!["direction=DOWNSTREAM"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["recipeflow", "check", "q.sql", "-vv", "--config", "c.json"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.config, Some(PathBuf::from("c.json")));
        assert_eq!(args.format, OutputFormat::Text);
    }

    #[test]
    fn test_recipes_requires_files() {
        assert!(Args::try_parse_from(["recipeflow", "recipes"]).is_err());
    }
}
