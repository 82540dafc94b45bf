//! RecipeFlow CLI - build and exercise metadata query flows

use recipeflow_cli::cli::{Args, Command, OutputFormat, SchemaDocument};
use recipeflow_cli::input;
use recipeflow_cli::output;
use recipeflow_cli::replay::replay_wizard;

use anyhow::{Context, Result};
use clap::Parser;
use is_terminal::IsTerminal;
use recipeflow_core::{
    builtin_flows, builtin_wizards, validate_query_tables, RawResults, RecipeFile, Registry,
    RegistryBuilder, Severity, SystemConfig,
};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Missing tables, failed wizard steps, or invalid recipes.
const EXIT_FAILURE: u8 = 1;
/// Configuration or usage error (unreadable input, unknown flow id).
const EXIT_CONFIG_ERROR: u8 = 66;

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILURE),
        Err(e) => {
            eprintln!("recipeflow: error: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

/// Log to stderr. `RECIPEFLOW_LOG` takes an `EnvFilter` directive; otherwise
/// `-v` selects debug and `-vv` trace.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("RECIPEFLOW_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

/// Run one subcommand. `Ok(false)` reports findings rather than an error.
fn run(args: &Args) -> Result<bool> {
    let config = input::read_config(args.config.as_deref())?;
    let colored = args.output.is_none() && io::stdout().is_terminal();

    match &args.command {
        Command::Flows(entity_args) => {
            let registry = load_registry(&args.recipe_files, args.quiet)?;
            let entity = input::read_entity(&entity_args.entity)?;
            let tables = input::read_tables(&entity_args.tables)?;
            let ranked = registry.rank_flows(&entity, &tables, &config);
            let rendered = match args.format {
                OutputFormat::Json => output::format_json(&ranked, args.compact)?,
                OutputFormat::Text => output::format_ranked_flows(&ranked, colored),
            };
            write_output(&args.output, &rendered)?;
            Ok(true)
        }

        Command::Build {
            flow,
            entity,
            params,
        } => {
            let registry = load_registry(&args.recipe_files, args.quiet)?;
            let tables = input::read_tables(&entity.tables)?;
            let overrides = input::parse_key_values(params)?;
            let entity = input::read_entity(&entity.entity)?;
            let query = registry
                .build_flow_query(flow, &entity, &overrides, &tables, &config)
                .with_context(|| format!("Failed to build flow {flow}"))?;

            if let Some(reason) = &query.fallback_reason {
                if !args.quiet {
                    eprintln!("recipeflow: note: {} ({})", query.title, reason.describe());
                }
            }
            let rendered = match args.format {
                OutputFormat::Json => output::format_json(&query, args.compact)?,
                OutputFormat::Text => output::format_built_query(&query),
            };
            write_output(&args.output, &rendered)?;
            Ok(true)
        }

        Command::Wizard {
            wizard,
            entity,
            results,
            inputs,
        } => {
            let registry = load_registry(&args.recipe_files, args.quiet)?;
            let flow = registry.wizard_flow(wizard, &config)?;
            let tables = input::read_tables(&entity.tables)?;
            let inputs = input::parse_key_values(inputs)?;
            let entity = input::read_entity(&entity.entity)?;
            let recorded = input::read_recorded_results(results)?;

            let report = replay_wizard(&flow, &entity, &tables, &inputs, &recorded);
            let rendered = match args.format {
                OutputFormat::Json => output::format_json(&report, args.compact)?,
                OutputFormat::Text => output::format_replay(&report, colored),
            };
            write_output(&args.output, &rendered)?;
            Ok(report.succeeded())
        }

        Command::Check {
            files,
            tables,
            database,
            schema,
        } => {
            let sources = input::read_sql_input(files)?;
            let tables = input::read_tables(tables)?;
            let database = database.as_deref().unwrap_or(config.metadata_db());
            let schema = schema.as_deref().unwrap_or(config.metadata_schema());

            let reports: Vec<_> = sources
                .iter()
                .map(|source| {
                    let report = validate_query_tables(&source.content, database, schema, &tables);
                    (source.name.as_str(), report)
                })
                .collect();
            let all_valid = reports.iter().all(|(_, report)| report.valid);

            let rendered = match args.format {
                OutputFormat::Json => {
                    let keyed: BTreeMap<_, _> = reports.iter().map(|(n, r)| (*n, r)).collect();
                    output::format_json(&keyed, args.compact)?
                }
                OutputFormat::Text => reports
                    .iter()
                    .map(|(name, report)| output::format_validation(name, report, args.quiet, colored))
                    .collect::<Vec<_>>()
                    .join("\n"),
            };
            write_output(&args.output, &rendered)?;
            Ok(all_valid)
        }

        Command::Recipes { files } => {
            let mut results = BTreeMap::new();
            for path in files {
                let file = input::read_recipe_file(path)?;
                let registry = RegistryBuilder::new().add_recipe_file(file).build();
                results.insert(path.display().to_string(), registry.diagnostics().to_vec());
            }
            let passed = results
                .values()
                .all(|issues| issues.iter().all(|i| i.severity != Severity::Error));

            let rendered = match args.format {
                OutputFormat::Json => output::format_json(&results, args.compact)?,
                OutputFormat::Text => results
                    .iter()
                    .map(|(name, issues)| output::format_diagnostics(name, issues, colored))
                    .collect::<Vec<_>>()
                    .join("\n"),
            };
            write_output(&args.output, &rendered)?;
            Ok(passed)
        }

        Command::Schema { document } => {
            let schema = match document {
                SchemaDocument::Recipes => schemars::schema_for!(RecipeFile),
                SchemaDocument::Config => schemars::schema_for!(SystemConfig),
                SchemaDocument::Results => schemars::schema_for!(BTreeMap<String, RawResults>),
            };
            write_output(&args.output, &output::format_json(&schema, args.compact)?)?;
            Ok(true)
        }
    }
}

/// Built-in recipes plus any `--recipes` files. Invalid extra recipes are
/// dropped with a warning.
fn load_registry(recipe_files: &[PathBuf], quiet: bool) -> Result<Registry> {
    let mut builder = RegistryBuilder::new()
        .add_flows(builtin_flows())
        .add_wizards(builtin_wizards());
    for path in recipe_files {
        builder = builder.add_recipe_file(input::read_recipe_file(path)?);
    }
    let registry = builder.build();
    if !quiet {
        for issue in registry.diagnostics() {
            tracing::warn!(code = %issue.code, subject = ?issue.subject, "{}", issue.message);
        }
    }
    Ok(registry)
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("Failed to write output to {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                writeln!(stdout)?;
            }
            Ok(())
        }
    }
}
