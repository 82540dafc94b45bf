//! Human-readable output formatting with optional colors.

use owo_colors::OwoColorize;
use recipeflow_core::{
    BuiltQuery, FlowReadiness, Issue, QueryTableValidation, RankedFlow, Severity, TableStatus,
};
use std::fmt::{self, Write};

use crate::replay::{ReplayReport, ReplayStatus};

fn write_title(out: &mut String, title: &str, colored: bool) -> fmt::Result {
    let line = "═".repeat(50);
    if colored {
        writeln!(out, "{}", title.bold())?;
        writeln!(out, "{}", line.dimmed())
    } else {
        writeln!(out, "{title}")?;
        writeln!(out, "{line}")
    }
}

fn severity_label(severity: Severity, colored: bool) -> String {
    let label = match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
    };
    if !colored {
        return label.to_string();
    }
    match severity {
        Severity::Error => label.red().bold().to_string(),
        Severity::Warning => label.yellow().to_string(),
        Severity::Info => label.blue().to_string(),
    }
}

fn write_issue(out: &mut String, issue: &Issue, colored: bool) -> fmt::Result {
    write!(
        out,
        "  {} [{}] {}",
        severity_label(issue.severity, colored),
        issue.code,
        issue.message
    )?;
    match &issue.subject {
        Some(subject) => writeln!(out, " ({subject})"),
        None => writeln!(out),
    }
}

fn readiness_label(readiness: FlowReadiness, colored: bool) -> String {
    let label = match readiness {
        FlowReadiness::Ready => "ready",
        FlowReadiness::Fallback => "fallback",
        FlowReadiness::Blocked => "blocked",
    };
    if !colored {
        return format!("{label:<8}");
    }
    match readiness {
        FlowReadiness::Ready => format!("{:<8}", label.green()),
        FlowReadiness::Fallback => format!("{:<8}", label.yellow()),
        FlowReadiness::Blocked => format!("{:<8}", label.red()),
    }
}

/// Flows for an entity, best first.
pub fn format_ranked_flows(flows: &[RankedFlow], colored: bool) -> String {
    let mut out = String::new();
    let _ = write_ranked_flows(&mut out, flows, colored);
    out
}

fn write_ranked_flows(out: &mut String, flows: &[RankedFlow], colored: bool) -> fmt::Result {
    write_title(out, "Available Flows", colored)?;
    if flows.is_empty() {
        return writeln!(out, "No flows apply to this entity.");
    }
    let width = flows.iter().map(|f| f.flow_id.len()).max().unwrap_or(0);
    for flow in flows {
        writeln!(
            out,
            "{} {:<width$}  {}",
            readiness_label(flow.readiness, colored),
            flow.flow_id,
            flow.label
        )?;
        if let Some(error) = &flow.error {
            writeln!(out, "    {error}")?;
        }
        for table in &flow.missing_tables {
            writeln!(out, "    missing table {table}")?;
        }
        if flow.readiness == FlowReadiness::Fallback {
            if let Some(reason) = flow.query.as_ref().and_then(|q| q.fallback_reason.as_ref()) {
                writeln!(out, "    {}", reason.describe())?;
            }
        }
    }
    Ok(())
}

/// The SQL alone, so the output can be piped to a SQL client.
pub fn format_built_query(query: &BuiltQuery) -> String {
    let mut sql = query.sql.clone();
    if !sql.ends_with('\n') {
        sql.push('\n');
    }
    sql
}

/// Table checks of one SQL document.
pub fn format_validation(
    name: &str,
    report: &QueryTableValidation,
    quiet: bool,
    colored: bool,
) -> String {
    let mut out = String::new();
    let _ = write_validation(&mut out, name, report, quiet, colored);
    out
}

fn write_validation(
    out: &mut String,
    name: &str,
    report: &QueryTableValidation,
    quiet: bool,
    colored: bool,
) -> fmt::Result {
    let verdict = match (report.valid, colored) {
        (true, true) => "OK".green().to_string(),
        (true, false) => "OK".to_string(),
        (false, true) => "MISSING TABLES".red().bold().to_string(),
        (false, false) => "MISSING TABLES".to_string(),
    };
    writeln!(out, "== [{name}] {verdict}")?;

    for table in &report.tables {
        let status = match table.status {
            TableStatus::Present => "present",
            TableStatus::Missing => "missing",
            TableStatus::Unverified => "unverified",
        };
        writeln!(out, "  {status:<10} {}", table.fully_qualified)?;
        for alternative in &table.alternatives {
            writeln!(
                out,
                "             did you mean {}? ({:.2})",
                alternative.fully_qualified, alternative.score
            )?;
        }
    }

    for issue in &report.issues {
        if quiet && issue.severity == Severity::Info {
            continue;
        }
        write_issue(out, issue, colored)?;
    }

    if let Some(suggested) = &report.suggested_query {
        writeln!(out, "  suggested query:")?;
        for line in suggested.lines() {
            writeln!(out, "    {line}")?;
        }
    }
    Ok(())
}

/// Step-by-step log of a wizard replay.
pub fn format_replay(report: &ReplayReport, colored: bool) -> String {
    let mut out = String::new();
    let _ = write_replay(&mut out, report, colored);
    out
}

fn write_replay(out: &mut String, report: &ReplayReport, colored: bool) -> fmt::Result {
    write_title(out, &format!("Wizard {}", report.wizard), colored)?;
    for (i, step) in report.steps.iter().enumerate() {
        let status = match step.status {
            ReplayStatus::Ran => "ran",
            ReplayStatus::Skipped => "skipped",
            ReplayStatus::Failed => "failed",
            ReplayStatus::AwaitingInput => "awaiting input",
        };
        let status = if colored {
            match step.status {
                ReplayStatus::Ran => status.green().to_string(),
                ReplayStatus::Skipped => status.dimmed().to_string(),
                _ => status.red().to_string(),
            }
        } else {
            status.to_string()
        };
        let title = step.title.as_deref().unwrap_or(&step.step_id);
        writeln!(out, "{}. {title} [{status}]", i + 1)?;
        if step.discovery {
            writeln!(out, "   (discovery query)")?;
        }
        if let Some(message) = &step.message {
            writeln!(out, "   {message}")?;
        }
        if let Some(sql) = &step.sql {
            for line in sql.lines() {
                writeln!(out, "   | {line}")?;
            }
        }
        for (key, value) in &step.extracted {
            writeln!(out, "   {key} = {value}")?;
        }
    }
    let summary = if report.succeeded() {
        "Wizard complete."
    } else {
        "Wizard stopped before completion."
    };
    writeln!(out)?;
    writeln!(out, "{summary}")
}

/// Diagnostics of one recipe file.
pub fn format_diagnostics(name: &str, issues: &[Issue], colored: bool) -> String {
    let mut out = String::new();
    let _ = write_diagnostics(&mut out, name, issues, colored);
    out
}

fn write_diagnostics(out: &mut String, name: &str, issues: &[Issue], colored: bool) -> fmt::Result {
    let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
    let verdict = match (errors, colored) {
        (0, true) => "PASS".green().to_string(),
        (0, false) => "PASS".to_string(),
        (_, true) => "FAIL".red().bold().to_string(),
        (_, false) => "FAIL".to_string(),
    };
    writeln!(out, "== [{name}] {verdict}")?;
    for issue in issues {
        write_issue(out, issue, colored)?;
    }
    Ok(())
}
