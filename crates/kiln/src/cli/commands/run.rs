//! Run command - execute steps and their dependencies

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use console::style;
use tracing::{info, warn};

use kiln_tasks::{
    ExecutionPlan, ProcessRunner, RunSummary, SchedulerError, SchedulerOptions, TaskEvent,
    TaskReporter, TaskReporterRegistry, TaskScheduler, TaskStatus, Verbosity,
};

use crate::cli::output::{self, plural};
use crate::cli::{Cli, OutputFormat};
use crate::steps::{build_registry, step_names};

/// Run steps and everything they depend on
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Steps to run (see `kiln list`); task labels such as `test_unit:core` also work
    #[arg(required = true)]
    pub steps: Vec<String>,

    /// Show the execution plan without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Hand the project's files to this owner once the run ends, even on failure
    #[arg(long, value_name = "UID:GID", value_parser = parse_owner)]
    pub owner: Option<String>,
}

impl RunCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(steps = ?self.steps, dry_run = self.dry_run, "executing run command");
        let ctx = cli.step_context()?;
        let root = ctx.root().to_path_buf();

        let registry = build_registry(ctx);
        let tasks = registry.resolve_all(&step_names(&self.steps))?;
        let plan = ExecutionPlan::build(&tasks).map_err(SchedulerError::Plan)?;

        if cli.shows_text() && (cli.verbose || self.dry_run) {
            println!();
            println!("{}", plan.execution_plan());
        }

        // Task lifecycle always reaches the log file; the console view is extra
        let mut reporters = TaskReporterRegistry::new();
        if cli.shows_text() {
            reporters.register(ConsoleReporter::new(cli.verbose));
        }
        let scheduler = TaskScheduler::new(
            SchedulerOptions {
                dry_run: self.dry_run,
            },
            Arc::new(reporters),
        );
        let outcome = scheduler.execute(&plan);

        let cleanup = match &self.owner {
            Some(owner) => fix_ownership(&root, owner),
            None => Ok(()),
        };

        if cli.format == OutputFormat::Json {
            let summary = match &outcome {
                Ok(summary) => Some(summary),
                Err(SchedulerError::TaskFailed { summary, .. }) => Some(summary.as_ref()),
                Err(SchedulerError::Plan(_)) => None,
            };
            if let Some(summary) = summary {
                println!("{}", serde_json::to_string_pretty(&summary_json(summary))?);
            }
        }

        match (outcome, cleanup) {
            (Err(err), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!(error = %cleanup_err, "ownership fix-up failed");
                    output::warning(&format!("Ownership fix-up failed: {:#}", cleanup_err));
                }
                Err(err.into())
            }
            (Ok(_), cleanup) => cleanup,
        }
    }
}

/// Accepts `OWNER:GROUP`, as passed to `chown`
fn parse_owner(value: &str) -> Result<String, String> {
    match value.split_once(':') {
        Some((user, group))
            if !user.is_empty()
                && !group.is_empty()
                && !group.contains(':')
                && !value.contains(char::is_whitespace) =>
        {
            Ok(value.to_string())
        }
        _ => Err(format!("expected UID:GID, got '{}'", value)),
    }
}

/// Top-level entries of the project, except `.git`, sorted
fn ownership_targets(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut targets = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_name() != ".git" {
            targets.push(entry.path());
        }
    }
    targets.sort();
    Ok(targets)
}

/// Recursively hand every project entry to `owner`
fn fix_ownership(root: &Path, owner: &str) -> anyhow::Result<()> {
    let targets = ownership_targets(root)?;
    if targets.is_empty() {
        return Ok(());
    }
    info!(owner, entries = targets.len(), "restoring file ownership");

    let mut args = vec!["-R".to_string(), owner.to_string()];
    args.extend(targets.iter().map(|p| p.display().to_string()));
    ProcessRunner::new(root, Verbosity::Silent).run_args("chown", &args)?;
    Ok(())
}

fn status_name(status: &TaskStatus) -> &'static str {
    match status {
        TaskStatus::Success => "success",
        TaskStatus::Failed(_) => "failed",
        TaskStatus::NotRun => "not_run",
    }
}

fn summary_json(summary: &RunSummary) -> serde_json::Value {
    serde_json::json!({
        "total": summary.results.len(),
        "succeeded": summary.succeeded(),
        "failed": summary.failed(),
        "not_run": summary.not_run(),
        "duration_ms": summary.duration.as_millis(),
        "tasks": summary.results.iter().map(|r| {
            let error = match &r.status {
                TaskStatus::Failed(err) => Some(err.clone()),
                _ => None,
            };
            serde_json::json!({
                "label": r.label.to_string(),
                "status": status_name(&r.status),
                "duration_ms": r.duration.as_millis(),
                "error": error,
            })
        }).collect::<Vec<_>>(),
    })
}

/// Console reporter with live progress
struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl TaskReporter for ConsoleReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::PlanComputed { labels, dry_run } => {
                println!();
                output::info(&format!(
                    "{} to run{}",
                    plural(labels.len(), "task"),
                    if *dry_run { " (dry run)" } else { "" }
                ));
                if self.verbose {
                    let order: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
                    println!("  {}", style(order.join(" → ")).dim());
                }
                println!();
            }
            TaskEvent::Started { label } => {
                println!("  {} {}", style("▸").dim(), output::label_style().apply_to(label));
            }
            TaskEvent::Completed { label, duration } => {
                println!(
                    "  {} {} {}",
                    style("✓").green(),
                    style(label).green(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim()
                );
            }
            TaskEvent::Failed {
                label,
                duration,
                error,
            } => {
                println!(
                    "  {} {} {} {}",
                    style("✗").red(),
                    style(label).red(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim(),
                    style(error).red().dim()
                );
            }
            TaskEvent::NotRun { label, reason } => {
                println!(
                    "  {} {} {}",
                    style("○").yellow(),
                    style(label).yellow(),
                    style(format!("({})", reason)).dim()
                );
            }
            TaskEvent::AllCompleted {
                total,
                succeeded,
                failed,
                not_run,
                duration,
            } => {
                println!();
                println!(
                    "  {} {}/{} succeeded, {} failed, {} not run ({:.1}s)",
                    if *failed == 0 {
                        style("✓").green().bold()
                    } else {
                        style("✗").red().bold()
                    },
                    succeeded,
                    total,
                    failed,
                    not_run,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_tasks::{TaskLabel, TaskResult};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_parse_owner() {
        assert_eq!(parse_owner("1000:1000").unwrap(), "1000:1000");
        assert_eq!(parse_owner("dev:staff").unwrap(), "dev:staff");
        assert!(parse_owner("1000").is_err());
        assert!(parse_owner(":1000").is_err());
        assert!(parse_owner("1000:").is_err());
        assert!(parse_owner("1:2:3").is_err());
        assert!(parse_owner("10 00:1").is_err());
    }

    #[test]
    fn test_ownership_targets_skip_git() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("kiln.toml"), "").unwrap();

        let targets = ownership_targets(temp.path()).unwrap();
        assert_eq!(
            targets,
            vec![temp.path().join("kiln.toml"), temp.path().join("src")]
        );
    }

    #[test]
    fn test_fix_ownership_to_current_owner() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file"), "").unwrap();
        let id = |flag: &str| {
            let out = std::process::Command::new("id").arg(flag).output().unwrap();
            String::from_utf8_lossy(&out.stdout).trim().to_string()
        };
        let owner = format!("{}:{}", id("-u"), id("-g"));

        fix_ownership(temp.path(), &owner).unwrap();
    }

    #[test]
    fn test_summary_json() {
        let summary = RunSummary {
            results: vec![
                TaskResult {
                    label: TaskLabel::global("lint"),
                    status: TaskStatus::Success,
                    duration: Duration::from_millis(1500),
                },
                TaskResult {
                    label: TaskLabel::for_subproject("test_unit", "core"),
                    status: TaskStatus::Failed("exit 1".to_string()),
                    duration: Duration::from_millis(20),
                },
                TaskResult {
                    label: TaskLabel::global("test"),
                    status: TaskStatus::NotRun,
                    duration: Duration::ZERO,
                },
            ],
            duration: Duration::from_secs(2),
        };

        let json = summary_json(&summary);
        assert_eq!(json["total"], 3);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["not_run"], 1);
        assert_eq!(json["tasks"][1]["label"], "test_unit:core");
        assert_eq!(json["tasks"][1]["error"], "exit 1");
        assert_eq!(json["tasks"][2]["status"], "not_run");
        assert!(json["tasks"][0]["error"].is_null());
    }
}
