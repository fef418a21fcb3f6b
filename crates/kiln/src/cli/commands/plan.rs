//! Plan command - print the execution order for steps

use clap::Args;
use tracing::info;

use kiln_tasks::{ExecutionPlan, SchedulerError};

use crate::cli::{Cli, OutputFormat};
use crate::steps::{build_registry, step_names};

/// Show the execution order for steps without running them
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Steps to plan
    #[arg(required = true)]
    pub steps: Vec<String>,
}

impl PlanCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(steps = ?self.steps, "executing plan command");
        let registry = build_registry(cli.step_context()?);
        let tasks = registry.resolve_all(&step_names(&self.steps))?;
        let plan = ExecutionPlan::build(&tasks).map_err(SchedulerError::Plan)?;

        if cli.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&plan_json(&plan))?);
        } else if !cli.quiet {
            println!("{}", plan.execution_plan());
        }
        Ok(())
    }
}

fn plan_json(plan: &ExecutionPlan) -> serde_json::Value {
    let tasks: Vec<serde_json::Value> = plan
        .tasks()
        .iter()
        .enumerate()
        .map(|(i, task)| {
            serde_json::json!({
                "position": i + 1,
                "label": task.label().to_string(),
                "description": task.description(),
                "after": task
                    .required_tasks()
                    .iter()
                    .map(|dep| dep.label().to_string())
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    serde_json::Value::Array(tasks)
}
