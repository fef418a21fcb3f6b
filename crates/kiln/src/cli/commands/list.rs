//! List command - show the registered steps

use clap::Args;
use console::style;
use tracing::info;

use kiln_tasks::TaskRegistry;

use crate::cli::output;
use crate::cli::{Cli, OutputFormat};
use crate::steps::{build_registry, StepContext};

/// List available steps
#[derive(Debug, Args)]
pub struct ListCommand;

/// One registered step as shown to the user
struct StepEntry {
    name: String,
    label: String,
    subproject: Option<String>,
    description: Option<String>,
}

impl ListCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!("executing list command");
        let registry = build_registry(cli.step_context()?);
        let entries = step_entries(&registry)?;

        if cli.format == OutputFormat::Json {
            let json: Vec<serde_json::Value> = entries
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "name": e.name,
                        "label": e.label,
                        "subproject": e.subproject,
                        "description": e.description,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
            return Ok(());
        }

        if cli.quiet {
            for entry in &entries {
                println!("{}", entry.name);
            }
            return Ok(());
        }

        println!("{}", output::header("Available steps"));
        println!();
        let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
        for entry in &entries {
            println!(
                "  {:<width$}  {}",
                output::label_style().apply_to(&entry.name),
                style(entry.description.as_deref().unwrap_or("")).dim(),
                width = width
            );
        }
        Ok(())
    }
}

fn step_entries(registry: &TaskRegistry<StepContext>) -> anyhow::Result<Vec<StepEntry>> {
    let mut entries = Vec::with_capacity(registry.len());
    for (name, factory) in registry.steps() {
        let task = registry.resolve(name)?;
        entries.push(StepEntry {
            name: name.to_string(),
            label: task.label().to_string(),
            subproject: factory.subproject().map(str::to_string),
            description: task.description(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kiln_core::{Config, ProjectLayout, SubprojectConfig};
    use kiln_tasks::Verbosity;

    #[test]
    fn test_step_entries() {
        let mut config = Config::default();
        config.subprojects = vec![SubprojectConfig::new("core")];
        let ctx = StepContext::new(ProjectLayout::new("/work", config), Verbosity::Silent);
        let registry = build_registry(Arc::new(ctx));

        let entries = step_entries(&registry).unwrap();
        assert_eq!(entries.len(), 9);

        let unit = entries.iter().find(|e| e.name == "test_unit_core").unwrap();
        assert_eq!(unit.label, "test_unit:core");
        assert_eq!(unit.subproject.as_deref(), Some("core"));
        assert!(entries.iter().all(|e| e.description.is_some()));
    }
}
