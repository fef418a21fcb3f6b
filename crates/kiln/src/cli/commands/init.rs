//! Init command - write a starter configuration

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use dialoguer::Confirm;
use tracing::info;

use kiln_core::config::{
    default_config_yaml, DEFAULT_CONFIG_TEMPLATE, DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_YAML,
};

use crate::cli::output;
use crate::cli::{Cli, OutputFormat};

/// Write a starter kiln configuration
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Overwrite an existing configuration
    #[arg(short, long)]
    pub force: bool,

    /// Never prompt; fail if the configuration already exists
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Write YAML instead of TOML
    #[arg(long)]
    pub yaml: bool,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl InitCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(force = self.force, yaml = self.yaml, "executing init command");
        let cwd = std::env::current_dir()?;
        let config_path = self.target(&cwd);

        if config_path.exists() && !self.force {
            if self.yes || !cli.shows_text() {
                anyhow::bail!(
                    "Configuration file already exists at {}. Use --force to overwrite.",
                    config_path.display()
                );
            }

            let overwrite = Confirm::new()
                .with_prompt(format!(
                    "Configuration file already exists at {}. Overwrite?",
                    config_path.display()
                ))
                .default(false)
                .interact()?;

            if !overwrite {
                println!("{}", style("Aborted.").yellow());
                return Ok(());
            }
        }

        self.write(&config_path)?;

        if cli.format == OutputFormat::Json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "config": config_path.display().to_string(),
                }))?
            );
        } else if !cli.quiet {
            output::success(&format!(
                "Created {}",
                output::path_style().apply_to(config_path.display())
            ));
            println!();
            println!("  Declare your subprojects and tools, then run:");
            println!("    {}", style("kiln list").cyan());
        }

        Ok(())
    }

    fn target(&self, cwd: &Path) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None if self.yaml => cwd.join(DEFAULT_CONFIG_YAML),
            None => cwd.join(DEFAULT_CONFIG_TOML),
        }
    }

    fn write(&self, path: &Path) -> anyhow::Result<()> {
        let content = if self.yaml {
            default_config_yaml()?
        } else {
            DEFAULT_CONFIG_TEMPLATE.to_string()
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::config::load_config;
    use tempfile::TempDir;

    fn command(yaml: bool) -> InitCommand {
        InitCommand {
            force: false,
            yes: true,
            yaml,
            output: None,
        }
    }

    #[test]
    fn test_target_follows_format() {
        let cwd = Path::new("/work");
        assert_eq!(command(false).target(cwd), cwd.join("kiln.toml"));
        assert_eq!(command(true).target(cwd), cwd.join("kiln.yaml"));
    }

    #[test]
    fn test_written_configs_load() {
        let temp = TempDir::new().unwrap();
        for yaml in [false, true] {
            let cmd = command(yaml);
            let path = cmd.target(temp.path());
            cmd.write(&path).unwrap();

            let config = load_config(&path).unwrap();
            assert_eq!(config.subprojects[0].name, "app");
            assert_eq!(config.tools.unit_test.as_deref(), Some("pytest {test_file}"));
        }
    }
}
