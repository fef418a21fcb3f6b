//! CLI definition and command handling

pub mod commands;
pub mod output;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use kiln_tasks::Verbosity;

use crate::steps::StepContext;
use commands::{
    CacheCommand, CompletionsCommand, InitCommand, ListCommand, PlanCommand, RunCommand,
};

/// kiln - incremental build-task runner
#[derive(Debug, Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a starter configuration
    Init(InitCommand),

    /// Run steps and everything they depend on
    Run(RunCommand),

    /// Show the execution order for steps without running them
    Plan(PlanCommand),

    /// List available steps
    List(ListCommand),

    /// Change cache management
    Cache(CacheCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        // Change to specified directory if provided
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Init(ref cmd) => cmd.execute(&self),
            Commands::Run(ref cmd) => cmd.execute(&self),
            Commands::Plan(ref cmd) => cmd.execute(&self),
            Commands::List(ref cmd) => cmd.execute(&self),
            Commands::Cache(ref cmd) => cmd.execute(&self),
            Commands::Completions(ref cmd) => cmd.execute(&self),
        }
    }

    /// Whether human-readable progress should be printed
    pub fn shows_text(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }

    /// How much tool output reaches the terminal. JSON output keeps stdout clean.
    pub fn tool_verbosity(&self) -> Verbosity {
        if self.shows_text() {
            Verbosity::All
        } else {
            Verbosity::Silent
        }
    }

    /// Discover the project from the working directory
    pub fn step_context(&self) -> anyhow::Result<Arc<StepContext>> {
        let cwd = std::env::current_dir()?;
        let ctx = StepContext::discover(&cwd, self.tool_verbosity())?;
        Ok(Arc::new(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["kiln", "plan", "test", "--format", "json", "-C", "/work"])
            .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.directory.as_deref(), Some(std::path::Path::new("/work")));
        assert_eq!(cli.tool_verbosity(), Verbosity::Silent);
        assert!(matches!(cli.command, Commands::Plan(_)));
    }

    #[test]
    fn test_text_output_streams_tools() {
        let cli = Cli::try_parse_from(["kiln", "list"]).unwrap();
        assert!(cli.shows_text());
        assert_eq!(cli.tool_verbosity(), Verbosity::All);

        let cli = Cli::try_parse_from(["kiln", "-q", "list"]).unwrap();
        assert_eq!(cli.tool_verbosity(), Verbosity::Silent);
    }
}
