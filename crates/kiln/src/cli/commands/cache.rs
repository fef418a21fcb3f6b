//! Cache management command

use clap::{Args, Subcommand};
use console::style;
use tracing::info;

use kiln_core::{ProjectLayout, Subproject, TestSuite};
use kiln_tasks::cache::remove_cache_file;
use kiln_tasks::CacheStats;

use crate::cli::output;
use crate::cli::{Cli, OutputFormat};

const SUITES: [TestSuite; 2] = [TestSuite::Unit, TestSuite::Feature];

/// Change cache management
#[derive(Debug, Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show cache statistics
    Status(CacheStatusCommand),
    /// Delete persisted caches so every test runs again
    Clean(CacheCleanCommand),
}

/// Show cache statistics
#[derive(Debug, Args)]
pub struct CacheStatusCommand;

/// Delete persisted caches
#[derive(Debug, Args)]
pub struct CacheCleanCommand {
    /// Skip confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Only clean this subproject's caches
    #[arg(long, value_name = "NAME")]
    pub subproject: Option<String>,
}

impl CacheCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.action {
            CacheAction::Status(cmd) => cmd.execute(cli),
            CacheAction::Clean(cmd) => cmd.execute(cli),
        }
    }
}

fn collect_stats(subprojects: &[Subproject]) -> anyhow::Result<Vec<CacheStats>> {
    let mut stats = Vec::new();
    for sub in subprojects {
        for suite in SUITES {
            stats.push(CacheStats::collect(sub, suite)?);
        }
    }
    Ok(stats)
}

impl CacheStatusCommand {
    fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!("executing cache status command");
        let ctx = cli.step_context()?;
        let stats = collect_stats(&ctx.layout().subprojects())?;

        if cli.format == OutputFormat::Json {
            let result = serde_json::json!({
                "enabled": ctx.cache_enabled(),
                "caches": stats.iter().map(|s| {
                    serde_json::json!({
                        "subproject": s.subproject,
                        "suite": s.suite,
                        "cache_file": s.cache_file.display().to_string(),
                        "entries": s.entries,
                        "total_size": s.total_size,
                        "total_size_formatted": s.formatted_size(),
                        "last_observed": s.last_observed.map(|t| t.to_rfc3339()),
                    })
                }).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else if !cli.quiet {
            println!("{}", output::header("Change Cache Status"));
            if !ctx.cache_enabled() {
                output::warning("Caching is disabled in the configuration");
            }
            if stats.is_empty() {
                println!();
                println!("  No subprojects configured.");
            }
            for s in &stats {
                println!();
                println!("  {} {}", style(&s.subproject).bold(), style(&s.suite).dim());
                println!(
                    "{}",
                    output::key_value(
                        "Location",
                        &output::path_style()
                            .apply_to(s.cache_file.display())
                            .to_string()
                    )
                );
                println!("{}", output::key_value("Entries", &s.entries.to_string()));
                println!(
                    "{}",
                    output::key_value("Size", &style(s.formatted_size()).yellow().to_string())
                );
                let observed = s
                    .last_observed
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!("{}", output::key_value("Last observed", &observed));
            }
        }

        Ok(())
    }
}

/// Subprojects selected for cleaning
fn clean_targets(layout: &ProjectLayout, only: Option<&str>) -> kiln_core::Result<Vec<Subproject>> {
    match only {
        Some(name) => Ok(vec![layout.subproject(name)?]),
        None => Ok(layout.subprojects()),
    }
}

/// Remove each subproject's suite caches, returning the number of files removed
fn remove_caches(subprojects: &[Subproject]) -> anyhow::Result<usize> {
    let mut removed = 0;
    for sub in subprojects {
        for suite in SUITES {
            if remove_cache_file(&sub.cache_file(suite))? {
                removed += 1;
            }
        }
    }
    Ok(removed)
}

impl CacheCleanCommand {
    fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(subproject = ?self.subproject, "executing cache clean command");
        let ctx = cli.step_context()?;
        let targets = clean_targets(ctx.layout(), self.subproject.as_deref())?;

        let existing: usize = targets
            .iter()
            .flat_map(|sub| SUITES.map(|suite| sub.cache_file(suite)))
            .filter(|path| path.exists())
            .count();
        if existing == 0 {
            if !cli.quiet {
                output::success("No cache files to remove.");
            }
            return Ok(());
        }

        if !self.yes {
            let scope = match &self.subproject {
                Some(name) => format!("subproject '{}'", name),
                None => "every subproject".to_string(),
            };
            let confirmed = dialoguer::Confirm::new()
                .with_prompt(format!(
                    "Remove {} for {}? Every test will run again.",
                    output::plural(existing, "cache file"),
                    scope
                ))
                .default(false)
                .interact()?;

            if !confirmed {
                println!("{}", style("Aborted.").yellow());
                return Ok(());
            }
        }

        let removed = remove_caches(&targets)?;

        if cli.format == OutputFormat::Json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "removed": removed }))?
            );
        } else if !cli.quiet {
            output::success(&format!("Removed {}", output::plural(removed, "cache file")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{Config, SubprojectConfig};
    use std::fs;
    use tempfile::TempDir;

    fn layout(root: &std::path::Path) -> ProjectLayout {
        let mut config = Config::default();
        config.subprojects = vec![SubprojectConfig::new("core"), SubprojectConfig::new("web")];
        ProjectLayout::new(root, config)
    }

    fn seed(sub: &Subproject, suite: TestSuite) {
        let path = sub.cache_file(suite);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            format!("group_root: {}\nentries: []\n", sub.root().display()),
        )
        .unwrap();
    }

    #[test]
    fn test_clean_one_subproject() {
        let temp = TempDir::new().unwrap();
        let layout = layout(temp.path());
        for sub in layout.subprojects() {
            seed(&sub, TestSuite::Unit);
            seed(&sub, TestSuite::Feature);
        }

        let targets = clean_targets(&layout, Some("web")).unwrap();
        assert_eq!(remove_caches(&targets).unwrap(), 2);

        let core = layout.subproject("core").unwrap();
        let web = layout.subproject("web").unwrap();
        assert!(core.cache_file(TestSuite::Unit).exists());
        assert!(!web.cache_file(TestSuite::Feature).exists());

        // Already clean
        assert_eq!(remove_caches(&targets).unwrap(), 0);
    }

    #[test]
    fn test_clean_unknown_subproject() {
        let temp = TempDir::new().unwrap();
        let err = clean_targets(&layout(temp.path()), Some("api")).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_stats_cover_both_suites() {
        let temp = TempDir::new().unwrap();
        let layout = layout(temp.path());
        let core = layout.subproject("core").unwrap();
        seed(&core, TestSuite::Feature);

        let stats = collect_stats(&layout.subprojects()).unwrap();
        assert_eq!(stats.len(), 4);
        assert_eq!(stats[0].suite, "unit_tests");
        assert_eq!(stats[0].total_size, 0);
        assert_eq!(stats[1].suite, "feature_tests");
        assert!(stats[1].total_size > 0);
        assert_eq!(stats[1].entries, 0);
    }
}
