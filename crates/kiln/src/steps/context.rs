//! Shared state every built-in step is constructed from

use std::path::Path;

use tracing::{debug, info};

use kiln_core::config::{load_config_or_default, project_root_for};
use kiln_core::{Config, ProjectLayout, Subproject, ToolsConfig};
use kiln_tasks::{ProcessRunner, TaskError, Verbosity};

/// Everything a step needs to run: the project layout and a process runner
/// rooted at the project.
#[derive(Debug)]
pub struct StepContext {
    layout: ProjectLayout,
    runner: ProcessRunner,
}

/// Values substituted into tool command templates
pub type TemplateVars = Vec<(&'static str, String)>;

impl StepContext {
    pub fn new(layout: ProjectLayout, verbosity: Verbosity) -> Self {
        let runner = ProcessRunner::new(layout.root(), verbosity);
        Self { layout, runner }
    }

    /// Find the configuration at or above `dir` and bind the project it governs.
    /// Without a config file, `dir` is the project root and defaults apply.
    pub fn discover(dir: &Path, verbosity: Verbosity) -> kiln_core::Result<Self> {
        let (config, config_path) = load_config_or_default(dir)?;
        let root = config_path
            .as_deref()
            .map(project_root_for)
            .unwrap_or_else(|| dir.to_path_buf());
        info!(root = %root.display(), project = %config.project.name, "project discovered");
        Ok(Self::new(ProjectLayout::new(root, config), verbosity))
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn config(&self) -> &Config {
        self.layout.config()
    }

    pub fn tools(&self) -> &ToolsConfig {
        &self.config().tools
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Whether suites consult and persist their change caches
    pub fn cache_enabled(&self) -> bool {
        self.config().cache.enabled
    }

    pub fn propagating_file(&self) -> &str {
        &self.config().cache.propagating_file
    }

    /// Placeholders available to every tool
    pub fn project_vars(&self) -> TemplateVars {
        vec![("project_root", path_value(self.root()))]
    }

    /// Placeholders available to tools run for one subproject
    pub fn subproject_vars(&self, subproject: &Subproject) -> TemplateVars {
        let mut vars = self.project_vars();
        vars.push(("subproject", subproject.name().to_string()));
        vars.push(("subproject_root", path_value(&subproject.root())));
        vars
    }

    /// Run `tool` if it is configured, logging a skip otherwise.
    /// Returns whether anything ran.
    pub fn run_tool(
        &self,
        step: &str,
        tool: Option<&str>,
        vars: &[(&str, String)],
    ) -> Result<bool, TaskError> {
        let Some(template) = tool else {
            info!(step, "no tool configured, nothing to do");
            return Ok(false);
        };
        debug!(step, template, "running tool");
        self.runner.run_template(template, vars)?;
        Ok(true)
    }
}

pub(crate) fn path_value(path: &Path) -> String {
    path.display().to_string()
}
