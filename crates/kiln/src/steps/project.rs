//! Steps that act on the whole project

use std::fs;
use std::sync::Arc;

use tracing::info;

use kiln_tasks::{Task, TaskError, TaskLabel, TaskRef};

use super::context::StepContext;
use super::suites::{FeatureTests, UnitTests};

/// Project-wide built-in steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStep {
    Clean,
    SetupDevEnv,
    Lint,
    TestStyle,
    Test,
    Build,
    Publish,
}

impl ProjectStep {
    pub const ALL: [ProjectStep; 7] = [
        Self::Clean,
        Self::SetupDevEnv,
        Self::Lint,
        Self::TestStyle,
        Self::Test,
        Self::Build,
        Self::Publish,
    ];

    /// Step name on the command line, also the task label
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::SetupDevEnv => "setup_dev_env",
            Self::Lint => "lint",
            Self::TestStyle => "test_style",
            Self::Test => "test",
            Self::Build => "build",
            Self::Publish => "publish",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::Clean => "remove the build directory",
            Self::SetupDevEnv => "prepare the development environment",
            Self::Lint => "apply linters and formatters",
            Self::TestStyle => "check code style",
            Self::Test => "run every test suite",
            Self::Build => "build project artifacts",
            Self::Publish => "publish built artifacts",
        }
    }
}

/// A project-wide step bound to the shared context
pub struct ProjectTask {
    step: ProjectStep,
    ctx: Arc<StepContext>,
}

impl ProjectTask {
    pub fn task(step: ProjectStep, ctx: &Arc<StepContext>) -> TaskRef {
        Arc::new(Self {
            step,
            ctx: Arc::clone(ctx),
        })
    }

    fn dependency(&self, step: ProjectStep) -> TaskRef {
        Self::task(step, &self.ctx)
    }

    fn clean(&self) -> Result<(), TaskError> {
        let build_dir = self.ctx.layout().build_dir();
        if build_dir.exists() {
            fs::remove_dir_all(&build_dir)?;
            info!(path = %build_dir.display(), "build directory removed");
        } else {
            info!(path = %build_dir.display(), "build directory already absent");
        }
        Ok(())
    }
}

impl Task for ProjectTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::global(self.step.name())
    }

    fn required_tasks(&self) -> Vec<TaskRef> {
        match self.step {
            ProjectStep::Clean | ProjectStep::SetupDevEnv => Vec::new(),
            ProjectStep::Lint | ProjectStep::TestStyle | ProjectStep::Build => {
                vec![self.dependency(ProjectStep::SetupDevEnv)]
            }
            ProjectStep::Test => {
                let mut deps = Vec::new();
                for sub in self.ctx.layout().subprojects() {
                    deps.push(UnitTests::task(&self.ctx, sub.name()));
                    deps.push(FeatureTests::task(&self.ctx, sub.name()));
                }
                deps.push(self.dependency(ProjectStep::TestStyle));
                deps
            }
            ProjectStep::Publish => vec![
                self.dependency(ProjectStep::Test),
                self.dependency(ProjectStep::Build),
            ],
        }
    }

    fn run(&self) -> Result<(), TaskError> {
        let tools = self.ctx.tools();
        let tool = match self.step {
            ProjectStep::Clean => return self.clean(),
            ProjectStep::Test => return Ok(()),
            ProjectStep::SetupDevEnv => tools.setup.as_deref(),
            ProjectStep::Lint => tools.lint.as_deref(),
            ProjectStep::TestStyle => tools.style.as_deref(),
            ProjectStep::Build => tools.build.as_deref(),
            ProjectStep::Publish => tools.publish.as_deref(),
        };
        self.ctx
            .run_tool(self.step.name(), tool, &self.ctx.project_vars())?;
        Ok(())
    }

    fn description(&self) -> Option<String> {
        Some(self.step.description().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{Config, ProjectLayout, SubprojectConfig};
    use kiln_tasks::{ExecutionPlan, Verbosity};
    use tempfile::TempDir;

    fn context(root: &std::path::Path, tools: kiln_core::ToolsConfig) -> Arc<StepContext> {
        let mut config = Config::default();
        config.subprojects = vec![SubprojectConfig::new("core"), SubprojectConfig::new("web")];
        config.tools = tools;
        Arc::new(StepContext::new(ProjectLayout::new(root, config), Verbosity::Silent))
    }

    fn labels(task: TaskRef) -> Vec<String> {
        ExecutionPlan::build(&[task])
            .unwrap()
            .labels()
            .iter()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn test_publish_plan() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), Default::default());

        assert_eq!(
            labels(ProjectTask::task(ProjectStep::Publish, &ctx)),
            vec![
                "setup_dev_env",
                "test_unit:core",
                "test_feature:core",
                "test_unit:web",
                "test_feature:web",
                "test_style",
                "test",
                "build",
                "publish",
            ]
        );
    }

    #[test]
    fn test_clean_removes_build_dir() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), Default::default());
        fs::create_dir_all(temp.path().join("build/core/reports")).unwrap();

        ProjectTask::task(ProjectStep::Clean, &ctx).run().unwrap();
        assert!(!temp.path().join("build").exists());

        // Second clean finds nothing to remove
        ProjectTask::task(ProjectStep::Clean, &ctx).run().unwrap();
    }

    #[test]
    fn test_tool_runs_at_project_root() {
        let temp = TempDir::new().unwrap();
        let tools = kiln_core::ToolsConfig {
            lint: Some("touch {project_root}/linted".to_string()),
            build: Some("exit 4".to_string()),
            ..Default::default()
        };
        let ctx = context(temp.path(), tools);

        ProjectTask::task(ProjectStep::Lint, &ctx).run().unwrap();
        assert!(temp.path().join("linted").is_file());

        let err = ProjectTask::task(ProjectStep::Build, &ctx).run().unwrap_err();
        assert!(matches!(err, TaskError::Process(ref e) if e.exit_code() == Some(4)));

        // Unconfigured tool is a no-op
        ProjectTask::task(ProjectStep::Publish, &ctx).run().unwrap();
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<&str> = ProjectStep::ALL.iter().map(|s| s.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ProjectStep::ALL.len());
    }
}
