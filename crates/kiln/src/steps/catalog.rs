//! Command-line step names for the built-in steps

use std::sync::Arc;

use kiln_tasks::{TaskLabel, TaskRef, TaskRegistry};

use super::context::StepContext;
use super::project::{ProjectStep, ProjectTask};
use super::suites::{FeatureTests, UnitTests};

/// Register every built-in step: the project-wide steps plus
/// `test_unit_<sub>` and `test_feature_<sub>` for each subproject
pub fn build_registry(ctx: Arc<StepContext>) -> TaskRegistry<StepContext> {
    let subprojects: Vec<String> = ctx
        .layout()
        .subprojects()
        .iter()
        .map(|s| s.name().to_string())
        .collect();

    let mut registry = TaskRegistry::new(ctx);
    for step in ProjectStep::ALL {
        registry.register(step.name(), project_factory(step));
    }
    for name in subprojects {
        registry.register_per_subproject(format!("test_unit_{}", name), name.clone(), unit_tests);
        registry.register_per_subproject(format!("test_feature_{}", name), name, feature_tests);
    }
    registry
}

/// Accept task labels (`test_unit:core`) wherever a step name is expected
pub fn step_names<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            match TaskLabel::parse(arg) {
                Some(TaskLabel {
                    kind,
                    subproject: Some(sub),
                }) => format!("{}_{}", kind, sub),
                _ => arg.to_string(),
            }
        })
        .collect()
}

fn project_factory(step: ProjectStep) -> fn(&Arc<StepContext>) -> TaskRef {
    match step {
        ProjectStep::Clean => |ctx| ProjectTask::task(ProjectStep::Clean, ctx),
        ProjectStep::SetupDevEnv => |ctx| ProjectTask::task(ProjectStep::SetupDevEnv, ctx),
        ProjectStep::Lint => |ctx| ProjectTask::task(ProjectStep::Lint, ctx),
        ProjectStep::TestStyle => |ctx| ProjectTask::task(ProjectStep::TestStyle, ctx),
        ProjectStep::Test => |ctx| ProjectTask::task(ProjectStep::Test, ctx),
        ProjectStep::Build => |ctx| ProjectTask::task(ProjectStep::Build, ctx),
        ProjectStep::Publish => |ctx| ProjectTask::task(ProjectStep::Publish, ctx),
    }
}

fn unit_tests(ctx: &Arc<StepContext>, subproject: &str) -> TaskRef {
    UnitTests::task(ctx, subproject)
}

fn feature_tests(ctx: &Arc<StepContext>, subproject: &str) -> TaskRef {
    FeatureTests::task(ctx, subproject)
}
