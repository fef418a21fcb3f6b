//! Incremental test suite steps, one per subproject

use std::fs;
use std::sync::Arc;

use tracing::{info, instrument};

use kiln_core::{ReportScope, Subproject, TestSuite};
use kiln_tasks::{
    FileCache, IncrementalReport, PassOutcome, SelectedTest, SuitePass, Task, TaskError,
    TaskLabel, TaskRef,
};

use super::context::{path_value, StepContext, TemplateVars};
use super::project::{ProjectStep, ProjectTask};

fn unit_vars(ctx: &StepContext, sub: &Subproject, unit: &SelectedTest) -> TemplateVars {
    let mut vars = ctx.subproject_vars(sub);
    vars.push(("test_file", path_value(&unit.test_file)));
    vars.push((
        "src_file",
        unit.source_file.as_deref().map(path_value).unwrap_or_default(),
    ));
    vars.push(("test_dir", path_value(&sub.unit_test_dir())));
    vars
}

fn open_pass(
    ctx: &StepContext,
    sub: &Subproject,
    suite: TestSuite,
    report: Option<IncrementalReport>,
) -> Result<SuitePass, TaskError> {
    let cache = if ctx.cache_enabled() {
        FileCache::for_suite(sub, suite)?
    } else {
        FileCache::new(sub.root(), sub.cache_file(suite))
    };
    let pass = SuitePass::new(cache, report, ctx.propagating_file());
    Ok(if ctx.cache_enabled() {
        pass
    } else {
        pass.without_cache()
    })
}

/// Runs a subproject's unit tests whose source, test, or shared config changed
pub struct UnitTests {
    subproject: String,
    ctx: Arc<StepContext>,
}

impl UnitTests {
    pub fn task(ctx: &Arc<StepContext>, subproject: &str) -> TaskRef {
        Arc::new(Self {
            subproject: subproject.to_string(),
            ctx: Arc::clone(ctx),
        })
    }

    #[instrument(skip_all, fields(subproject = %self.subproject))]
    fn run_suite(&self, template: &str) -> Result<PassOutcome, TaskError> {
        let sub = self.ctx.layout().subproject(&self.subproject)?;
        let pairs = sub.unit_test_pairs()?;
        let pass = open_pass(&self.ctx, &sub, TestSuite::Unit, None)?;

        let outcome = pass.run(
            |selector| selector.select_unit_tests(&pairs),
            |unit, _| {
                self.ctx
                    .runner()
                    .run_template(template, &unit_vars(&self.ctx, &sub, unit))?;
                Ok(())
            },
        )?;

        if outcome.ran() > 0 {
            let reports_dir = sub.reports_dir();
            fs::create_dir_all(&reports_dir)?;
            let mut vars = self.ctx.subproject_vars(&sub);
            vars.push(("test_dir", path_value(&sub.unit_test_dir())));
            vars.push((
                "report",
                path_value(&sub.report_path(TestSuite::Unit, ReportScope::Complete)),
            ));
            self.ctx
                .run_tool("unit_suite", self.ctx.tools().unit_suite.as_deref(), &vars)?;
        }
        Ok(outcome)
    }
}

impl Task for UnitTests {
    fn label(&self) -> TaskLabel {
        TaskLabel::for_subproject("test_unit", &self.subproject)
    }

    fn required_tasks(&self) -> Vec<TaskRef> {
        vec![ProjectTask::task(ProjectStep::SetupDevEnv, &self.ctx)]
    }

    fn run(&self) -> Result<(), TaskError> {
        let Some(template) = self.ctx.tools().unit_test.as_deref() else {
            info!(subproject = %self.subproject, "no unit_test tool configured, nothing to do");
            return Ok(());
        };
        let outcome = self.run_suite(template)?;
        info!(subproject = %self.subproject, ran = outcome.ran(), "unit tests up to date");
        Ok(())
    }

    fn description(&self) -> Option<String> {
        Some(format!("run stale unit tests of {}", self.subproject))
    }
}

/// Runs a subproject's feature tests and aggregates their JUnit reports
pub struct FeatureTests {
    subproject: String,
    ctx: Arc<StepContext>,
}

impl FeatureTests {
    pub fn task(ctx: &Arc<StepContext>, subproject: &str) -> TaskRef {
        Arc::new(Self {
            subproject: subproject.to_string(),
            ctx: Arc::clone(ctx),
        })
    }

    #[instrument(skip_all, fields(subproject = %self.subproject))]
    fn run_suite(&self, template: &str) -> Result<PassOutcome, TaskError> {
        let sub = self.ctx.layout().subproject(&self.subproject)?;
        let tests = sub.feature_test_files()?;
        let sources = sub.source_files()?;
        fs::create_dir_all(sub.reports_dir())?;

        let report = IncrementalReport::for_suite(&sub, TestSuite::Feature);
        let pass = open_pass(&self.ctx, &sub, TestSuite::Feature, Some(report))?;

        pass.run(
            |selector| selector.select_feature_tests(&tests, &sources),
            |unit, partial| {
                let mut vars = self.ctx.subproject_vars(&sub);
                vars.push(("test_file", path_value(&unit.test_file)));
                vars.push(("test_dir", path_value(&sub.feature_test_dir())));
                vars.push(("report", partial.map(path_value).unwrap_or_default()));
                self.ctx.runner().run_template(template, &vars)?;
                Ok(())
            },
        )
    }
}

impl Task for FeatureTests {
    fn label(&self) -> TaskLabel {
        TaskLabel::for_subproject("test_feature", &self.subproject)
    }

    fn required_tasks(&self) -> Vec<TaskRef> {
        vec![
            ProjectTask::task(ProjectStep::SetupDevEnv, &self.ctx),
            UnitTests::task(&self.ctx, &self.subproject),
        ]
    }

    fn run(&self) -> Result<(), TaskError> {
        let Some(template) = self.ctx.tools().feature_test.as_deref() else {
            info!(subproject = %self.subproject, "no feature_test tool configured, nothing to do");
            return Ok(());
        };
        let outcome = self.run_suite(template)?;
        info!(
            subproject = %self.subproject,
            ran = outcome.ran(),
            finalized = outcome.finalized,
            "feature tests up to date"
        );
        Ok(())
    }

    fn description(&self) -> Option<String> {
        Some(format!("run stale feature tests of {}", self.subproject))
    }
}
