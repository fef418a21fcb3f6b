//! Task scheduler: sequential executor over an execution plan

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use crate::dag::{DagError, ExecutionPlan};
use crate::reporter::{TaskEvent, TaskReporter};
use crate::task::{TaskError, TaskLabel, TaskRef};

/// Result of a single task execution
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Task that was executed
    pub label: TaskLabel,
    /// Outcome
    pub status: TaskStatus,
    /// How long the task took
    pub duration: Duration,
}

/// Task execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task completed successfully
    Success,
    /// Task failed
    Failed(String),
    /// Task was planned but not executed (dry run or an earlier failure)
    NotRun,
}

impl TaskStatus {
    /// Check if this status represents success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Outcome of a whole run, in execution order
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub results: Vec<TaskResult>,
    pub duration: Duration,
}

impl RunSummary {
    /// Labels whose actions ran, successfully or not
    pub fn executed(&self) -> Vec<TaskLabel> {
        self.results
            .iter()
            .filter(|r| r.status != TaskStatus::NotRun)
            .map(|r| r.label.clone())
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, TaskStatus::Failed(_)))
            .count()
    }

    pub fn not_run(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == TaskStatus::NotRun)
            .count()
    }
}

/// Options for the task scheduler
#[derive(Debug, Clone, Default)]
pub struct SchedulerOptions {
    /// Plan and report only, without running any action
    pub dry_run: bool,
}

/// Task scheduler: runs a plan one task at a time, stopping at the first failure
pub struct TaskScheduler {
    options: SchedulerOptions,
    reporter: Arc<dyn TaskReporter>,
}

impl TaskScheduler {
    /// Create a new scheduler
    pub fn new(options: SchedulerOptions, reporter: Arc<dyn TaskReporter>) -> Self {
        Self { options, reporter }
    }

    /// Compute the plan for the requested tasks and execute it
    pub fn run(&self, requested: &[TaskRef]) -> Result<RunSummary, SchedulerError> {
        let plan = ExecutionPlan::build(requested)?;
        self.execute(&plan)
    }

    /// Execute every task in the plan, in order
    #[instrument(skip_all, fields(tasks = plan.len(), dry_run = self.options.dry_run))]
    pub fn execute(&self, plan: &ExecutionPlan) -> Result<RunSummary, SchedulerError> {
        let start = Instant::now();
        self.reporter.report(&TaskEvent::PlanComputed {
            labels: plan.labels(),
            dry_run: self.options.dry_run,
        });

        let mut summary = RunSummary::default();
        let mut failure: Option<(TaskLabel, TaskError)> = None;

        for task in plan.tasks() {
            let label = task.label();

            if self.options.dry_run || failure.is_some() {
                let reason = if failure.is_some() {
                    "an earlier task failed"
                } else {
                    "dry run"
                };
                self.reporter.report(&TaskEvent::NotRun {
                    label: label.clone(),
                    reason: reason.to_string(),
                });
                summary.results.push(TaskResult {
                    label,
                    status: TaskStatus::NotRun,
                    duration: Duration::ZERO,
                });
                continue;
            }

            self.reporter.report(&TaskEvent::Started {
                label: label.clone(),
            });
            let task_start = Instant::now();
            let outcome = task.run();
            let duration = task_start.elapsed();

            match outcome {
                Ok(()) => {
                    self.reporter.report(&TaskEvent::Completed {
                        label: label.clone(),
                        duration,
                    });
                    summary.results.push(TaskResult {
                        label,
                        status: TaskStatus::Success,
                        duration,
                    });
                }
                Err(e) => {
                    self.reporter.report(&TaskEvent::Failed {
                        label: label.clone(),
                        duration,
                        error: e.to_string(),
                    });
                    summary.results.push(TaskResult {
                        label: label.clone(),
                        status: TaskStatus::Failed(e.to_string()),
                        duration,
                    });
                    failure = Some((label, e));
                }
            }
        }

        summary.duration = start.elapsed();
        self.reporter.report(&TaskEvent::AllCompleted {
            total: summary.results.len(),
            succeeded: summary.succeeded(),
            failed: summary.failed(),
            not_run: summary.not_run(),
            duration: summary.duration,
        });

        match failure {
            Some((label, source)) => Err(SchedulerError::TaskFailed {
                label,
                source,
                summary: Box::new(summary),
            }),
            None => {
                info!(executed = summary.succeeded(), "run complete");
                Ok(summary)
            }
        }
    }
}

/// Errors that end a run
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The plan could not be computed
    #[error(transparent)]
    Plan(#[from] DagError),

    /// A task's action failed; later tasks were not run
    #[error("Task '{label}' failed: {source}")]
    TaskFailed {
        label: TaskLabel,
        #[source]
        source: TaskError,
        summary: Box<RunSummary>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use crate::testing::{ran, run_log, RingTask, StubTask};

    fn scheduler(dry_run: bool) -> (TaskScheduler, Arc<CollectingReporter>) {
        let reporter = Arc::new(CollectingReporter::default());
        let scheduler = TaskScheduler::new(SchedulerOptions { dry_run }, reporter.clone());
        (scheduler, reporter)
    }

    #[test]
    fn test_task_status_is_success() {
        assert!(TaskStatus::Success.is_success());
        assert!(!TaskStatus::Failed("error".to_string()).is_success());
        assert!(!TaskStatus::NotRun.is_success());
    }

    #[test]
    fn test_runs_each_planned_task_once() {
        let log = run_log();
        let setup = StubTask::new("setup", vec![], &log);
        let lint = StubTask::new("lint", vec![setup.clone()], &log);
        let style = StubTask::new("style", vec![setup], &log);
        StubTask::new("publish", vec![], &log);

        let (scheduler, _) = scheduler(false);
        let summary = scheduler.run(&[lint, style]).unwrap();

        assert_eq!(ran(&log), vec!["setup", "lint", "style"]);
        assert_eq!(summary.succeeded(), 3);
    }

    #[test]
    fn test_duplicate_labels_run_first_instance_only() {
        let first_log = run_log();
        let second_log = run_log();
        let a = StubTask::new("setup", vec![], &first_log);
        let b = StubTask::new("setup", vec![], &second_log);

        let (scheduler, _) = scheduler(false);
        scheduler.run(&[a, b]).unwrap();

        assert_eq!(ran(&first_log), vec!["setup"]);
        assert!(ran(&second_log).is_empty());
    }

    #[test]
    fn test_failure_aborts_remaining_tasks() {
        let log = run_log();
        let setup = StubTask::new("setup", vec![], &log);
        let broken = StubTask::failing("lint", vec![setup], &log);
        let build = StubTask::new("build", vec![], &log);

        let (scheduler, reporter) = scheduler(false);
        let err = scheduler.run(&[broken, build]).unwrap_err();

        assert_eq!(ran(&log), vec!["setup", "lint"]);
        match err {
            SchedulerError::TaskFailed { label, summary, .. } => {
                assert_eq!(label, TaskLabel::global("lint"));
                assert_eq!(summary.not_run(), 1);
                assert_eq!(summary.failed(), 1);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(reporter
            .events()
            .iter()
            .any(|e| matches!(e, TaskEvent::NotRun { label, .. } if label.kind == "build")));
    }

    #[test]
    fn test_dry_run_executes_nothing() {
        let log = run_log();
        let setup = StubTask::new("setup", vec![], &log);
        let lint = StubTask::new("lint", vec![setup], &log);

        let (scheduler, reporter) = scheduler(true);
        let summary = scheduler.run(&[lint]).unwrap();

        assert!(ran(&log).is_empty());
        assert_eq!(summary.not_run(), 2);
        assert!(reporter.started().is_empty());
        assert!(matches!(
            reporter.events().first(),
            Some(TaskEvent::PlanComputed { dry_run: true, .. })
        ));
    }

    #[test]
    fn test_cycle_is_a_plan_error() {
        let (scheduler, reporter) = scheduler(false);
        let ring: TaskRef = Arc::new(RingTask(1));
        let err = scheduler.run(&[ring]).unwrap_err();

        assert!(matches!(err, SchedulerError::Plan(_)));
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn test_events_follow_execution_order() {
        let log = run_log();
        let a = StubTask::new("a", vec![], &log);
        let b = StubTask::new("b", vec![a], &log);

        let (scheduler, reporter) = scheduler(false);
        scheduler.run(&[b]).unwrap();

        let started: Vec<String> = reporter.started().iter().map(|l| l.to_string()).collect();
        assert_eq!(started, vec!["a", "b"]);
        assert!(matches!(
            reporter.events().last(),
            Some(TaskEvent::AllCompleted { total: 2, succeeded: 2, .. })
        ));
    }
}
