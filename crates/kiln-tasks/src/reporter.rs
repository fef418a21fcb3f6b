//! Run lifecycle events and their consumers

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::task::TaskLabel;

/// Events emitted during a run
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// The execution order was computed
    PlanComputed { labels: Vec<TaskLabel>, dry_run: bool },
    Started { label: TaskLabel },
    Completed { label: TaskLabel, duration: Duration },
    Failed {
        label: TaskLabel,
        duration: Duration,
        error: String,
    },
    /// Planned but skipped, either by dry run or after an earlier failure
    NotRun { label: TaskLabel, reason: String },
    AllCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
        not_run: usize,
        duration: Duration,
    },
}

impl TaskEvent {
    /// The task this event is about, if it concerns a single task
    pub fn label(&self) -> Option<&TaskLabel> {
        match self {
            Self::Started { label }
            | Self::Completed { label, .. }
            | Self::Failed { label, .. }
            | Self::NotRun { label, .. } => Some(label),
            Self::PlanComputed { .. } | Self::AllCompleted { .. } => None,
        }
    }
}

/// Consumer of run events
pub trait TaskReporter: Send + Sync {
    fn report(&self, event: &TaskEvent);
}

/// Writes every event to the tracing subscriber.
///
/// Failures stay at info level; the error itself is returned to the caller.
#[derive(Debug, Default)]
pub struct TracingReporter;

fn millis(duration: &Duration) -> u64 {
    duration.as_millis() as u64
}

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::PlanComputed { labels, dry_run } => {
                let order = labels
                    .iter()
                    .map(TaskLabel::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                tracing::info!(tasks = labels.len(), dry_run, %order, "plan computed");
            }
            TaskEvent::Started { label } => tracing::info!(task = %label, "task started"),
            TaskEvent::Completed { label, duration } => {
                tracing::info!(task = %label, duration_ms = millis(duration), "task completed")
            }
            TaskEvent::Failed {
                label,
                duration,
                error,
            } => tracing::info!(
                task = %label,
                duration_ms = millis(duration),
                %error,
                "task failed"
            ),
            TaskEvent::NotRun { label, reason } => {
                tracing::info!(task = %label, %reason, "task not run")
            }
            TaskEvent::AllCompleted {
                total,
                succeeded,
                failed,
                not_run,
                duration,
            } => tracing::info!(
                total,
                succeeded,
                failed,
                not_run,
                duration_ms = millis(duration),
                "run finished"
            ),
        }
    }
}

/// Keeps every event in memory, for assertions in tests
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Labels of tasks that reported `Started`, in order
    pub fn started(&self) -> Vec<TaskLabel> {
        self.events()
            .iter()
            .filter(|e| matches!(e, TaskEvent::Started { .. }))
            .filter_map(|e| e.label().cloned())
            .collect()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Fans events out to several reporters, always including a [`TracingReporter`]
/// unless built with [`TaskReporterRegistry::without_tracing`]
pub struct TaskReporterRegistry {
    reporters: Vec<Arc<dyn TaskReporter>>,
}

impl TaskReporterRegistry {
    pub fn new() -> Self {
        let mut registry = Self::without_tracing();
        registry.register(TracingReporter);
        registry
    }

    pub fn without_tracing() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn register<R: TaskReporter + 'static>(&mut self, reporter: R) {
        self.register_shared(Arc::new(reporter));
    }

    /// Register a reporter the caller keeps a handle to
    pub fn register_shared(&mut self, reporter: Arc<dyn TaskReporter>) {
        self.reporters.push(reporter);
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl TaskReporter for TaskReporterRegistry {
    fn report(&self, event: &TaskEvent) {
        self.reporters.iter().for_each(|r| r.report(event));
    }
}

impl Default for TaskReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
