//! Kiln Tasks - Task orchestration engine
//!
//! This crate provides deterministic sequential task execution, per-file change
//! caching, stale test selection, and incremental JUnit report aggregation.

pub mod cache;
pub mod dag;
pub mod incremental;
pub mod process;
pub mod registry;
pub mod report;
pub mod reporter;
pub mod scheduler;
pub mod task;
pub mod test_selection;

#[cfg(test)]
mod testing;

pub use cache::{ancestor_config_paths, most_recent_update, CacheEntry, CacheError, CacheStats, FileCache};
pub use dag::{compute_execution_order, DagError, ExecutionPlan};
pub use incremental::{PassOutcome, SuitePass};
pub use process::{render_template, ProcessError, ProcessRunner, Verbosity};
pub use registry::{RegistryError, StepFactory, TaskRegistry};
pub use report::{IncrementalReport, JUnitReport, ReportError, ReportState};
pub use reporter::{CollectingReporter, TaskEvent, TaskReporter, TaskReporterRegistry, TracingReporter};
pub use scheduler::{RunSummary, SchedulerError, SchedulerOptions, TaskResult, TaskScheduler, TaskStatus};
pub use task::{Task, TaskError, TaskLabel, TaskRef};
pub use test_selection::{SelectedTest, SelectionReason, TestSelector};
