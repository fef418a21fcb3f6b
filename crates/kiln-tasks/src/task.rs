//! Task types and definitions

use std::fmt;
use std::sync::Arc;

use kiln_core::KilnError;

use crate::cache::CacheError;
use crate::process::ProcessError;
use crate::report::ReportError;

/// Graph identity of a task: its kind plus the subproject it is bound to, if any.
///
/// Two tasks with equal labels are the same node in an execution plan, whatever
/// else they carry. Build every instance of a kind from the same shared context so
/// equal labels always mean interchangeable tasks.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskLabel {
    /// Task kind (e.g., "lint", "test_unit")
    pub kind: String,
    /// Subproject the task operates on
    pub subproject: Option<String>,
}

impl TaskLabel {
    /// Label for a task that is not bound to a subproject
    pub fn global(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            subproject: None,
        }
    }

    /// Label for a task bound to one subproject
    pub fn for_subproject(kind: impl Into<String>, subproject: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            subproject: Some(subproject.into()),
        }
    }

    /// Parse a label from "kind" or "kind:subproject" format
    pub fn parse(s: &str) -> Option<Self> {
        match s.split_once(':') {
            Some((kind, sub)) if !kind.is_empty() && !sub.is_empty() => {
                Some(Self::for_subproject(kind, sub))
            }
            Some(_) => None,
            None if !s.is_empty() => Some(Self::global(s)),
            None => None,
        }
    }
}

impl fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subproject {
            Some(sub) => write!(f, "{}:{}", self.kind, sub),
            None => f.write_str(&self.kind),
        }
    }
}

/// Shared handle to a task
pub type TaskRef = Arc<dyn Task>;

/// A named unit of work with declared dependencies.
///
/// `required_tasks` is queried repeatedly while planning and must be free of side
/// effects. It must never lead back to the task itself; the planner reports such
/// a cycle as an error instead of recursing forever.
pub trait Task: Send + Sync {
    /// Stable identity of this task
    fn label(&self) -> TaskLabel;

    /// Tasks that must run before this one, in the order they should be visited
    fn required_tasks(&self) -> Vec<TaskRef>;

    /// Perform the task's side effects
    fn run(&self) -> Result<(), TaskError>;

    /// One-line description shown in execution plans
    fn description(&self) -> Option<String> {
        None
    }
}

/// Errors raised by a task's action
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// An external command failed
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The change cache could not be read or written
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A report document could not be merged
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Configuration or layout problem
    #[error(transparent)]
    Core(#[from] KilnError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure
    #[error("{0}")]
    Failed(String),
}
