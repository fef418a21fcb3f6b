//! Execution plan construction from requested tasks

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::task::{TaskLabel, TaskRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Ordered, duplicate-free list of tasks to execute.
///
/// Built by a depth-first walk over each requested task in turn: a task's
/// dependencies are visited in declared order and the task is appended once all
/// of them are placed. Tasks already placed are skipped by label, so the first
/// occurrence of a label wins its position.
#[derive(Clone)]
pub struct ExecutionPlan {
    order: Vec<TaskRef>,
}

impl ExecutionPlan {
    /// Compute the execution order for the requested tasks
    #[instrument(skip_all, fields(requested = requested.len()))]
    pub fn build(requested: &[TaskRef]) -> Result<Self, DagError> {
        let mut walker = Walker::default();
        for task in requested {
            walker.visit(task)?;
        }

        info!(task_count = walker.order.len(), "execution plan built");
        Ok(Self {
            order: walker.order,
        })
    }

    /// Tasks in execution order
    pub fn tasks(&self) -> &[TaskRef] {
        &self.order
    }

    /// Labels in execution order
    pub fn labels(&self) -> Vec<TaskLabel> {
        self.order.iter().map(|t| t.label()).collect()
    }

    /// Whether a label is part of the plan
    pub fn contains(&self, label: &TaskLabel) -> bool {
        self.order.iter().any(|t| &t.label() == label)
    }

    /// Get the total number of tasks
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the plan is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Get a human-readable summary of the execution plan
    pub fn execution_plan(&self) -> String {
        let mut plan = format!("Execution plan ({} tasks):\n", self.order.len());
        for (i, task) in self.order.iter().enumerate() {
            let deps: Vec<String> = task
                .required_tasks()
                .iter()
                .map(|d| d.label().to_string())
                .collect();
            plan.push_str(&format!("  {:>2}. {}", i + 1, task.label()));
            if let Some(description) = task.description() {
                plan.push_str(&format!(" -> {}", description));
            }
            if !deps.is_empty() {
                plan.push_str(&format!(" (after: {})", deps.join(", ")));
            }
            plan.push('\n');
        }
        plan
    }
}

impl std::fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.labels()).finish()
    }
}

/// Compute the execution order for the requested tasks
pub fn compute_execution_order(requested: &[TaskRef]) -> Result<Vec<TaskRef>, DagError> {
    ExecutionPlan::build(requested).map(|plan| plan.order)
}

#[derive(Default)]
struct Walker {
    marks: HashMap<TaskLabel, Mark>,
    path: Vec<TaskLabel>,
    order: Vec<TaskRef>,
}

impl Walker {
    fn visit(&mut self, task: &TaskRef) -> Result<(), DagError> {
        let label = task.label();
        match self.marks.get(&label) {
            Some(Mark::Visited) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self.path.iter().position(|l| l == &label).unwrap_or(0);
                let mut cycle: Vec<String> =
                    self.path[start..].iter().map(|l| l.to_string()).collect();
                cycle.push(label.to_string());
                return Err(DagError::CyclicDependency(cycle.join(" -> ")));
            }
            None => {}
        }

        self.marks.insert(label.clone(), Mark::Visiting);
        self.path.push(label.clone());

        for dep in task.required_tasks() {
            self.visit(&dep)?;
        }

        self.path.pop();
        self.marks.insert(label.clone(), Mark::Visited);
        debug!(task = %label, position = self.order.len(), "task placed");
        self.order.push(Arc::clone(task));
        Ok(())
    }
}

/// Errors during plan construction
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// Cyclic dependency detected
    #[error("Cyclic dependency detected among tasks: {0}")]
    CyclicDependency(String),
}
