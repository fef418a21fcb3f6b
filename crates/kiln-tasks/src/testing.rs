//! Task doubles shared by this crate's tests

use std::sync::{Arc, Mutex};

use crate::task::{Task, TaskError, TaskLabel, TaskRef};

/// Labels of tasks in the order their actions ran
pub(crate) type RunLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn run_log() -> RunLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn ran(log: &RunLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Task with fixed dependencies that records each run
pub(crate) struct StubTask {
    label: TaskLabel,
    deps: Vec<TaskRef>,
    log: RunLog,
    fail: bool,
}

impl StubTask {
    pub(crate) fn new(name: &str, deps: Vec<TaskRef>, log: &RunLog) -> TaskRef {
        Arc::new(Self {
            label: TaskLabel::global(name),
            deps,
            log: log.clone(),
            fail: false,
        })
    }

    pub(crate) fn failing(name: &str, deps: Vec<TaskRef>, log: &RunLog) -> TaskRef {
        Arc::new(Self {
            label: TaskLabel::global(name),
            deps,
            log: log.clone(),
            fail: true,
        })
    }
}

impl Task for StubTask {
    fn label(&self) -> TaskLabel {
        self.label.clone()
    }

    fn required_tasks(&self) -> Vec<TaskRef> {
        self.deps.clone()
    }

    fn run(&self) -> Result<(), TaskError> {
        self.log.lock().unwrap().push(self.label.to_string());
        if self.fail {
            return Err(TaskError::Failed(format!("{} exploded", self.label)));
        }
        Ok(())
    }
}

/// Two-node ring: `ring:0` needs `ring:1`, which needs `ring:0` again.
/// Every call builds fresh instances, so only label identity can close the loop.
pub(crate) struct RingTask(pub(crate) u8);

impl Task for RingTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::for_subproject("ring", self.0.to_string())
    }

    fn required_tasks(&self) -> Vec<TaskRef> {
        vec![Arc::new(RingTask((self.0 + 1) % 2))]
    }

    fn run(&self) -> Result<(), TaskError> {
        Ok(())
    }
}
