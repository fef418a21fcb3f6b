//! Step name to task resolution

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::task::TaskRef;

/// Builds a task from a shared context
pub enum StepFactory<C> {
    /// A step that is not bound to a subproject
    Global(fn(&Arc<C>) -> TaskRef),
    /// A step bound to one subproject
    PerSubproject {
        subproject: String,
        build: fn(&Arc<C>, &str) -> TaskRef,
    },
}

impl<C> StepFactory<C> {
    fn build(&self, context: &Arc<C>) -> TaskRef {
        match self {
            Self::Global(build) => build(context),
            Self::PerSubproject { subproject, build } => build(context, subproject),
        }
    }

    /// Subproject this step is bound to, if any
    pub fn subproject(&self) -> Option<&str> {
        match self {
            Self::Global(_) => None,
            Self::PerSubproject { subproject, .. } => Some(subproject),
        }
    }
}

/// Maps command-line step names to task factories.
///
/// Every task is built from the same `Arc<C>`, so tasks sharing a label also
/// share their configuration.
pub struct TaskRegistry<C> {
    context: Arc<C>,
    steps: BTreeMap<String, StepFactory<C>>,
}

impl<C> TaskRegistry<C> {
    pub fn new(context: Arc<C>) -> Self {
        Self {
            context,
            steps: BTreeMap::new(),
        }
    }

    /// Register a step not bound to a subproject
    pub fn register(&mut self, name: impl Into<String>, build: fn(&Arc<C>) -> TaskRef) {
        self.steps.insert(name.into(), StepFactory::Global(build));
    }

    /// Register a step bound to `subproject`
    pub fn register_per_subproject(
        &mut self,
        name: impl Into<String>,
        subproject: impl Into<String>,
        build: fn(&Arc<C>, &str) -> TaskRef,
    ) {
        self.steps.insert(
            name.into(),
            StepFactory::PerSubproject {
                subproject: subproject.into(),
                build,
            },
        );
    }

    /// Build the task registered under `name`
    pub fn resolve(&self, name: &str) -> Result<TaskRef, RegistryError> {
        let factory = self
            .steps
            .get(name)
            .ok_or_else(|| RegistryError::UnknownStep(name.to_string()))?;
        let task = factory.build(&self.context);
        debug!(step = name, task = %task.label(), "step resolved");
        Ok(task)
    }

    /// Resolve every name, failing on the first unknown one before building any
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<TaskRef>, RegistryError> {
        for name in names {
            let name: &str = name.as_ref();
            if !self.steps.contains_key(name) {
                return Err(RegistryError::UnknownStep(name.to_string()));
            }
        }
        names.iter().map(|n| self.resolve(n.as_ref())).collect()
    }

    /// Registered step names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.steps.keys().map(String::as_str).collect()
    }

    /// Registered steps, sorted by name
    pub fn steps(&self) -> impl Iterator<Item = (&str, &StepFactory<C>)> {
        self.steps.iter().map(|(name, factory)| (name.as_str(), factory))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No step with this name
    #[error("Unknown step '{0}'")]
    UnknownStep(String),
}
