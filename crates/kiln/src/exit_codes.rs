//! Exit codes for the CLI

use kiln_core::KilnError;
use kiln_tasks::{RegistryError, SchedulerError};

/// Success
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error, including a failed task
pub const ERROR: i32 = 1;

/// Usage or configuration error, raised before any task runs
pub const CONFIG_ERROR: i32 = 2;

/// Exit code for an error returned by a command
pub fn for_error(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.downcast_ref::<RegistryError>().is_some() {
            return CONFIG_ERROR;
        }
        if let Some(e) = cause.downcast_ref::<KilnError>() {
            if e.is_config_error() {
                return CONFIG_ERROR;
            }
        }
        if let Some(e) = cause.downcast_ref::<SchedulerError>() {
            return match e {
                SchedulerError::Plan(_) => CONFIG_ERROR,
                SchedulerError::TaskFailed { .. } => ERROR,
            };
        }
    }
    ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::ConfigError;
    use kiln_tasks::DagError;

    #[test]
    fn test_unknown_step_is_config_error() {
        let err = anyhow::Error::new(RegistryError::UnknownStep("deploy".to_string()));
        assert_eq!(for_error(&err), CONFIG_ERROR);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let err: KilnError = ConfigError::InvalidValue {
            field: "project.name".to_string(),
            message: "project name cannot be empty".to_string(),
        }
        .into();
        let err = anyhow::Error::new(err).context("loading project");
        assert_eq!(for_error(&err), CONFIG_ERROR);
    }

    #[test]
    fn test_cycle_is_config_error() {
        let err = anyhow::Error::new(SchedulerError::Plan(DagError::CyclicDependency(
            "a -> b -> a".to_string(),
        )));
        assert_eq!(for_error(&err), CONFIG_ERROR);
    }

    #[test]
    fn test_other_errors_are_general() {
        let err = anyhow::anyhow!("something broke");
        assert_eq!(for_error(&err), ERROR);

        let io: KilnError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(for_error(&anyhow::Error::new(io)), ERROR);
    }
}
