//! Configuration validation

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_project(config)?;
    validate_subprojects(config)?;
    validate_cache(config)?;
    validate_tools(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_project(config: &Config) -> Result<()> {
    if config.project.name.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "project.name".to_string(),
            message: "project name cannot be empty".to_string(),
        }
        .into());
    }

    if config.project.build_dir.as_os_str().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "project.build_dir".to_string(),
            message: "build directory cannot be empty".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_subprojects(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();

    for (i, sub) in config.subprojects.iter().enumerate() {
        if sub.name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("subprojects[{}].name", i),
                message: "subproject name cannot be empty".to_string(),
            }
            .into());
        }

        // Names become step-name suffixes and cache group directories
        if !sub
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidValue {
                field: format!("subprojects[{}].name", i),
                message: "only ASCII letters, digits, '_' and '-' are allowed".to_string(),
            }
            .into());
        }

        if !seen.insert(sub.name.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: format!("subprojects[{}].name", i),
                message: format!("duplicate subproject '{}'", sub.name),
            }
            .into());
        }

        if sub.source_extension.is_empty() || sub.source_extension.starts_with('.') {
            return Err(ConfigError::InvalidValue {
                field: format!("subprojects[{}].source_extension", i),
                message: "must be a non-empty extension without the leading dot".to_string(),
            }
            .into());
        }

        if sub.test_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("subprojects[{}].test_prefix", i),
                message: "test prefix cannot be empty".to_string(),
            }
            .into());
        }

        if let Err(e) = Regex::new(&sub.feature_test_pattern) {
            return Err(ConfigError::InvalidValue {
                field: format!("subprojects[{}].feature_test_pattern", i),
                message: e.to_string(),
            }
            .into());
        }
    }

    Ok(())
}

fn validate_cache(config: &Config) -> Result<()> {
    let name = &config.cache.propagating_file;
    if name.is_empty() || name.contains('/') {
        return Err(ConfigError::InvalidValue {
            field: "cache.propagating_file".to_string(),
            message: "must be a bare file name".to_string(),
        }
        .into());
    }
    Ok(())
}

fn validate_tools(config: &Config) -> Result<()> {
    let required = [
        ("tools.unit_test", config.tools.unit_test.as_deref(), "{test_file}"),
        ("tools.feature_test", config.tools.feature_test.as_deref(), "{test_file}"),
        ("tools.feature_test", config.tools.feature_test.as_deref(), "{report}"),
    ];

    for (field, template, placeholder) in required {
        if let Some(template) = template {
            if !template.contains(placeholder) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("must contain {} placeholder", placeholder),
                }
                .into());
            }
        }
    }

    Ok(())
}
