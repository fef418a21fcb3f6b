//! Error types for kiln

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using KilnError
pub type Result<T> = std::result::Result<T, KilnError>;

/// Main error type for kiln core operations
#[derive(Debug, Error)]
pub enum KilnError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Project layout errors
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors resolving the on-disk project layout
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Subproject not declared in the configuration
    #[error("Unknown subproject: {0}")]
    UnknownSubproject(String),

    /// A source file has no matching unit test file
    #[error("Expected unit test {test} for source file {source_file} to exist")]
    MissingUnitTest { source_file: PathBuf, test: PathBuf },

    /// A path escaped the directory it was expected to live in
    #[error("{path} is not inside {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// IO error while walking the tree
    #[error("IO error scanning {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl KilnError {
    /// Whether this error stems from user configuration rather than a runtime failure
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Layout(LayoutError::UnknownSubproject(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err: KilnError = ConfigError::InvalidValue {
            field: "subprojects[0].name".to_string(),
            message: "cannot be empty".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: subprojects[0].name - cannot be empty"
        );
        assert!(err.is_config_error());
    }

    #[test]
    fn test_io_error_is_not_config_error() {
        let err: KilnError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert!(!err.is_config_error());
    }
}
