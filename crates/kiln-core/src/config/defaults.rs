//! Default configuration values

use super::types::Config;
use crate::error::ConfigError;

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "kiln.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "kiln.yaml";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_YAML, ".kiln.toml", ".kiln.yaml"]
}

/// The starter configuration rendered as YAML
pub fn default_config_yaml() -> Result<String, ConfigError> {
    let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE)?;
    Ok(serde_yaml::to_string(&config)?)
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# kiln configuration

[project]
name = "project"
build_dir = "build"

[[subprojects]]
name = "app"
src_dir = "src"
unit_test_dir = "test/unit_tests"
feature_test_dir = "test/feature_tests"

[cache]
enabled = true
propagating_file = "conftest.py"

[tools]
unit_test = "pytest {test_file}"
feature_test = "pytest --junitxml={report} {test_file}"
"#;
