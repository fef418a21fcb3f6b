//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for kiln
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project-wide settings
    pub project: ProjectConfig,

    /// Subprojects that carry their own sources, tests and caches
    pub subprojects: Vec<SubprojectConfig>,

    /// Change cache settings
    pub cache: CacheConfig,

    /// External tool command templates
    pub tools: ToolsConfig,
}

impl Config {
    /// Look up a subproject by name
    pub fn subproject(&self, name: &str) -> Option<&SubprojectConfig> {
        self.subprojects.iter().find(|s| s.name == name)
    }
}

/// Project-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name, used in report file names
    pub name: String,

    /// Build output directory, relative to the project root
    pub build_dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "project".to_string(),
            build_dir: PathBuf::from("build"),
        }
    }
}

/// A subproject with its own source tree and test suites
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubprojectConfig {
    /// Subproject name (also the cache group name)
    pub name: String,

    /// Subproject root relative to the project root (defaults to the name)
    pub path: Option<PathBuf>,

    /// Source directory relative to the subproject root
    pub src_dir: PathBuf,

    /// Unit test directory relative to the subproject root
    pub unit_test_dir: PathBuf,

    /// Feature test directory relative to the subproject root
    pub feature_test_dir: PathBuf,

    /// Extension of source and test files, without the dot
    pub source_extension: String,

    /// Prefix that turns a source file stem into its unit test file stem
    pub test_prefix: String,

    /// Regex matched against feature test file names
    pub feature_test_pattern: String,
}

impl Default for SubprojectConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: None,
            src_dir: PathBuf::from("src"),
            unit_test_dir: PathBuf::from("test/unit_tests"),
            feature_test_dir: PathBuf::from("test/feature_tests"),
            source_extension: "py".to_string(),
            test_prefix: "test_".to_string(),
            feature_test_pattern: r"^test_.+_.+\.py$".to_string(),
        }
    }
}

impl SubprojectConfig {
    /// Create a subproject config with default layout
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Subproject root relative to the project root
    pub fn relative_root(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.name))
    }
}

/// Change cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether incremental test selection is enabled
    pub enabled: bool,

    /// Name of the shared configuration file whose changes invalidate every test
    /// beneath its directory
    pub propagating_file: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            propagating_file: "conftest.py".to_string(),
        }
    }
}

/// Command templates for external tools
///
/// Templates run through `sh -c` after placeholder substitution. A tool left unset
/// turns its step into a no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Builds the development environment
    pub setup: Option<String>,

    /// Applies linters and formatters
    pub lint: Option<String>,

    /// Checks style without modifying files
    pub style: Option<String>,

    /// Runs one unit test file (`{test_file}`, `{src_file}`)
    pub unit_test: Option<String>,

    /// Runs a subproject's whole unit suite once any unit test was re-run
    pub unit_suite: Option<String>,

    /// Runs one feature test file and writes JUnit XML to `{report}`
    pub feature_test: Option<String>,

    /// Builds the project artifacts
    pub build: Option<String>,

    /// Publishes the built artifacts
    pub publish: Option<String>,
}
