//! Project and subproject layout on disk

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::config::{Config, SubprojectConfig};
use crate::error::{ConfigError, LayoutError, Result};

/// File name of a subproject's persisted change cache
pub const FILE_CACHE_NAME: &str = "file_cache.yaml";

/// Test suites that produce reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestSuite {
    /// Per-source-file unit tests
    Unit,
    /// End-to-end feature tests
    Feature,
}

impl TestSuite {
    /// Name used in report file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unit => "unit_tests",
            Self::Feature => "feature_tests",
        }
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle slot of a report document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportScope {
    /// Accumulates records while an incremental run is underway
    InProgress,
    /// Every required sub-unit has been accounted for
    Complete,
    /// Written by a single sub-unit before it is folded in
    SingleUnit,
}

impl ReportScope {
    /// Name used in report file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "incomplete",
            Self::Complete => "complete",
            Self::SingleUnit => "single_file",
        }
    }
}

/// A source file paired with the unit test file that covers it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPair {
    /// Absolute path of the source file
    pub source: PathBuf,
    /// Absolute path of the unit test file
    pub test: PathBuf,
}

/// Resolved layout of the whole project
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
    config: Config,
}

impl ProjectLayout {
    /// Create a layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Project name
    pub fn name(&self) -> &str {
        &self.config.project.name
    }

    /// Top-level build output directory
    pub fn build_dir(&self) -> PathBuf {
        self.root.join(&self.config.project.build_dir)
    }

    /// All subprojects, in declaration order
    pub fn subprojects(&self) -> Vec<Subproject> {
        self.config
            .subprojects
            .iter()
            .map(|sub| self.bind(sub))
            .collect()
    }

    /// Look up one subproject by name
    pub fn subproject(&self, name: &str) -> Result<Subproject> {
        self.config
            .subproject(name)
            .map(|sub| self.bind(sub))
            .ok_or_else(|| LayoutError::UnknownSubproject(name.to_string()).into())
    }

    fn bind(&self, sub: &SubprojectConfig) -> Subproject {
        Subproject {
            project_root: self.root.clone(),
            project_name: self.config.project.name.clone(),
            build_dir: self.build_dir(),
            config: sub.clone(),
        }
    }
}

/// One subproject with paths resolved against the project root
#[derive(Debug, Clone)]
pub struct Subproject {
    project_root: PathBuf,
    project_name: String,
    build_dir: PathBuf,
    config: SubprojectConfig,
}

impl Subproject {
    /// Subproject name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Project root directory
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Subproject root directory
    pub fn root(&self) -> PathBuf {
        self.project_root.join(self.config.relative_root())
    }

    /// Source directory
    pub fn src_dir(&self) -> PathBuf {
        self.root().join(&self.config.src_dir)
    }

    /// Unit test directory
    pub fn unit_test_dir(&self) -> PathBuf {
        self.root().join(&self.config.unit_test_dir)
    }

    /// Feature test directory
    pub fn feature_test_dir(&self) -> PathBuf {
        self.root().join(&self.config.feature_test_dir)
    }

    /// Build directory for this subproject
    pub fn build_dir(&self) -> PathBuf {
        self.build_dir.join(&self.config.name)
    }

    /// Directory holding this subproject's reports
    pub fn reports_dir(&self) -> PathBuf {
        self.build_dir().join("reports")
    }

    /// Persisted change cache for one of this subproject's suites
    pub fn cache_file(&self, suite: TestSuite) -> PathBuf {
        self.build_dir().join(suite.as_str()).join(FILE_CACHE_NAME)
    }

    /// Path of a JUnit report for a suite and scope
    pub fn report_path(&self, suite: TestSuite, scope: ReportScope) -> PathBuf {
        self.reports_dir().join(format!(
            "{}_{}_{}_{}.xml",
            self.project_name,
            self.config.name,
            suite.as_str(),
            scope.as_str()
        ))
    }

    /// Every source file under the source directory, sorted
    pub fn source_files(&self) -> Result<Vec<PathBuf>> {
        let src_dir = self.src_dir();
        if !src_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&src_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| LayoutError::Walk {
                path: src_dir.clone(),
                source: e.into(),
            })?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == self.config.source_extension.as_str())
            {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }

    /// Pair each testable source file with its unit test file.
    ///
    /// `src/<rel>/<stem>.<ext>` pairs with `<unit_test_dir>/<rel>/<prefix><stem>.<ext>`.
    /// Stems starting with `_` are package plumbing and are not paired.
    pub fn unit_test_pairs(&self) -> Result<Vec<UnitPair>> {
        let src_dir = self.src_dir();
        let test_dir = self.unit_test_dir();
        let mut pairs = Vec::new();

        for source in self.source_files()? {
            let Some(stem) = source.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('_') {
                continue;
            }

            let relative = source
                .strip_prefix(&src_dir)
                .map_err(|_| LayoutError::OutsideRoot {
                    path: source.clone(),
                    root: src_dir.clone(),
                })?;
            let test_name = format!(
                "{}{}.{}",
                self.config.test_prefix, stem, self.config.source_extension
            );
            let test = match relative.parent() {
                Some(parent) => test_dir.join(parent).join(test_name),
                None => test_dir.join(test_name),
            };

            if !test.is_file() {
                return Err(LayoutError::MissingUnitTest {
                    source_file: source,
                    test,
                }
                .into());
            }
            pairs.push(UnitPair { source, test });
        }

        debug!(subproject = %self.name(), pairs = pairs.len(), "resolved unit test pairs");
        Ok(pairs)
    }

    /// Feature test files directly inside the feature test directory, sorted
    pub fn feature_test_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = Regex::new(&self.config.feature_test_pattern).map_err(|e| {
            ConfigError::InvalidValue {
                field: format!("subprojects.{}.feature_test_pattern", self.name()),
                message: e.to_string(),
            }
        })?;

        let dir = self.feature_test_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| pattern.is_match(n));
            if matches && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
