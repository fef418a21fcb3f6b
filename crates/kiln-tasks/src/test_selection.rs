//! Stale test selection driven by the change cache

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use kiln_core::UnitPair;

use crate::cache::{ancestor_config_paths, most_recent_update, CacheError, FileCache};

/// Reason a test was selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionReason {
    /// The test file has no recorded observation
    NeverRun,
    /// The paired source file changed
    SourceChanged(PathBuf),
    /// The test file itself changed
    TestChanged(PathBuf),
    /// A propagating config file above the test changed
    SharedConfigChanged(PathBuf),
    /// Some source file of the subproject changed
    SubprojectSourceChanged(PathBuf),
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeverRun => write!(f, "never run"),
            Self::SourceChanged(path) => write!(f, "source {} changed", path.display()),
            Self::TestChanged(path) => write!(f, "test {} changed", path.display()),
            Self::SharedConfigChanged(path) => {
                write!(f, "shared config {} changed", path.display())
            }
            Self::SubprojectSourceChanged(path) => {
                write!(f, "subproject source {} changed", path.display())
            }
        }
    }
}

/// A test file that must run
#[derive(Debug, Clone)]
pub struct SelectedTest {
    /// Test file to run
    pub test_file: PathBuf,
    /// Source file the test covers, for unit tests
    pub source_file: Option<PathBuf>,
    /// Why this test was selected
    pub reason: SelectionReason,
}

impl SelectedTest {
    /// Files whose observations belong to this test alone
    pub fn own_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(2);
        if let Some(source) = &self.source_file {
            paths.push(source.clone());
        }
        paths.push(self.test_file.clone());
        paths
    }
}

/// Selects stale tests by querying a change cache.
///
/// Every query records new observations in the cache it is given, so callers
/// hand it a probe copy and commit observations only once the selected tests pass.
pub struct TestSelector<'a> {
    cache: &'a mut FileCache,
    propagating_file: String,
    configs: HashMap<PathBuf, bool>,
    sources_changed: Option<Option<PathBuf>>,
}

impl<'a> TestSelector<'a> {
    pub fn new(cache: &'a mut FileCache, propagating_file: impl Into<String>) -> Self {
        Self {
            cache,
            propagating_file: propagating_file.into(),
            configs: HashMap::new(),
            sources_changed: None,
        }
    }

    /// Select unit test pairs whose source, test, or ancestor config changed
    pub fn select_unit_tests(
        &mut self,
        pairs: &[UnitPair],
    ) -> Result<Vec<SelectedTest>, CacheError> {
        let mut selected = Vec::new();

        for pair in pairs {
            let never_run = self.cache.observed(&pair.test).is_none();
            let source_changed = self.cache.has_changed(&pair.source)?;
            let test_changed = self.cache.has_changed(&pair.test)?;
            let config_changed = self.config_changed(&pair.test)?;

            let reason = if never_run {
                Some(SelectionReason::NeverRun)
            } else if source_changed {
                Some(SelectionReason::SourceChanged(pair.source.clone()))
            } else if test_changed {
                Some(SelectionReason::TestChanged(pair.test.clone()))
            } else {
                config_changed.map(SelectionReason::SharedConfigChanged)
            };

            if let Some(reason) = reason {
                debug!(test = %pair.test.display(), %reason, "unit test selected");
                selected.push(SelectedTest {
                    test_file: pair.test.clone(),
                    source_file: Some(pair.source.clone()),
                    reason,
                });
            }
        }

        info!(
            considered = pairs.len(),
            selected = selected.len(),
            "unit tests selected"
        );
        Ok(selected)
    }

    /// Select feature tests whose file or ancestor config changed, or all of them
    /// when any subproject source changed
    pub fn select_feature_tests(
        &mut self,
        tests: &[PathBuf],
        sources: &[PathBuf],
    ) -> Result<Vec<SelectedTest>, CacheError> {
        let source_changed = self.subproject_source_changed(sources)?;
        let mut selected = Vec::new();

        for test in tests {
            let never_run = self.cache.observed(test).is_none();
            let test_changed = self.cache.has_changed(test)?;
            let config_changed = self.config_changed(test)?;

            let reason = if never_run {
                Some(SelectionReason::NeverRun)
            } else if test_changed {
                Some(SelectionReason::TestChanged(test.clone()))
            } else if let Some(config) = config_changed {
                Some(SelectionReason::SharedConfigChanged(config))
            } else {
                source_changed
                    .clone()
                    .map(SelectionReason::SubprojectSourceChanged)
            };

            if let Some(reason) = reason {
                debug!(test = %test.display(), %reason, "feature test selected");
                selected.push(SelectedTest {
                    test_file: test.clone(),
                    source_file: None,
                    reason,
                });
            }
        }

        info!(
            considered = tests.len(),
            selected = selected.len(),
            "feature tests selected"
        );
        Ok(selected)
    }

    /// First changed propagating config above `test`, nearest first. Each config
    /// file is asked once per selector so a change reaches every test beneath it.
    fn config_changed(&mut self, test: &Path) -> Result<Option<PathBuf>, CacheError> {
        let Some(dir) = test.parent() else {
            return Ok(None);
        };
        let candidates = ancestor_config_paths(dir, self.cache.group_root(), &self.propagating_file);
        let mut first_changed = None;

        for config in candidates.iter().filter(|p| p.is_file()) {
            let changed = match self.configs.get(config) {
                Some(changed) => *changed,
                None => {
                    let changed = self.cache.has_changed(config)?;
                    self.configs.insert(config.clone(), changed);
                    changed
                }
            };
            if changed && first_changed.is_none() {
                first_changed = Some(config.clone());
            }
        }

        if let Some(config) = &first_changed {
            debug!(
                config = %config.display(),
                newest = ?most_recent_update(&candidates),
                "shared config changed"
            );
        }
        Ok(first_changed)
    }

    fn subproject_source_changed(
        &mut self,
        sources: &[PathBuf],
    ) -> Result<Option<PathBuf>, CacheError> {
        if let Some(memo) = &self.sources_changed {
            return Ok(memo.clone());
        }

        let mut first_changed = None;
        for source in sources {
            if self.cache.has_changed(source)? && first_changed.is_none() {
                first_changed = Some(source.clone());
            }
        }
        self.sources_changed = Some(first_changed.clone());
        Ok(first_changed)
    }
}
