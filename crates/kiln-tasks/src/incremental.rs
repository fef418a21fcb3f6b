//! Incremental execution of one test suite
//!
//! Selection runs against a probe copy of the change cache. A unit's own
//! observations reach the real cache only after that unit succeeds, and shared
//! observations (propagating configs, subproject sources) only after every unit
//! succeeds. An interrupted or failed pass therefore leaves the cache able to
//! cause extra work on the next pass, never a wrong skip.

use std::path::Path;

use tracing::{info, instrument};

use crate::cache::{CacheError, FileCache};
use crate::report::IncrementalReport;
use crate::task::TaskError;
use crate::test_selection::{SelectedTest, TestSelector};

/// What a suite pass did
#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
    /// Tests that were selected, in run order
    pub selected: Vec<SelectedTest>,
    /// Whether a cumulative report was promoted to complete
    pub finalized: bool,
}

impl PassOutcome {
    pub fn ran(&self) -> usize {
        self.selected.len()
    }
}

/// One incremental pass over a suite
pub struct SuitePass {
    cache: FileCache,
    report: Option<IncrementalReport>,
    propagating_file: String,
    use_cache: bool,
}

impl SuitePass {
    /// Pass backed by a loaded cache. Without a report, units produce no
    /// documents to fold.
    pub fn new(
        cache: FileCache,
        report: Option<IncrementalReport>,
        propagating_file: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            report,
            propagating_file: propagating_file.into(),
            use_cache: true,
        }
    }

    /// Ignore and never write the persisted cache: every unit runs
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self.cache = FileCache::new(self.cache.group_root(), self.cache.cache_file());
        self
    }

    /// Select stale units with `select`, then run each with `run_unit`.
    ///
    /// `run_unit` receives the selected test and, when the pass aggregates a
    /// report, the path the unit must write its own document to.
    #[instrument(skip_all, fields(cache_file = %self.cache.cache_file().display(), use_cache = self.use_cache))]
    pub fn run<S, F>(mut self, select: S, mut run_unit: F) -> Result<PassOutcome, TaskError>
    where
        S: FnOnce(&mut TestSelector<'_>) -> Result<Vec<SelectedTest>, CacheError>,
        F: FnMut(&SelectedTest, Option<&Path>) -> Result<(), TaskError>,
    {
        let mut probe = self.cache.clone();
        let selected = {
            let mut selector = TestSelector::new(&mut probe, self.propagating_file.clone());
            select(&mut selector)?
        };

        for unit in &selected {
            info!(test = %unit.test_file.display(), reason = %unit.reason, "running");
            let partial = self.report.as_ref().map(|r| r.single_unit_path());
            run_unit(unit, partial)?;

            if let Some(report) = &self.report {
                report.fold_in()?;
            }
            self.cache.adopt(&probe, &unit.own_paths())?;
            if self.use_cache {
                self.cache.persist()?;
            }
        }

        self.cache.adopt_all(&probe);
        if self.use_cache {
            self.cache.persist()?;
        }

        let finalized = match &self.report {
            Some(report) => report.finalize()?,
            None => false,
        };

        info!(ran = selected.len(), finalized, "suite pass complete");
        Ok(PassOutcome {
            selected,
            finalized,
        })
    }
}
