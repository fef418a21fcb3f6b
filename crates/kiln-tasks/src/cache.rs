//! File change cache
//!
//! Tracks the modification time at which each file of a group was last observed
//! and answers whether it moved forward since. A group is one test suite of one
//! subproject; a YAML file per group persists the store between invocations.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use kiln_core::{Subproject, TestSuite};

/// One tracked file as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Path relative to the group root
    pub path: PathBuf,
    /// Modification time last observed as current
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    group_root: PathBuf,
    #[serde(default)]
    entries: Vec<CacheEntry>,
}

/// Change cache for one group of files
#[derive(Debug, Clone)]
pub struct FileCache {
    group_root: PathBuf,
    cache_file: PathBuf,
    entries: BTreeMap<PathBuf, DateTime<Utc>>,
}

impl FileCache {
    /// Create an empty cache
    pub fn new(group_root: impl Into<PathBuf>, cache_file: impl Into<PathBuf>) -> Self {
        Self {
            group_root: group_root.into(),
            cache_file: cache_file.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the cache persisted for one suite of a subproject
    pub fn for_suite(subproject: &Subproject, suite: TestSuite) -> Result<Self, CacheError> {
        Self::load(subproject.root(), subproject.cache_file(suite))
    }

    /// Load a persisted cache. A missing file yields an empty cache; a file that
    /// cannot be parsed is an error.
    #[instrument(skip_all, fields(cache_file = %cache_file.as_ref().display()))]
    pub fn load(
        group_root: impl Into<PathBuf>,
        cache_file: impl AsRef<Path>,
    ) -> Result<Self, CacheError> {
        let cache_file = cache_file.as_ref();
        let mut cache = Self::new(group_root, cache_file);

        if !cache_file.exists() {
            debug!("no persisted cache, starting empty");
            return Ok(cache);
        }

        let contents = fs::read_to_string(cache_file)?;
        let document: CacheDocument =
            serde_yaml::from_str(&contents).map_err(|source| CacheError::Malformed {
                path: cache_file.to_path_buf(),
                source,
            })?;

        if document.group_root != cache.group_root {
            debug!(
                stored = %document.group_root.display(),
                current = %cache.group_root.display(),
                "group root moved since the cache was written"
            );
        }
        cache.entries = document
            .entries
            .into_iter()
            .map(|entry| (entry.path, entry.timestamp))
            .collect();

        debug!(entries = cache.entries.len(), "cache loaded");
        Ok(cache)
    }

    /// Write the store back to its cache file
    #[instrument(skip_all, fields(cache_file = %self.cache_file.display(), entries = self.entries.len()))]
    pub fn persist(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.cache_file.parent() {
            fs::create_dir_all(parent)?;
        }

        let document = CacheDocument {
            group_root: self.group_root.clone(),
            entries: self.entries().collect(),
        };
        let yaml = serde_yaml::to_string(&document)?;
        fs::write(&self.cache_file, yaml)?;

        debug!("cache persisted");
        Ok(())
    }

    /// Whether `path` changed since it was last observed.
    ///
    /// A path never observed counts as changed. When it reports a change the
    /// current modification time is recorded; otherwise the store is untouched.
    pub fn has_changed(&mut self, path: &Path) -> Result<bool, CacheError> {
        let key = self.relative(path)?;
        let absolute = self.group_root.join(&key);
        let modified = modified_at(&absolute)?;

        let changed = match self.entries.get(&key) {
            Some(stored) => modified > *stored,
            None => true,
        };
        if changed {
            debug!(path = %key.display(), modified = %modified, "file changed");
            self.entries.insert(key, modified);
        }
        Ok(changed)
    }

    /// Stored timestamp for a path, if it has been observed
    pub fn observed(&self, path: &Path) -> Option<DateTime<Utc>> {
        let key = self.relative(path).ok()?;
        self.entries.get(&key).copied()
    }

    /// Copy the stored timestamps of `paths` from `other` into this cache
    pub fn adopt(&mut self, other: &FileCache, paths: &[PathBuf]) -> Result<(), CacheError> {
        for path in paths {
            let key = self.relative(path)?;
            if let Some(timestamp) = other.entries.get(&key) {
                self.entries.insert(key, *timestamp);
            }
        }
        Ok(())
    }

    /// Copy every entry of `other` into this cache
    pub fn adopt_all(&mut self, other: &FileCache) {
        for (path, timestamp) in &other.entries {
            self.entries.insert(path.clone(), *timestamp);
        }
    }

    /// Persisted entries, sorted by path
    pub fn entries(&self) -> impl Iterator<Item = CacheEntry> + '_ {
        self.entries.iter().map(|(path, timestamp)| CacheEntry {
            path: path.clone(),
            timestamp: *timestamp,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn group_root(&self) -> &Path {
        &self.group_root
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Newest stored timestamp
    pub fn last_observed(&self) -> Option<DateTime<Utc>> {
        self.entries.values().max().copied()
    }

    fn relative(&self, path: &Path) -> Result<PathBuf, CacheError> {
        if path.is_relative() {
            return Ok(path.to_path_buf());
        }
        path.strip_prefix(&self.group_root)
            .map(Path::to_path_buf)
            .map_err(|_| CacheError::OutsideGroup {
                path: path.to_path_buf(),
                root: self.group_root.clone(),
            })
    }
}

/// Newest modification time among the paths that exist
pub fn most_recent_update(paths: &[PathBuf]) -> Option<DateTime<Utc>> {
    paths
        .iter()
        .filter(|p| p.is_file())
        .filter_map(|p| modified_at(p).ok())
        .max()
}

/// The propagating config file in `dir` and in every ancestor up to and including
/// `group_root`, nearest first. Files need not exist.
pub fn ancestor_config_paths(dir: &Path, group_root: &Path, file_name: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if !dir.starts_with(group_root) {
        return paths;
    }

    let mut current = Some(dir);
    while let Some(d) = current {
        paths.push(d.join(file_name));
        if d == group_root {
            break;
        }
        current = d.parent();
    }
    paths
}

/// Delete a persisted cache file. Returns whether one existed.
pub fn remove_cache_file(cache_file: &Path) -> Result<bool, CacheError> {
    if !cache_file.exists() {
        return Ok(false);
    }
    fs::remove_file(cache_file)?;
    info!(cache_file = %cache_file.display(), "cache removed");
    Ok(true)
}

fn modified_at(path: &Path) -> Result<DateTime<Utc>, CacheError> {
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| CacheError::Stat {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(DateTime::<Utc>::from(modified))
}

/// Cache statistics for one cache group
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Subproject name
    pub subproject: String,
    /// Suite the group belongs to
    pub suite: String,
    /// Cache file location
    pub cache_file: PathBuf,
    /// Number of tracked files
    pub entries: usize,
    /// Size of the cache file in bytes
    pub total_size: u64,
    /// Newest stored timestamp
    pub last_observed: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Collect statistics for one suite's cache
    pub fn collect(subproject: &Subproject, suite: TestSuite) -> Result<Self, CacheError> {
        let cache = FileCache::for_suite(subproject, suite)?;
        let total_size = fs::metadata(cache.cache_file())
            .map(|m| m.len())
            .unwrap_or(0);
        Ok(Self {
            subproject: subproject.name().to_string(),
            suite: suite.to_string(),
            cache_file: cache.cache_file().to_path_buf(),
            entries: cache.len(),
            total_size,
            last_observed: cache.last_observed(),
        })
    }

    /// Format total size in human-readable form
    pub fn formatted_size(&self) -> String {
        if self.total_size < 1024 {
            format!("{} B", self.total_size)
        } else if self.total_size < 1024 * 1024 {
            format!("{:.1} KB", self.total_size as f64 / 1024.0)
        } else {
            format!("{:.1} MB", self.total_size as f64 / (1024.0 * 1024.0))
        }
    }
}

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A tracked file could not be inspected
    #[error("Cannot read modification time of {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted cache could not be parsed
    #[error("Malformed cache file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error
    #[error("Cache serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The path does not belong to the cache's group
    #[error("{path} is outside cache group {root}")]
    OutsideGroup { path: PathBuf, root: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    fn write(path: &Path, secs: i64) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
        set_mtime(path, secs);
    }

    fn set_mtime(path: &Path, secs: i64) {
        filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    fn cache_in(temp: &TempDir) -> FileCache {
        FileCache::new(temp.path(), temp.path().join("build/file_cache.yaml"))
    }

    #[test]
    fn test_has_changed_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("src/app.py");
        write(&file, 1_700_000_000);

        let mut cache = cache_in(&temp);
        assert!(cache.has_changed(&file).unwrap());
        assert!(!cache.has_changed(&file).unwrap());
    }

    #[test]
    fn test_newer_mtime_is_a_change() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("src/app.py");
        write(&file, 1_700_000_000);

        let mut cache = cache_in(&temp);
        cache.has_changed(&file).unwrap();

        set_mtime(&file, 1_700_000_100);
        assert!(cache.has_changed(&file).unwrap());
        assert!(!cache.has_changed(&file).unwrap());
    }

    #[test]
    fn test_older_mtime_is_not_a_change() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("src/app.py");
        write(&file, 1_700_000_100);

        let mut cache = cache_in(&temp);
        cache.has_changed(&file).unwrap();

        set_mtime(&file, 1_700_000_000);
        assert!(!cache.has_changed(&file).unwrap());
        assert_eq!(
            cache.observed(&file).unwrap().timestamp(),
            1_700_000_100,
            "stored timestamp never moves backwards"
        );
    }

    #[test]
    fn test_round_trip_keeps_entries() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("src/a.py");
        let b = temp.path().join("test/unit_tests/test_a.py");
        write(&a, 1_700_000_000);
        write(&b, 1_700_000_050);

        let mut cache = cache_in(&temp);
        cache.has_changed(&a).unwrap();
        cache.has_changed(&b).unwrap();
        cache.persist().unwrap();

        let mut loaded = FileCache::load(temp.path(), cache.cache_file()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.entries().collect::<Vec<_>>(), cache.entries().collect::<Vec<_>>());
        assert!(!loaded.has_changed(&a).unwrap());
        assert!(!loaded.has_changed(&b).unwrap());
    }

    #[test]
    fn test_persisted_paths_are_relative() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("src/a.py");
        write(&file, 1_700_000_000);

        let mut cache = cache_in(&temp);
        cache.has_changed(&file).unwrap();
        cache.persist().unwrap();

        let yaml = fs::read_to_string(cache.cache_file()).unwrap();
        assert!(yaml.contains("path: src/a.py"));
        assert!(yaml.contains("group_root:"));
    }

    #[test]
    fn test_missing_cache_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache = FileCache::load(temp.path(), temp.path().join("nope.yaml")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_malformed_cache_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file_cache.yaml");
        fs::write(&path, "entries: [this is: not, valid").unwrap();

        let err = FileCache::load(temp.path(), &path).unwrap_err();
        assert!(matches!(err, CacheError::Malformed { .. }));
    }

    #[test]
    fn test_path_outside_group_is_rejected() {
        let temp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let file = other.path().join("stray.py");
        write(&file, 1_700_000_000);

        let mut cache = cache_in(&temp);
        assert!(matches!(
            cache.has_changed(&file),
            Err(CacheError::OutsideGroup { .. })
        ));
    }

    #[test]
    fn test_adopt_copies_only_named_paths() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a.py");
        let b = temp.path().join("b.py");
        write(&a, 1_700_000_000);
        write(&b, 1_700_000_000);

        let mut cache = cache_in(&temp);
        let mut probe = cache.clone();
        probe.has_changed(&a).unwrap();
        probe.has_changed(&b).unwrap();

        cache.adopt(&probe, std::slice::from_ref(&a)).unwrap();
        assert!(cache.observed(&a).is_some());
        assert!(cache.observed(&b).is_none());

        cache.adopt_all(&probe);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_ancestor_config_paths() {
        let root = Path::new("/work/core");
        let paths = ancestor_config_paths(&root.join("test/unit_tests/calc"), root, "conftest.py");

        assert_eq!(
            paths,
            vec![
                root.join("test/unit_tests/calc/conftest.py"),
                root.join("test/unit_tests/conftest.py"),
                root.join("test/conftest.py"),
                root.join("conftest.py"),
            ]
        );
        assert_eq!(ancestor_config_paths(root, root, "conftest.py").len(), 1);
        assert!(ancestor_config_paths(Path::new("/elsewhere"), root, "conftest.py").is_empty());
    }

    #[test]
    fn test_most_recent_update() {
        let temp = TempDir::new().unwrap();
        let near = temp.path().join("test/conftest.py");
        let far = temp.path().join("conftest.py");
        let absent = temp.path().join("test/unit_tests/conftest.py");
        write(&near, 1_700_000_000);
        write(&far, 1_700_000_500);

        let newest = most_recent_update(&[absent.clone(), near, far]).unwrap();
        assert_eq!(newest.timestamp(), 1_700_000_500);
        assert!(most_recent_update(&[absent]).is_none());
    }

    #[test]
    fn test_remove_cache_file() {
        let temp = TempDir::new().unwrap();
        let cache = cache_in(&temp);
        cache.persist().unwrap();

        assert!(remove_cache_file(cache.cache_file()).unwrap());
        assert!(!remove_cache_file(cache.cache_file()).unwrap());
    }

    #[test]
    fn test_cache_stats_formatted_size() {
        let mut stats = CacheStats {
            subproject: "core".to_string(),
            suite: "unit_tests".to_string(),
            cache_file: PathBuf::from("build/core/unit_tests/file_cache.yaml"),
            entries: 0,
            total_size: 1536,
            last_observed: None,
        };
        assert_eq!(stats.formatted_size(), "1.5 KB");

        stats.total_size = 500;
        assert_eq!(stats.formatted_size(), "500 B");
    }
}
