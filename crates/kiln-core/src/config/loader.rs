//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};

use super::defaults::config_file_names;
use super::types::Config;
use super::validation::validate_config;

/// Syntax of a configuration file, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }

    fn parse(self, content: &str) -> std::result::Result<Config, ConfigError> {
        Ok(match self {
            Self::Toml => toml::from_str(content)?,
            Self::Yaml => serde_yaml::from_str(content)?,
        })
    }
}

/// Load and validate configuration from a file
pub fn load_config(path: &Path) -> Result<Config> {
    let format = ConfigFormat::of(path);
    info!(path = %path.display(), ?format, "loading config");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = format.parse(&content)?;

    validate_config(&config)?;
    debug!(path = %path.display(), subprojects = config.subprojects.len(), "config loaded and validated");
    Ok(config)
}

/// Places a config file may live in `dir`, in priority order
fn candidates(dir: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    config_file_names()
        .into_iter()
        .flat_map(move |name| [dir.join(name), dir.join(".config").join(name)])
}

/// Find the configuration file governing `start_dir`.
///
/// Each directory from `start_dir` up to the filesystem root is checked for
/// `<dir>/<name>` and then `<dir>/.config/<name>`, for each known file name in
/// turn. The nearest directory with a match wins.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for config file");

    let found = start_dir
        .ancestors()
        .find_map(|dir| candidates(dir).find(|path| path.is_file()));

    match &found {
        Some(path) => info!(path = %path.display(), "found config file"),
        None => debug!("no config file found"),
    }
    found
}

/// Directory a config file governs (its parent, or the grandparent for `.config/`)
pub fn project_root_for(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or_else(|| Path::new("."));
    if parent.file_name().is_some_and(|n| n == ".config") {
        parent.parent().unwrap_or(parent).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

/// Load configuration or use defaults
///
/// Only a missing file falls back to defaults; a config that exists but fails to
/// parse or validate is returned as an error.
pub fn load_config_or_default(dir: &Path) -> Result<(Config, Option<PathBuf>)> {
    match find_config(dir) {
        Some(path) => {
            let config = load_config(&path)?;
            Ok((config, Some(path)))
        }
        None => {
            warn!(dir = %dir.display(), "no config found, using defaults");
            Ok((Config::default(), None))
        }
    }
}
