//! kiln core - foundational types for the kiln build orchestrator
//!
//! This crate provides error handling, configuration loading and the on-disk
//! project layout (subprojects, build and report directories, test file pairing).

pub mod config;
pub mod error;
pub mod project;

pub use config::{load_config, load_config_or_default, Config, SubprojectConfig, ToolsConfig};
pub use error::{ConfigError, KilnError, LayoutError, Result};
pub use project::{ProjectLayout, ReportScope, Subproject, TestSuite, UnitPair};
