//! Built-in steps
//!
//! Every step is built from one shared [`StepContext`], so two tasks with the
//! same label always carry the same configuration.

mod catalog;
mod context;
mod project;
mod suites;

pub use catalog::{build_registry, step_names};
pub use context::StepContext;
