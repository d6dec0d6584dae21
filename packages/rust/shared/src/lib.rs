//! Shared types, error model, and configuration for autograde.
//!
//! This crate is the foundation depended on by all other autograde crates.
//! It provides:
//! - [`AutogradeError`], the unified error type
//! - Domain types ([`Submission`], [`QuestionId`], [`CaseId`], [`FixtureKind`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExecutionConfig, LabConfig, ReportConfig, ToolsConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{AutogradeError, Result};
pub use types::{CaseId, FixtureKind, QuestionId, Submission, rubric_file_name};
