//! Error types for autograde.
//!
//! Library crates use [`AutogradeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all grading operations.
#[derive(Debug, thiserror::Error)]
pub enum AutogradeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Input validation error (malformed submission name, missing archive, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An external tool could not be launched or waited on.
    #[error("{tool}: {message}")]
    Tool { tool: String, message: String },

    /// A build step (unzip, merge, ant) failed.
    #[error("{step} failed:\n{output}")]
    Build { step: String, output: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AutogradeError>;

impl AutogradeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// An external tool failed to spawn or be reaped.
    pub fn tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// A build step failed; `output` is whatever the step printed.
    pub fn build(step: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Build {
            step: step.into(),
            output: output.into(),
        }
    }
}
