//! Error types for Relentless
//!
//! All modules use `RelentlessResult<T>` as their return type. Only the
//! failures that must stop a sweep are errors: a trial exiting non-zero, a
//! missing score, or an unreadable cache entry are reported through values.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Relentless operations
pub type RelentlessResult<T> = Result<T, RelentlessError>;

/// All errors that can occur in Relentless
#[derive(Error, Debug)]
pub enum RelentlessError {
    // Build errors
    #[error("Code did not compile successfully for {context}. See the build log at {}", log.display())]
    BuildFailed { context: String, log: PathBuf },

    // Computation errors
    #[error("Invalid computation type: {0}")]
    InvalidComputationKind(String),

    #[error("Invalid command template '{template}': {reason}")]
    InvalidCommand { template: String, reason: String },

    // Sweep errors
    #[error("Invalid sweep: {0}")]
    InvalidSweep(String),

    // Revision errors
    #[error("Unknown revision: {reference} (also tried origin/{reference})")]
    UnknownRevision { reference: String },

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelentlessError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a git error from a failed invocation
    pub fn git(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Git {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::BuildFailed { .. } => Some("Fix the compile errors listed in the build log and retry"),
            Self::InvalidComputationKind(_) => Some("Use one of: simple, marathon"),
            Self::UnknownRevision { .. } => Some("Run: git fetch origin"),
            _ => None,
        }
    }
}
