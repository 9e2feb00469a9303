//! Error handling for the unification pipeline.

pub mod util;

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;

/// Errors raised while loading, reconciling and exporting the extracts
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An input extract does not exist or is not a regular file
    #[error("Missing {role} input: {}", path.display())]
    MissingInput {
        /// Which extract (persons, visits, measurements)
        role: String,
        /// The configured path
        path: PathBuf,
    },

    /// A single date cell could not be parsed
    #[error("Unparseable date in column '{column}': {value:?}")]
    DateParse { column: String, value: String },

    /// A single measurement value could not be read as a number
    #[error("Non-numeric value in column '{column}': {value:?}")]
    NumericCoercion { column: String, value: String },

    /// The secondary store could not be written or verified
    #[error("Persisted store error: {0}")]
    PersistedStore(String),

    /// SQLite driver error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A required join column is absent from an input
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error processing Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error opening, reading or writing a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PipelineError {
    /// Create a missing-input error for the given extract
    pub fn missing_input(role: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingInput {
            role: role.into(),
            path: path.into(),
        }
    }

    /// Whether the error is handled at cell level (the value becomes null)
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::DateParse { .. } | Self::NumericCoercion { .. })
    }

    /// Whether the error belongs to the optional database sink
    #[must_use]
    pub const fn is_store_error(&self) -> bool {
        matches!(self, Self::PersistedStore(_) | Self::Sqlite(_))
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
