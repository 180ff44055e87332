//! Error taxonomy for semaxis operations.
//!
//! Every fallible operation in the workspace returns [`AxisResult`]. Recoverable
//! numeric trouble (a non-converging rotation, a metric that cannot be computed
//! for a degenerate labelling) is handled where it happens and never reaches
//! this type unless recovery is exhausted.

use thiserror::Error;

/// Errors surfaced by the analytical core, the baseline store and the run controller.
///
/// # Fatality
///
/// - **Configuration**: invalid run settings; the run stops before any output is written
/// - **DimensionMismatch**: embeddings do not match the frozen baseline; never tolerated
/// - **Analysis**: the numeric pipeline could not produce a result after all retries
/// - **BaselineNotFound / VersionNotFound**: the requested baseline does not exist
/// - **Storage / Serialization**: persistence failed; prior versions stay untouched
#[derive(Debug, Error)]
pub enum AxisError {
    /// Run configuration is invalid or contradictory.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Embedding dimensionality differs from the one recorded in the baseline.
    ///
    /// Usually means the embedding model changed between runs.
    #[error("Embedding dimension mismatch: baseline expects {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality recorded in the stage-1 transform
        expected: usize,
        /// Dimensionality of the embeddings supplied to this run
        actual: usize,
    },

    /// The analysis pipeline failed after exhausting its recovery options.
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// The project has no baseline versions.
    #[error("Baseline not found for project '{project}'")]
    BaselineNotFound {
        /// Project whose baseline was requested
        project: String,
    },

    /// A specific baseline version was requested but does not exist.
    #[error("Baseline version {version} not found for project '{project}'")]
    VersionNotFound {
        /// Project whose baseline was requested
        project: String,
        /// Requested version identifier
        version: String,
    },

    /// Input data is malformed (ragged rows, non-finite values, missing columns).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The embedding provider failed or returned inconsistent output.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// A filesystem operation failed.
    #[error("Storage error - {context}: {message}")]
    Storage {
        /// What operation was attempted
        context: String,
        /// Underlying error message
        message: String,
    },

    /// Encoding or decoding a persisted document failed.
    #[error("Serialization error - {context}: {message}")]
    Serialization {
        /// What was being encoded or decoded
        context: String,
        /// Underlying error message
        message: String,
    },
}

impl AxisError {
    /// Create a configuration error.
    #[inline]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Create an analysis error.
    #[inline]
    pub fn analysis(reason: impl Into<String>) -> Self {
        Self::Analysis(reason.into())
    }

    /// Create an invalid-input error.
    #[inline]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Storage {
            context: context.into(),
            message: error.to_string(),
        }
    }

    /// Create a serialization error with context.
    pub fn serialization(context: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Serialization {
            context: context.into(),
            message: error.to_string(),
        }
    }

    /// True for errors caused by how the run was configured rather than by data or I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<serde_json::Error> for AxisError {
    fn from(err: serde_json::Error) -> Self {
        AxisError::serialization("json", err)
    }
}

impl From<config::ConfigError> for AxisError {
    fn from(err: config::ConfigError) -> Self {
        AxisError::Configuration(err.to_string())
    }
}

/// Result type alias for semaxis operations.
pub type AxisResult<T> = std::result::Result<T, AxisError>;
