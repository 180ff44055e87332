//! Exit codes for the `semaxis` binary.
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Any failure other than configuration |
//! | 2 | Configuration error (bad flags or config file, unlock without baseline, too few rows) |

use semaxis_core::AxisError;
use thiserror::Error;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CliExitCode {
    Success = 0,
    Failure = 1,
    Configuration = 2,
}

impl From<CliExitCode> for i32 {
    fn from(code: CliExitCode) -> Self {
        code as i32
    }
}

/// Errors raised by the CLI layer itself.
#[derive(Debug, Error)]
pub enum CliError {
    /// No input file was given and none could be detected.
    #[error("no input file: pass --input or place input.csv or another *.csv in {0}")]
    NoInput(String),

    /// No embeddings were given and none sit next to the input.
    #[error("no embeddings for {0}: pass --embeddings (JSON array of arrays or numeric CSV)")]
    NoEmbeddings(String),

    /// The input table has no data rows.
    #[error("input {0} has no rows")]
    EmptyInput(String),
}

/// Map an error chain to an exit code.
pub fn exit_code_for_error(error: &anyhow::Error) -> CliExitCode {
    let configuration = error.chain().any(|cause| {
        cause
            .downcast_ref::<AxisError>()
            .map(AxisError::is_configuration)
            .unwrap_or(false)
            || cause.downcast_ref::<CliError>().is_some()
    });
    if configuration {
        CliExitCode::Configuration
    } else {
        CliExitCode::Failure
    }
}
