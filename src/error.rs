//! Exit codes and structured error output for the command line tool.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: every sweep succeeded
/// - 1: the command could not run (bad manifest, bad config, ...)
/// - 3: the sweeps ran but some stale files could not be removed
/// - 130: interrupted by Ctrl+C before the sweeps completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    PartialSuccess = 3,
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "MC000",
            Self::GeneralError => "MC001",
            Self::PartialSuccess => "MC003",
            Self::Interrupted => "MC130",
        }
    }
}

/// Error printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Code prefix, e.g. "MC001".
    pub code: String,
    pub exit_code: i32,
    /// The error and its causes, outermost first.
    pub message: String,
}

impl StructuredError {
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
        }
    }
}
