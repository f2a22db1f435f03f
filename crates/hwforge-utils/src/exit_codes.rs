//! Exit code constants and error mapping for the hwforge CLI.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Run completed |
//! | 1 | `INTERNAL` | General/internal failure, or run ended with an error event |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `REJECTED` | Feasibility analysis rejected the product |
//! | 4 | `NEEDS_INPUT` | Run suspended at a human-input checkpoint |
//! | 70 | `LLM_FAILURE` | LLM backend invocation failed during setup |

use crate::error::{HwforgeError, LlmError};

/// Type-safe process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Run completed
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// The product was judged not manufacturable
    pub const REJECTED: ExitCode = ExitCode(3);

    /// The run paused for human input
    pub const NEEDS_INPUT: ExitCode = ExitCode(4);

    /// LLM backend failure
    pub const LLM_FAILURE: ExitCode = ExitCode(70);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl HwforgeError {
    /// Map this error to the CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::InvalidInput(_) => ExitCode::CLI_ARGS,
            Self::Llm(LlmError::Misconfiguration(_) | LlmError::Unsupported(_)) => {
                ExitCode::CLI_ARGS
            }
            Self::Llm(_) => ExitCode::LLM_FAILURE,
            Self::Io(_) | Self::Json(_) => ExitCode::INTERNAL,
        }
    }
}
