use crate::defaults_store::StoreError;
use crate::runner::RunnerError;
use thiserror::Error;

/// Exit code for usage and storage failures
pub const EXIT_FAILURE: i32 = 1;

/// Exit code when the tunnel client cannot be launched
pub const EXIT_LAUNCH_FAILURE: i32 = 127;

#[derive(Debug, Error)]
pub enum MyltError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("Failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),
}

impl MyltError {
    pub fn exit_code(&self) -> i32 {
        match self {
            MyltError::Usage(_) | MyltError::Storage(_) => EXIT_FAILURE,
            MyltError::Runner(RunnerError::Launch { .. }) => EXIT_LAUNCH_FAILURE,
            MyltError::Runner(RunnerError::Wait { .. }) | MyltError::Signal(_) => EXIT_FAILURE,
        }
    }

    /// Usage errors are reported together with the command's help text
    pub fn is_usage(&self) -> bool {
        matches!(self, MyltError::Usage(_))
    }
}
