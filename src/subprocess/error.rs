use std::time::Duration;

/// Why a child process did not produce a usable result
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Program is not on `PATH`
    #[error("{0} not found; is it installed and on PATH?")]
    CommandNotFound(String),

    #[error("killed after exceeding the {0:?} timeout")]
    Timeout(Duration),

    /// The pipeline itself was asked to stop while the command ran
    #[error("interrupted by {0}")]
    Interrupted(String),

    #[error("exited with code {0}")]
    ExitCode(i32),

    #[error("terminated by signal {0}")]
    Signal(i32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised by [`MockProcessRunner`](super::MockProcessRunner) for unexpected commands
    #[error("unexpected command: {0}")]
    MockExpectationNotMet(String),
}
