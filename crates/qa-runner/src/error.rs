use qa_core::{Error, ErrorKind};
use thiserror::Error;

/// Failures raised by the runner's scheduling harness itself, distinct from
/// a `TestRunResult`'s own `Failed` status (which reports a test's own
/// outcome, not an infrastructure error).
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to acquire a browser context: {0}")]
    PoolFailure(#[source] qa_core::Error),

    #[error("no tests were provided")]
    EmptySuite,
}

impl RunnerError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::PoolFailure(inner) => inner.kind(),
            Self::EmptySuite => ErrorKind::ValidationError,
        }
    }
}

impl From<RunnerError> for Error {
    fn from(err: RunnerError) -> Self {
        let kind = err.error_kind();
        Error::with_source(kind, err.to_string(), Box::new(err))
    }
}
