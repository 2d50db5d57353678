use qa_core::{Error, ErrorKind};
use qa_pool::PoolError;
use qa_transport::TransportError;
use thiserror::Error;

/// Failures raised while assembling a [`crate::Browser`], before any
/// crawl or test run begins.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl BrowserError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Transport(inner) => inner.error_kind(),
            Self::Pool(inner) => inner.error_kind(),
        }
    }
}

impl From<BrowserError> for Error {
    fn from(err: BrowserError) -> Self {
        let kind = err.error_kind();
        Error::with_source(kind, err.to_string(), Box::new(err))
    }
}
