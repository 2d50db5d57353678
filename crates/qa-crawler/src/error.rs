use qa_core::{Error, ErrorKind};
use thiserror::Error;

/// Failures raised by the crawler itself, distinct from the transport/pool
/// errors it wraps while navigating.
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("no start URL was provided")]
    MissingStartUrl,

    #[error("start URL could not be parsed: {0}")]
    InvalidStartUrl(#[source] url::ParseError),

    #[error("invalid include/exclude pattern: {0}")]
    InvalidPattern(String),

    #[error("failed to acquire a browser context: {0}")]
    PoolFailure(#[source] qa_core::Error),

    #[error("navigation failed: {0}")]
    NavigationFailed(#[source] qa_core::Error),
}

impl CrawlerError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::MissingStartUrl | Self::InvalidStartUrl(_) | Self::InvalidPattern(_) => ErrorKind::ValidationError,
            Self::PoolFailure(inner) | Self::NavigationFailed(inner) => inner.kind(),
        }
    }
}

impl From<CrawlerError> for Error {
    fn from(err: CrawlerError) -> Self {
        let kind = err.error_kind();
        Error::with_source(kind, err.to_string(), Box::new(err))
    }
}
