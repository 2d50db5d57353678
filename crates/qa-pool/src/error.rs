use qa_core::{Error, ErrorKind};
use thiserror::Error;

/// Lifecycle violations raised by the browser context pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No context became available before the acquisition timeout.
    #[error("pool exhausted: no context available after {waited_ms}ms (size={size}, max={max})")]
    Exhausted { waited_ms: u64, size: usize, max: usize },

    /// The pool has already been stopped.
    #[error("pool is closed")]
    Closed,

    /// Context creation failed (e.g. the remote `createContext` call failed).
    #[error("failed to create context: {0}")]
    CreateFailed(#[source] qa_core::Error),
}

impl PoolError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Exhausted { .. } => ErrorKind::PoolExhausted,
            Self::Closed => ErrorKind::PoolClosed,
            Self::CreateFailed(_) => ErrorKind::BrowserCommandFailed,
        }
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        Error::with_source(err.error_kind(), err.to_string(), Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_maps_to_pool_exhausted_kind() {
        let err = PoolError::Exhausted { waited_ms: 30_000, size: 10, max: 10 };
        assert_eq!(err.error_kind(), ErrorKind::PoolExhausted);
    }

    #[test]
    fn closed_maps_to_pool_closed_kind() {
        assert_eq!(PoolError::Closed.error_kind(), ErrorKind::PoolClosed);
    }
}
