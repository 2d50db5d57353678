use qa_core::{Error, ErrorKind};
use thiserror::Error;

/// Errors produced while talking to the remote browser server.
///
/// Each variant corresponds to a row of the status->error mapping table or
/// a connection-layer failure; [`TransportError::error_kind`] is the single
/// place that collapses them onto [`ErrorKind`] for callers above this crate.
#[derive(Debug, Error)]
pub enum TransportError {
    /// 401 or missing/invalid credentials.
    #[error("authentication failed{}", reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Auth { reason: Option<String> },

    /// 403.
    #[error("request blocked{}", client_ip.as_ref().map(|ip| format!(" (client_ip={ip})")).unwrap_or_default())]
    IpBlocked { client_ip: Option<String> },

    /// 404.
    #[error("endpoint not found: {path}")]
    EndpointNotFound { path: String },

    /// 422; the server reported which fields were missing or unrecognized.
    #[error("validation error: {message} (missing={missing:?}, unknown={unknown:?})")]
    Validation {
        message: String,
        missing: Vec<String>,
        unknown: Vec<String>,
    },

    /// 429; a `Retry-After` hint is provided when present.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        retry_after_secs: u64,
        limit: Option<u64>,
        remaining: Option<u64>,
    },

    /// 502, or a tool reported failure in its own payload.
    #[error("browser command failed: {message}")]
    BrowserCommandFailed { message: String },

    /// 503 carrying license information.
    #[error("license error: {message}")]
    License {
        message: String,
        status: Option<String>,
        fingerprint: Option<String>,
    },

    /// 503 without license information.
    #[error("browser not ready: {message}")]
    BrowserNotReady { message: String },

    /// An unmapped HTTP status.
    #[error("unexpected HTTP status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The request exceeded its deadline.
    #[error("request to {path} timed out after {timeout_secs}s")]
    Timeout { path: String, timeout_secs: u64 },

    /// A connection-layer failure that survived all retries.
    #[error("connection failed after {attempts} attempts: {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be parsed as the expected JSON shape.
    #[error("malformed response from {path}: {message}")]
    MalformedResponse { path: String, message: String },

    /// An operation was attempted after [`crate::Transport::close`].
    #[error("transport is closed")]
    Closed,
}

impl TransportError {
    /// Returns whether this failure is worth retrying under the transport's
    /// [`qa_core::RetryPolicy`] rather than surfaced immediately. The single
    /// notion of retryable consulted by [`crate::Transport`]'s retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::BrowserNotReady { .. } | Self::Timeout { .. }
        )
    }

    pub fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Auth { .. } => ErrorKind::AuthError,
            Self::IpBlocked { .. } => ErrorKind::IpBlocked,
            Self::EndpointNotFound { .. } => ErrorKind::Other,
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::BrowserCommandFailed { .. } => ErrorKind::BrowserCommandFailed,
            Self::License { .. } => ErrorKind::LicenseError,
            Self::BrowserNotReady { .. } => ErrorKind::BrowserNotReady,
            Self::UnexpectedStatus { .. } => ErrorKind::Other,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Connection { .. } => ErrorKind::Other,
            Self::MalformedResponse { .. } => ErrorKind::Other,
            Self::Closed => ErrorKind::Closed,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::with_source(err.error_kind(), err.to_string(), Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_maps_to_rate_limited_kind() {
        let err = TransportError::RateLimited {
            retry_after_secs: 60,
            limit: Some(100),
            remaining: Some(0),
        };
        assert_eq!(err.error_kind(), ErrorKind::RateLimited);
        assert!(!err.is_retryable());
    }

    #[test]
    fn connection_and_timeout_are_retryable() {
        let timeout = TransportError::Timeout {
            path: "/execute/browser_navigate".into(),
            timeout_secs: 30,
        };
        assert!(timeout.is_retryable());
    }

    #[test]
    fn auth_is_not_retryable() {
        let err = TransportError::Auth { reason: None };
        assert!(!err.is_retryable());
        assert_eq!(err.error_kind(), ErrorKind::AuthError);
    }

    #[test]
    fn converts_into_core_error_preserving_kind() {
        let err = TransportError::Closed;
        let core: Error = err.into();
        assert_eq!(core.kind(), ErrorKind::Closed);
    }
}
