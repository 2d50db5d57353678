use std::fmt;
use std::io;

/// Type alias for a type-erased [`Error`] source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Category of failure surfaced by the platform's core layers.
///
/// This mirrors the taxonomy in the error handling design: transport-level
/// HTTP classification, pool/runner lifecycle violations, and selector
/// healing exhaustion all collapse to one of these kinds so that callers can
/// match on `kind()` without downcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An operation exceeded its deadline.
    Timeout,
    /// 401 or missing/invalid credentials.
    AuthError,
    /// 429; the caller may delay and retry.
    RateLimited,
    /// 403.
    IpBlocked,
    /// 422; missing or unknown fields were reported.
    ValidationError,
    /// 503 without license information.
    BrowserNotReady,
    /// 503 carrying license information.
    LicenseError,
    /// 502, or a tool reported failure in its own payload.
    BrowserCommandFailed,
    /// The pool could not produce a context before the acquisition timeout.
    PoolExhausted,
    /// An operation was attempted on a pool that has already shut down.
    PoolClosed,
    /// No healing candidate matched within the confidence floor.
    HealingFailed,
    /// An operation was attempted on a transport that has already closed.
    Closed,
    /// Underlying I/O failure (persistence, sockets).
    Io,
    /// Unclassified.
    Other,
}

impl ErrorKind {
    /// Returns a string representation of the error kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::AuthError => "auth_error",
            Self::RateLimited => "rate_limited",
            Self::IpBlocked => "ip_blocked",
            Self::ValidationError => "validation_error",
            Self::BrowserNotReady => "browser_not_ready",
            Self::LicenseError => "license_error",
            Self::BrowserCommandFailed => "browser_command_failed",
            Self::PoolExhausted => "pool_exhausted",
            Self::PoolClosed => "pool_closed",
            Self::HealingFailed => "healing_failed",
            Self::Closed => "closed",
            Self::Io => "io",
            Self::Other => "other",
        }
    }

    /// Whether errors of this kind are worth retrying locally under a
    /// [`crate::RetryPolicy`], as opposed to being surfaced to the caller.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::BrowserNotReady)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecoverable failure produced by any core layer.
///
/// `Error` carries a classification ([`ErrorKind`]), a human-readable
/// message, and an optional source for error-chain inspection.
#[must_use]
#[derive(thiserror::Error)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Creates a new [`Error`] with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new [`Error`] with the given kind, message, and source error.
    pub fn with_source(kind: ErrorKind, message: impl Into<String>, source: BoxError) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns the error kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether this error should be retried locally.
    #[inline]
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Error");
        debug
            .field("kind", &self.kind)
            .field("message", &self.message);
        if let Some(ref source) = self.source {
            debug.field("source", source);
        }
        debug.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<BoxError> for Error {
    #[inline]
    fn from(source: BoxError) -> Self {
        Self {
            kind: ErrorKind::Other,
            message: source.to_string(),
            source: Some(source),
        }
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(error: io::Error) -> Self {
        Self::with_source(ErrorKind::Io, "I/O error", Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = Error::new(ErrorKind::Timeout, "navigation exceeded deadline");
        assert_eq!(err.to_string(), "[timeout] navigation exceeded deadline");
    }

    #[test]
    fn timeout_and_browser_not_ready_are_retryable() {
        assert!(Error::new(ErrorKind::Timeout, "x").is_retryable());
        assert!(Error::new(ErrorKind::BrowserNotReady, "x").is_retryable());
        assert!(!Error::new(ErrorKind::AuthError, "x").is_retryable());
        assert!(!Error::new(ErrorKind::PoolExhausted, "x").is_retryable());
    }

    #[test]
    fn io_conversion_sets_io_kind() {
        let io_err = io::Error::from(io::ErrorKind::NotFound);
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
