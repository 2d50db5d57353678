use std::sync::Arc;
use std::time::Duration;

use derive_builder::Builder;
use qa_core::RetryPolicy;

use crate::auth::AuthMode;

/// Connection settings for the remote browser server.
///
/// Immutable once built; a [`crate::Transport`] owns one for its lifetime.
#[derive(Clone, Builder)]
#[builder(
    name = "RemoteConfigBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate_config")
)]
pub struct RemoteConfig {
    /// Base URL of the remote browser server, e.g. `https://browser.internal:9222`.
    pub base_url: String,
    /// Authentication mode: static bearer token or JWT signer.
    #[builder(default = "AuthMode::None")]
    pub auth: AuthMode,
    /// Whether to verify the server's TLS certificate.
    #[builder(default = "true")]
    pub verify_tls: bool,
    /// Base timeout applied to ordinary (non-long-running) operations.
    #[builder(default = "Duration::from_secs(30)")]
    pub timeout: Duration,
    /// Maximum number of kept-alive connections to the server.
    #[builder(default = "10")]
    pub max_pool_connections: usize,
    /// Maximum number of concurrent in-flight requests.
    #[builder(default = "10")]
    pub max_concurrent: usize,
    /// Backoff policy for retryable connection-layer errors.
    #[builder(default)]
    pub retry_policy: RetryPolicy,
}

impl RemoteConfigBuilder {
    fn validate_config(&self) -> Result<(), String> {
        match &self.base_url {
            Some(url) if url.trim().is_empty() => {
                Err("base_url cannot be empty".to_string())
            }
            None => Err("base_url is required".to_string()),
            Some(_) => Ok(()),
        }?;

        if let Some(timeout) = &self.timeout
            && timeout.is_zero()
        {
            return Err("timeout must be greater than 0".to_string());
        }

        if let Some(max_concurrent) = &self.max_concurrent
            && *max_concurrent == 0
        {
            return Err("max_concurrent must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl RemoteConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RemoteConfigBuilder {
        RemoteConfigBuilder::default()
    }

    /// The "long-running" timeout applied to tools in
    /// [`crate::tools::is_long_running`]: at least 2 minutes, or 4x the base
    /// timeout, whichever is larger.
    pub fn long_running_timeout(&self) -> Duration {
        let four_x = self.timeout.saturating_mul(4);
        four_x.max(Duration::from_secs(120))
    }
}

/// Shared handle to a [`RemoteConfig`], cheap to clone across tasks.
pub type SharedRemoteConfig = Arc<RemoteConfig>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_base_url() {
        let result = RemoteConfig::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let result = RemoteConfig::builder()
            .with_base_url("http://localhost:9222")
            .with_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn long_running_timeout_is_at_least_two_minutes() {
        let config = RemoteConfig::builder()
            .with_base_url("http://localhost:9222")
            .with_timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        assert_eq!(config.long_running_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn long_running_timeout_scales_with_base() {
        let config = RemoteConfig::builder()
            .with_base_url("http://localhost:9222")
            .with_timeout(Duration::from_secs(60))
            .build()
            .unwrap();
        assert_eq!(config.long_running_timeout(), Duration::from_secs(240));
    }
}
