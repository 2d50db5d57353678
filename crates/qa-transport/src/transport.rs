use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::StatusCode;
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::AuthState;
use crate::config::RemoteConfig;
use crate::error::TransportError;
use crate::tools::{is_long_running, map_params, map_tool_name};
use crate::wire::{ErrorBody, HealthStatus, ServerResponse, ToolSummary};

/// Pooled, authenticated, retry-aware client for a remote browser server.
///
/// `reqwest::Client` already maintains a keep-alive connection pool per
/// (host, port, TLS) per-process; `Transport` adds the semaphore, retry,
/// auth, status mapping, and tool/param translation the server's uniform
/// command surface requires on top of it.
#[derive(Clone)]
pub struct Transport {
    config: Arc<RemoteConfig>,
    http: reqwest::Client,
    auth: Arc<AuthState>,
    semaphore: Arc<Semaphore>,
    closed: Arc<AtomicBool>,
}

impl Transport {
    /// Builds a `Transport` from `config`, constructing its own `reqwest`
    /// client with a connection pool sized to `config.max_pool_connections`.
    pub fn new(config: RemoteConfig) -> Result<Self, TransportError> {
        let base = Url::parse(&config.base_url).map_err(|e| TransportError::MalformedResponse {
            path: config.base_url.clone(),
            message: e.to_string(),
        })?;
        let _ = base; // validated eagerly; paths are joined per-request below

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_pool_connections)
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.long_running_timeout())
            .build()
            .map_err(|e| TransportError::Connection {
                attempts: 0,
                source: e,
            })?;

        let auth = Arc::new(AuthState::new(config.auth.clone()));
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));

        Ok(Self {
            config: Arc::new(config),
            http,
            auth,
            semaphore,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let base = Url::parse(&self.config.base_url).map_err(|e| TransportError::MalformedResponse {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        base.join(path).map_err(|e| TransportError::MalformedResponse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn check_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    /// Executes `verb` with `params`, mapping both onto the server's tool
    /// name/field conventions. The primary entry point for the uniform
    /// command surface.
    pub async fn execute_tool(
        &self,
        verb: &str,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Option<serde_json::Value>, TransportError> {
        self.check_open()?;
        let tool_name = map_tool_name(verb);
        let mapped_params = map_params(params);
        let long_running = is_long_running(&tool_name);

        let path = format!("/execute/{tool_name}");
        let response = self
            .request_with_retry(reqwest::Method::POST, &path, Some(serde_json::Value::Object(mapped_params)), true, long_running)
            .await?;

        if !response.success {
            return Err(TransportError::BrowserCommandFailed {
                message: response.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(response.into_result())
    }

    /// Sends an unmapped raw command, for privileged use.
    pub async fn send_raw(&self, command: serde_json::Value) -> Result<Option<serde_json::Value>, TransportError> {
        self.check_open()?;
        let response = self
            .request_with_retry(reqwest::Method::POST, "/command", Some(command), true, false)
            .await?;
        if !response.success {
            return Err(TransportError::BrowserCommandFailed {
                message: response.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(response.into_result())
    }

    /// `GET /health`, unauthenticated.
    pub async fn health_check(&self) -> Result<HealthStatus, TransportError> {
        self.check_open()?;
        let response = self
            .request_raw(reqwest::Method::GET, "/health", None, false, false)
            .await?;
        response.json::<HealthStatus>().await.map_err(|e| TransportError::MalformedResponse {
            path: "/health".to_string(),
            message: e.to_string(),
        })
    }

    /// `GET /tools`, static discovery.
    pub async fn list_tools(&self) -> Result<Vec<ToolSummary>, TransportError> {
        self.check_open()?;
        #[derive(serde::Deserialize)]
        struct Envelope {
            #[serde(default)]
            tools: Vec<ToolSummary>,
        }
        let response = self
            .request_raw(reqwest::Method::GET, "/tools", None, true, false)
            .await?;
        let envelope: Envelope = response.json().await.map_err(|e| TransportError::MalformedResponse {
            path: "/tools".to_string(),
            message: e.to_string(),
        })?;
        Ok(envelope.tools)
    }

    /// `GET /tools/{name}`, static discovery.
    pub async fn tool_info(&self, name: &str) -> Result<serde_json::Value, TransportError> {
        self.check_open()?;
        let path = format!("/tools/{name}");
        let response = self.request_raw(reqwest::Method::GET, &path, None, true, false).await?;
        response.json().await.map_err(|e| TransportError::MalformedResponse {
            path,
            message: e.to_string(),
        })
    }

    /// Drains and closes all pooled connections; subsequent calls fail with
    /// [`TransportError::Closed`].
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    async fn request_with_retry(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
        require_auth: bool,
        long_running: bool,
    ) -> Result<ServerResponse, TransportError> {
        let response = self
            .request_raw(method, path, body, require_auth, long_running)
            .await?;
        response.json::<ServerResponse>().await.map_err(|e| TransportError::MalformedResponse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Performs one logical request, retrying connection-layer failures per
    /// the transport's retry policy, and mapping non-2xx statuses to
    /// [`TransportError`] before returning a successful `Response`.
    async fn request_raw(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
        require_auth: bool,
        long_running: bool,
    ) -> Result<reqwest::Response, TransportError> {
        let url = self.url_for(path)?;
        let timeout = if long_running {
            self.config.long_running_timeout()
        } else {
            self.config.timeout
        };

        let _permit = self.semaphore.acquire().await.map_err(|_| TransportError::Closed)?;

        let max_attempts = self.config.retry_policy.max_attempts.max(1);
        let mut last_error: Option<TransportError> = None;

        for attempt in 0..max_attempts {
            let mut builder = self.http.request(method.clone(), url.clone()).timeout(timeout);
            if require_auth {
                let token = self.auth.bearer_token().await.map_err(|_| TransportError::Auth {
                    reason: Some("token signer failed".to_string()),
                })?;
                if let Some(token) = token {
                    builder = builder.bearer_auth(token);
                }
            }
            if let Some(ref body) = body {
                builder = builder.json(body);
            }

            let err = match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_client_error() || status.is_server_error() {
                        return Err(self.map_error_status(status, path, response).await);
                    }
                    return Ok(response);
                }
                Err(err) if err.is_timeout() => TransportError::Timeout {
                    path: path.to_string(),
                    timeout_secs: timeout.as_secs(),
                },
                Err(err) => TransportError::Connection {
                    attempts: attempt + 1,
                    source: err,
                },
            };

            // A single classified notion of retryable (`TransportError::is_retryable`)
            // drives this loop, rather than a second ad hoc check over the raw error.
            if err.is_retryable() && attempt + 1 < max_attempts {
                #[cfg(feature = "tracing")]
                tracing::warn!(target: "qa_transport", attempt, path, error = %err, "retrying request");
                let delay = self.config.retry_policy.delay_for(attempt);
                tokio::time::sleep(delay).await;
                last_error = Some(err);
                continue;
            }
            return Err(err);
        }

        Err(last_error.expect("loop always records an error before exhausting attempts"))
    }

    async fn map_error_status(&self, status: StatusCode, path: &str, response: reqwest::Response) -> TransportError {
        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body.error.clone().unwrap_or_else(|| format!("HTTP {status}"));

        match status.as_u16() {
            401 => TransportError::Auth { reason: body.reason },
            403 => TransportError::IpBlocked { client_ip: body.client_ip },
            404 => TransportError::EndpointNotFound { path: path.to_string() },
            422 => TransportError::Validation {
                message,
                missing: body.missing_fields,
                unknown: body.unknown_fields,
            },
            429 => TransportError::RateLimited {
                retry_after_secs: body.retry_after.unwrap_or(60),
                limit: body.limit,
                remaining: body.remaining,
            },
            502 => TransportError::BrowserCommandFailed { message },
            503 if body.license_status.is_some() => TransportError::License {
                message: body.license_message.unwrap_or(message),
                status: body.license_status,
                fingerprint: body.hardware_fingerprint,
            },
            503 => TransportError::BrowserNotReady { message },
            other => TransportError::UnexpectedStatus { status: other, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::auth::AuthMode;

    fn test_config(base_url: &str) -> RemoteConfig {
        RemoteConfig::builder()
            .with_base_url(base_url)
            .with_auth(AuthMode::Bearer("t".into()))
            .with_timeout(Duration::from_millis(200))
            .with_max_concurrent(4usize)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn close_causes_subsequent_calls_to_fail_closed() {
        let transport = Transport::new(test_config("http://127.0.0.1:1")).unwrap();
        transport.close().await;
        let err = transport.health_check().await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn unreachable_host_surfaces_connection_error_after_retries() {
        let mut config = test_config("http://127.0.0.1:1");
        config.retry_policy.max_attempts = 2;
        config.retry_policy.initial_delay = Duration::from_millis(1);
        config.retry_policy.max_delay = Duration::from_millis(1);
        let transport = Transport::new(config).unwrap();
        let err = transport.health_check().await.unwrap_err();
        assert!(matches!(err, TransportError::Connection { attempts: 2, .. }));
    }
}
