use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use qa_core::Result;
use tokio::sync::Mutex;

/// A short-lived bearer token and when it stops being valid.
#[derive(Debug, Clone)]
pub struct Token {
    pub value: String,
    pub expires_at: Instant,
}

impl Token {
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Produces short-lived tokens for JWT authentication.
///
/// Implementors typically sign a claim set with a private key; the transport
/// only needs the resulting token and its lifetime.
pub trait TokenSigner: Send + Sync + fmt::Debug {
    fn sign(&self) -> Result<Token>;
}

/// How the transport authenticates against the remote server.
#[derive(Clone)]
pub enum AuthMode {
    /// No authorization header is sent (only valid for unauthenticated calls).
    None,
    /// A fixed `Authorization: Bearer <token>` header.
    Bearer(String),
    /// A signer issues short-lived tokens, refreshed before they expire.
    Jwt {
        signer: Arc<dyn TokenSigner>,
        refresh_threshold: Duration,
    },
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "AuthMode::None"),
            Self::Bearer(_) => write!(f, "AuthMode::Bearer(..)"),
            Self::Jwt { refresh_threshold, .. } => f
                .debug_struct("AuthMode::Jwt")
                .field("refresh_threshold", refresh_threshold)
                .finish_non_exhaustive(),
        }
    }
}

/// Caches the current token and refreshes it under JWT mode once the
/// remaining lifetime falls below the configured threshold.
pub struct AuthState {
    mode: AuthMode,
    cached: Mutex<Option<Token>>,
}

impl AuthState {
    pub fn new(mode: AuthMode) -> Self {
        Self {
            mode,
            cached: Mutex::new(None),
        }
    }

    /// Returns the bearer token value to send, refreshing a JWT if needed.
    pub async fn bearer_token(&self) -> Result<Option<String>> {
        match &self.mode {
            AuthMode::None => Ok(None),
            AuthMode::Bearer(token) => Ok(Some(token.clone())),
            AuthMode::Jwt {
                signer,
                refresh_threshold,
            } => {
                let mut guard = self.cached.lock().await;
                let needs_refresh = match guard.as_ref() {
                    Some(token) => token.remaining(Instant::now()) < *refresh_threshold,
                    None => true,
                };
                if needs_refresh {
                    let fresh = signer.sign()?;
                    *guard = Some(fresh.clone());
                    Ok(Some(fresh.value))
                } else {
                    Ok(guard.as_ref().map(|t| t.value.clone()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CountingSigner {
        calls: std::sync::atomic::AtomicU32,
    }

    impl TokenSigner for CountingSigner {
        fn sign(&self) -> Result<Token> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Token {
                value: format!("token-{n}"),
                expires_at: Instant::now() + Duration::from_millis(50),
            })
        }
    }

    #[tokio::test]
    async fn bearer_mode_returns_fixed_token() {
        let state = AuthState::new(AuthMode::Bearer("fixed".into()));
        assert_eq!(state.bearer_token().await.unwrap(), Some("fixed".into()));
        assert_eq!(state.bearer_token().await.unwrap(), Some("fixed".into()));
    }

    #[tokio::test]
    async fn jwt_mode_refreshes_once_then_caches() {
        let signer = Arc::new(CountingSigner {
            calls: std::sync::atomic::AtomicU32::new(0),
        });
        let state = AuthState::new(AuthMode::Jwt {
            signer: signer.clone(),
            refresh_threshold: Duration::from_millis(5),
        });

        let first = state.bearer_token().await.unwrap();
        let second = state.bearer_token().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(signer.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn jwt_mode_refreshes_after_threshold_elapses() {
        let signer = Arc::new(CountingSigner {
            calls: std::sync::atomic::AtomicU32::new(0),
        });
        let state = AuthState::new(AuthMode::Jwt {
            signer: signer.clone(),
            refresh_threshold: Duration::from_millis(40),
        });

        let first = state.bearer_token().await.unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        let second = state.bearer_token().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(signer.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn none_mode_omits_token() {
        let state = AuthState::new(AuthMode::None);
        assert_eq!(state.bearer_token().await.unwrap(), None);
    }
}
