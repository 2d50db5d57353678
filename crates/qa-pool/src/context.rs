use std::time::Instant;

use qa_transport::Transport;

/// State of a browser context in the pool's state machine.
///
/// ```text
///               acquire                     release (healthy, young)
///  Available  ─────────►  InUse  ──────────────────────────────►  Available
///      │                    │                    │
///      │                    │ use_count>=max     │ age>=maxAge
///      │                    ▼ or age>=maxAge      │ or idle>=idleTimeout
///      │                Recycling ◄──────────────┘
///      │                    │
///      │                    ▼
///      └── health-check failed ──► Failed ──► closed, removed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Available,
    InUse,
    Recycling,
    Failed,
}

/// A logical browser tab/page handle backed by the remote server's
/// `createContext`/`closeContext` tools.
#[derive(Debug)]
pub struct BrowserContext {
    pub id: u64,
    /// The server-assigned context id returned by `createContext`.
    pub remote_id: String,
    pub state: ContextState,
    pub created_at: Instant,
    pub last_used_at: Instant,
    pub use_count: u64,
    /// The test currently bound to this context, if any.
    pub current_test: Option<String>,
    /// Preferential tag for service-scoped acquisition.
    pub service_id: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl BrowserContext {
    pub fn new(id: u64, remote_id: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            remote_id,
            state: ContextState::Available,
            created_at: now,
            last_used_at: now,
            use_count: 0,
            current_test: None,
            service_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub fn idle(&self) -> std::time::Duration {
        self.last_used_at.elapsed()
    }

    pub fn mark_acquired(&mut self, test: Option<String>) {
        self.state = ContextState::InUse;
        self.use_count += 1;
        self.current_test = test;
        self.last_used_at = Instant::now();
    }

    pub fn mark_released(&mut self) {
        self.state = ContextState::Available;
        self.current_test = None;
        self.last_used_at = Instant::now();
    }

    pub fn mark_recycling(&mut self) {
        self.state = ContextState::Recycling;
    }

    pub fn mark_failed(&mut self) {
        self.state = ContextState::Failed;
    }
}

/// Health check: a synthetically cheap remote call ("get current URL")
/// that fails fast if the context's remote session is gone.
pub async fn health_check(transport: &Transport, remote_id: &str) -> bool {
    let mut params = serde_json::Map::new();
    params.insert("context_id".to_string(), serde_json::Value::String(remote_id.to_string()));
    transport.execute_tool("getCurrentURL", params).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_acquired_increments_use_count_and_sets_in_use() {
        let mut ctx = BrowserContext::new(1, "remote-1".into());
        ctx.mark_acquired(Some("login_test".into()));
        assert_eq!(ctx.state, ContextState::InUse);
        assert_eq!(ctx.use_count, 1);
        assert_eq!(ctx.current_test.as_deref(), Some("login_test"));
    }

    #[test]
    fn mark_released_clears_test_and_returns_available() {
        let mut ctx = BrowserContext::new(1, "remote-1".into());
        ctx.mark_acquired(Some("t".into()));
        ctx.mark_released();
        assert_eq!(ctx.state, ContextState::Available);
        assert!(ctx.current_test.is_none());
    }

    #[test]
    fn mark_failed_and_mark_recycling_transition_state() {
        let mut ctx = BrowserContext::new(1, "remote-1".into());
        ctx.mark_failed();
        assert_eq!(ctx.state, ContextState::Failed);
        ctx.mark_recycling();
        assert_eq!(ctx.state, ContextState::Recycling);
    }
}
