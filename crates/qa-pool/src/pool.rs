use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use qa_core::{Pressure, ResourceMonitor};
use qa_transport::Transport;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::context::{BrowserContext, ContextState, health_check};
use crate::error::PoolError;

/// Read-only snapshot of pool activity, exposed through [`Pool::stats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub created: u64,
    pub recycled: u64,
    pub failed: u64,
    pub acquisitions: u64,
    pub releases: u64,
    pub size: usize,
    pub available: usize,
    pub in_use: usize,
}

struct PoolState {
    contexts: HashMap<u64, BrowserContext>,
    available: VecDeque<u64>,
    closed: bool,
    stats: PoolStats,
}

impl PoolState {
    fn in_use_count(&self) -> usize {
        self.contexts.len().saturating_sub(self.available.len())
    }
}

/// Owns the set of live browser contexts: acquisition, health checks,
/// recycling, and a background cleanup sweep.
pub struct Pool {
    config: PoolConfig,
    transport: Transport,
    monitor: Option<Arc<dyn ResourceMonitor>>,
    state: Mutex<PoolState>,
    notify: Notify,
    next_id: AtomicU64,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl Pool {
    pub fn new(config: PoolConfig, transport: Transport, monitor: Option<Arc<dyn ResourceMonitor>>) -> Arc<Self> {
        Arc::new(Self {
            config,
            transport,
            monitor,
            state: Mutex::new(PoolState {
                contexts: HashMap::new(),
                available: VecDeque::new(),
                closed: false,
                stats: PoolStats::default(),
            }),
            notify: Notify::new(),
            next_id: AtomicU64::new(1),
            cleanup_task: Mutex::new(None),
        })
    }

    /// Pre-warms `min_size` contexts and starts the background cleanup loop.
    pub async fn start(self: &Arc<Self>) -> Result<(), PoolError> {
        for _ in 0..self.config.min_size {
            let ctx = self.create_context(None).await?;
            let mut state = self.state.lock().await;
            state.available.push_back(ctx.id);
            state.contexts.insert(ctx.id, ctx);
        }

        let this = Arc::clone(self);
        let mut guard = self.cleanup_task.lock().await;
        *guard = Some(tokio::spawn(async move {
            this.cleanup_loop().await;
        }));
        Ok(())
    }

    /// Acquires a context, preferring one tagged with `service_id` when one
    /// is Available. Fails with [`PoolError::Exhausted`] after
    /// `config.acquire_timeout`.
    pub async fn acquire(self: &Arc<Self>, label: Option<String>, service_id: Option<String>) -> Result<ContextGuard, PoolError> {
        let deadline = Instant::now() + self.config.acquire_timeout;

        loop {
            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Err(PoolError::Closed);
                }

                if let Some(id) = self.pop_available_preferring(&mut state, service_id.as_deref()) {
                    let needs_recycle = {
                        let pool_size = state.contexts.len();
                        let min_size = self.config.min_size;
                        let ctx = state.contexts.get(&id).expect("queued id must exist");
                        self.should_recycle(ctx, pool_size, min_size)
                    };
                    if needs_recycle {
                        let remote_id = self.recycle_locked(&mut state, id);
                        drop(state);
                        if let Some(remote_id) = remote_id {
                            self.close_remote(&remote_id).await;
                        }
                        continue;
                    }

                    let remote_id_for_check = state.contexts.get(&id).expect("queued id must exist").remote_id.clone();
                    drop(state);
                    let healthy = health_check(&self.transport, &remote_id_for_check).await;
                    state = self.state.lock().await;
                    if !healthy {
                        state.stats.failed += 1;
                        if let Some(ctx) = state.contexts.get_mut(&id) {
                            ctx.mark_failed();
                        }
                        let remote_id = self.recycle_locked(&mut state, id);
                        drop(state);
                        if let Some(remote_id) = remote_id {
                            self.close_remote(&remote_id).await;
                        }
                        continue;
                    }

                    let ctx = state.contexts.get_mut(&id).expect("queued id must exist");
                    ctx.mark_acquired(label.clone());
                    if service_id.is_some() {
                        ctx.service_id = service_id.clone();
                    }
                    let remote_id = ctx.remote_id.clone();
                    state.stats.acquisitions += 1;
                    return Ok(ContextGuard {
                        pool: Arc::clone(self),
                        id: Some(id),
                        remote_id,
                    });
                }

                let size = state.contexts.len();
                if size < self.config.max_size {
                    let pressure = self.monitor.as_ref().map(|m| m.snapshot().pressure).unwrap_or(Pressure::None);
                    let scale_up_forbidden = pressure >= Pressure::High && size > 0;
                    if !scale_up_forbidden {
                        drop(state);
                        let mut ctx = self.create_context(service_id.clone()).await?;
                        ctx.mark_acquired(label.clone());
                        let remote_id = ctx.remote_id.clone();
                        let id = ctx.id;
                        let mut state = self.state.lock().await;
                        state.contexts.insert(id, ctx);
                        state.stats.acquisitions += 1;
                        return Ok(ContextGuard {
                            pool: Arc::clone(self),
                            id: Some(id),
                            remote_id,
                        });
                    }
                }
            }

            if Instant::now() >= deadline {
                let state = self.state.lock().await;
                return Err(PoolError::Exhausted {
                    waited_ms: self.config.acquire_timeout.as_millis() as u64,
                    size: state.contexts.len(),
                    max: self.config.max_size,
                });
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let _ = tokio::time::timeout(remaining.min(Duration::from_millis(100)), self.notify.notified()).await;
        }
    }

    fn pop_available_preferring(&self, state: &mut PoolState, service_id: Option<&str>) -> Option<u64> {
        if let Some(service_id) = service_id
            && let Some(pos) = state
                .available
                .iter()
                .position(|id| state.contexts.get(id).and_then(|c| c.service_id.as_deref()) == Some(service_id))
        {
            return state.available.remove(pos);
        }
        state.available.pop_front()
    }

    /// Unified recycling policy (spec.md §4.2): overused, aged out, or
    /// idle past `idle_timeout` while the pool is above `min_size`.
    /// `pool_size` is the total live context count (the caller's own
    /// context is still counted, since it hasn't been removed yet).
    fn should_recycle(&self, ctx: &BrowserContext, pool_size: usize, min_size: usize) -> bool {
        ctx.use_count >= self.config.max_uses
            || ctx.age() >= self.config.max_age
            || (ctx.idle() >= self.config.idle_timeout && pool_size > min_size)
    }

    async fn create_context(&self, service_id: Option<String>) -> Result<BrowserContext, PoolError> {
        let mut params = serde_json::Map::new();
        if let Some(ref service_id) = service_id {
            params.insert("service_id".to_string(), serde_json::Value::String(service_id.clone()));
        }
        let result = self
            .transport
            .execute_tool("createContext", params)
            .await
            .map_err(|e| PoolError::CreateFailed(e.into()))?;

        let remote_id = result
            .as_ref()
            .and_then(|v| v.get("context_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("ctx-{}", self.next_id.load(Ordering::Relaxed)));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut ctx = BrowserContext::new(id, remote_id);
        ctx.service_id = service_id;

        #[cfg(feature = "tracing")]
        tracing::debug!(target: "qa_pool", context_id = id, "created context");

        let mut state = self.state.lock().await;
        state.stats.created += 1;
        drop(state);

        Ok(ctx)
    }

    /// Removes `id` from the pool's bookkeeping and returns its remote id so
    /// the caller can close the remote session after releasing the lock.
    /// Transitions the context to `Recycling` first, unless a prior
    /// health-check failure already marked it `Failed`.
    fn recycle_locked(&self, state: &mut PoolState, id: u64) -> Option<String> {
        if let Some(ctx) = state.contexts.get_mut(&id)
            && ctx.state != ContextState::Failed
        {
            ctx.mark_recycling();
        }
        let remote_id = state.contexts.remove(&id).map(|c| c.remote_id);
        state.stats.recycled += 1;
        remote_id
    }

    async fn release(&self, id: u64) {
        let remote_id_and_close = {
            let mut state = self.state.lock().await;
            let in_use = state.contexts.get(&id).map(|c| c.state == ContextState::InUse).unwrap_or(false);
            if !in_use {
                None
            } else {
                state.stats.releases += 1;
                let pool_size = state.contexts.len();
                let min_size = self.config.min_size;
                let should_recycle = state.contexts.get(&id).map(|c| self.should_recycle(c, pool_size, min_size)).unwrap_or(false);
                if should_recycle {
                    self.recycle_locked(&mut state, id)
                } else if let Some(ctx) = state.contexts.get_mut(&id) {
                    ctx.mark_released();
                    state.available.push_back(id);
                    None
                } else {
                    None
                }
            }
        };
        self.notify.notify_waiters();

        if let Some(remote_id) = remote_id_and_close {
            self.close_remote(&remote_id).await;
        }
    }

    async fn close_remote(&self, remote_id: &str) {
        let mut params = serde_json::Map::new();
        params.insert("context_id".to_string(), serde_json::Value::String(remote_id.to_string()));
        let _ = self.transport.execute_tool("releaseContext", params).await;
    }

    async fn cleanup_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.monitoring_interval);
        loop {
            ticker.tick().await;
            self.cleanup_once().await;
        }
    }

    async fn cleanup_once(&self) {
        let (to_recycle, to_close): (Vec<u64>, Vec<String>) = {
            let mut state = self.state.lock().await;
            if state.closed {
                return;
            }
            let min_size = self.config.min_size;
            let mut recycle_ids = Vec::new();
            let mut closes = Vec::new();

            let mut i = 0;
            while i < state.available.len() {
                let pool_size = state.contexts.len();
                if pool_size <= min_size {
                    break;
                }
                let id = state.available[i];
                let ctx = state.contexts.get(&id).expect("available id must exist");
                if self.should_recycle(ctx, pool_size, min_size) {
                    state.available.remove(i);
                    if let Some(remote_id) = self.recycle_locked(&mut state, id) {
                        closes.push(remote_id);
                    }
                    recycle_ids.push(id);
                } else {
                    i += 1;
                }
            }
            (recycle_ids, closes)
        };

        #[cfg(feature = "tracing")]
        if !to_recycle.is_empty() {
            tracing::debug!(target: "qa_pool", count = to_recycle.len(), "cleanup recycled contexts");
        }
        let _ = to_recycle;

        for remote_id in to_close {
            self.close_remote(&remote_id).await;
        }
    }

    /// Stops the cleanup loop, waits up to `graceful_shutdown_timeout` for
    /// in-use contexts to drain, then force-closes everything. After this
    /// returns, `acquire` fails with [`PoolError::Closed`].
    pub async fn stop(self: &Arc<Self>) {
        if let Some(handle) = self.cleanup_task.lock().await.take() {
            handle.abort();
        }

        let deadline = Instant::now() + self.config.graceful_shutdown_timeout;
        loop {
            {
                let state = self.state.lock().await;
                if state.in_use_count() == 0 || Instant::now() >= deadline {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let remote_ids: Vec<String> = {
            let mut state = self.state.lock().await;
            state.closed = true;
            state.available.clear();
            state.contexts.drain().map(|(_, c)| c.remote_id).collect()
        };
        for remote_id in remote_ids {
            self.close_remote(&remote_id).await;
        }
        self.notify.notify_waiters();
    }

    pub async fn stats(&self) -> PoolStats {
        let state = self.state.lock().await;
        PoolStats {
            size: state.contexts.len(),
            available: state.available.len(),
            in_use: state.in_use_count(),
            ..state.stats
        }
    }
}

/// Holds an acquired context; returns it to the pool on drop (or via the
/// explicit [`ContextGuard::release`]).
pub struct ContextGuard {
    pool: Arc<Pool>,
    id: Option<u64>,
    remote_id: String,
}

impl std::fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextGuard")
            .field("id", &self.id)
            .field("remote_id", &self.remote_id)
            .finish()
    }
}

impl ContextGuard {
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    /// Returns the context to the pool, awaiting completion of the release
    /// (including any recycle close call).
    pub async fn release(mut self) {
        if let Some(id) = self.id.take() {
            self.pool.release(id).await;
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            let pool = Arc::clone(&self.pool);
            tokio::spawn(async move {
                pool.release(id).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use qa_transport::RemoteConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn mock_server_with_contexts(count: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/execute/browser_create_context"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": {"context_id": format!("remote-{count}")},
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/execute/browser_get_page_info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": {"url": "about:blank"},
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/execute/browser_close_context"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": null,
            })))
            .mount(&server)
            .await;
        server
    }

    fn transport_for(base_url: &str) -> Transport {
        let config = RemoteConfig::builder().with_base_url(base_url).with_max_concurrent(8usize).build().unwrap();
        Transport::new(config).unwrap()
    }

    fn small_pool_config() -> PoolConfig {
        PoolConfig::builder()
            .with_min_size(1usize)
            .with_max_size(2usize)
            .with_acquire_timeout(Duration::from_millis(500))
            .with_monitoring_interval(Duration::from_secs(60))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn acquire_and_release_round_trips_a_context() {
        let server = mock_server_with_contexts(1).await;
        let transport = transport_for(&server.uri());
        let pool = Pool::new(small_pool_config(), transport, None);
        pool.start().await.unwrap();

        let guard = pool.acquire(Some("login_test".into()), None).await.unwrap();
        assert!(!guard.remote_id().is_empty());
        guard.release().await;

        let stats = pool.stats().await;
        assert_eq!(stats.acquisitions, 1);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.available, 1);
    }

    #[tokio::test]
    async fn acquire_fails_with_exhausted_once_max_size_is_checked_out() {
        let server = mock_server_with_contexts(1).await;
        let transport = transport_for(&server.uri());
        let pool = Pool::new(small_pool_config(), transport, None);
        pool.start().await.unwrap();

        let first = pool.acquire(None, None).await.unwrap();
        let second = pool.acquire(None, None).await.unwrap();
        let err = pool.acquire(None, None).await.unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { .. }));

        first.release().await;
        second.release().await;
    }

    #[tokio::test]
    async fn acquire_prefers_context_tagged_with_requested_service_id() {
        let server = mock_server_with_contexts(1).await;
        let transport = transport_for(&server.uri());
        let pool = Pool::new(small_pool_config(), transport, None);
        pool.start().await.unwrap();

        let tagged = pool.acquire(None, Some("billing".into())).await.unwrap();
        let tagged_remote_id = tagged.remote_id().to_string();
        tagged.release().await;

        let reacquired = pool.acquire(None, Some("billing".into())).await.unwrap();
        assert_eq!(reacquired.remote_id(), tagged_remote_id);
        reacquired.release().await;
    }

    #[tokio::test]
    async fn acquire_recycles_idle_contexts_above_min_size_instead_of_handing_them_out() {
        let server = mock_server_with_contexts(1).await;
        let transport = transport_for(&server.uri());
        let config = PoolConfig::builder()
            .with_min_size(1usize)
            .with_max_size(3usize)
            .with_idle_timeout(Duration::from_millis(10))
            .with_acquire_timeout(Duration::from_millis(500))
            .with_monitoring_interval(Duration::from_secs(60))
            .build()
            .unwrap();
        let pool = Pool::new(config, transport, None);
        pool.start().await.unwrap();

        // Scale the pool up to its max (3), then release everything so all
        // three sit Available and idle past idle_timeout.
        let g1 = pool.acquire(None, None).await.unwrap();
        let g2 = pool.acquire(None, None).await.unwrap();
        let g3 = pool.acquire(None, None).await.unwrap();
        g1.release().await;
        g2.release().await;
        g3.release().await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(pool.stats().await.created, 3);

        // The next acquire dequeues stale contexts and must recycle every
        // one above min_size before finally handing one out.
        let guard = pool.acquire(None, None).await.unwrap();
        let stats = pool.stats().await;
        assert_eq!(stats.recycled, 2);
        assert_eq!(stats.size, 1);
        guard.release().await;
    }

    #[tokio::test]
    async fn stop_closes_all_contexts_and_rejects_further_acquires() {
        let server = mock_server_with_contexts(1).await;
        let transport = transport_for(&server.uri());
        let pool = Pool::new(small_pool_config(), transport, None);
        pool.start().await.unwrap();

        pool.stop().await;
        let err = pool.acquire(None, None).await.unwrap_err();
        assert!(matches!(err, PoolError::Closed));
    }
}
