use std::path::PathBuf;
use std::sync::Arc;

use qa_core::{MemoryThresholds, ProcessMemoryMonitor, ResourceMonitor};
use qa_crawler::{CrawlConfig, CrawlerError, IntelligentCrawler};
use qa_healing::SelfHealingEngine;
use qa_pool::{Pool, PoolConfig};
use qa_runner::{AsyncTestRunner, RunnerConfig, StepExecutor};
use qa_transport::{RemoteConfig, Transport};

use crate::error::BrowserError;

/// Entry point tying a remote browser server, its context pool, and an
/// optional resource monitor together so callers don't have to thread
/// `Transport`/`Pool` construction through every crawl or test run by hand.
pub struct Browser {
    transport: Transport,
    pool: Arc<Pool>,
    monitor: Option<Arc<ProcessMemoryMonitor>>,
}

impl Browser {
    /// Builds the transport and context pool, starting the pool's background
    /// maintenance task. Resource monitoring is off by default; enable it
    /// with [`Browser::with_memory_monitor`].
    pub async fn connect(remote: RemoteConfig, pool: PoolConfig) -> Result<Arc<Self>, BrowserError> {
        let transport = Transport::new(remote)?;
        let pool = Pool::new(pool, transport.clone(), None);
        pool.start().await?;
        Ok(Arc::new(Self { transport, pool, monitor: None }))
    }

    /// Rebuilds with a [`ProcessMemoryMonitor`] wired into the pool so
    /// cleanup and eviction react to resident-memory pressure, and returns
    /// the started monitor so adaptive consumers (e.g. `AsyncTestRunner`)
    /// can subscribe to it too.
    pub async fn with_memory_monitor(
        remote: RemoteConfig,
        pool_config: PoolConfig,
        thresholds: MemoryThresholds,
        sample_interval: std::time::Duration,
    ) -> Result<(Arc<Self>, Arc<ProcessMemoryMonitor>), BrowserError> {
        let transport = Transport::new(remote)?;
        let monitor = ProcessMemoryMonitor::new(thresholds, sample_interval);
        monitor.start();
        let pool = Pool::new(pool_config, transport.clone(), Some(Arc::clone(&monitor) as Arc<dyn ResourceMonitor>));
        pool.start().await?;
        Ok((Arc::new(Self { transport, pool, monitor: Some(Arc::clone(&monitor)) }), monitor))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Stops the pool's maintenance task and, if one was started, the
    /// resource monitor's sampling loop.
    pub async fn shutdown(&self) {
        self.pool.stop().await;
        if let Some(monitor) = &self.monitor {
            monitor.stop();
        }
    }

    /// Builds an [`IntelligentCrawler`] sharing this browser's transport and
    /// pool.
    pub fn crawler(&self, config: CrawlConfig) -> Result<IntelligentCrawler, CrawlerError> {
        IntelligentCrawler::new(self.transport.clone(), Arc::clone(&self.pool), config)
    }

    /// Builds a [`SelfHealingEngine`] sharing this browser's transport,
    /// persisting selector history at `history_path` when provided.
    pub fn healing_engine(&self, history_path: Option<PathBuf>) -> SelfHealingEngine {
        SelfHealingEngine::new(self.transport.clone(), history_path)
    }

    /// Builds an [`AsyncTestRunner`] sharing this browser's pool, driven by
    /// `executor` (see [`qa_runner::browser_executor`] for the reference
    /// implementation that talks to this crate's own `Transport`).
    pub fn runner<E: StepExecutor + Sync>(&self, executor: E, config: RunnerConfig) -> Arc<AsyncTestRunner<E>> {
        AsyncTestRunner::new(Arc::clone(&self.pool), executor, config)
    }
}
