#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod browser;
mod error;

pub use browser::Browser;
pub use error::BrowserError;

pub use qa_core::{Error, ErrorKind, MemoryThresholds, Pressure, ProcessMemoryMonitor, ResourceMonitor, Result, RetryPolicy, Snapshot};
pub use qa_crawler::{CrawlConfig, CrawlConfigBuilder, CrawlResult, CrawlState, CrawledPage, CrawlerError, IntelligentCrawler};
pub use qa_healing::{DomainHistory, HealingResult, HealingStrategy, HistoryStore, SelectorCandidate, SelectorRecord, SelfHealingEngine};
pub use qa_pool::{BrowserContext, ContextGuard, ContextState, Pool, PoolConfig, PoolConfigBuilder, PoolError, PoolStats};
pub use qa_runner::{
    browser_executor, Action, AsyncTestRunner, ExecutionContext, ParallelExecutionResult, RunnerConfig, RunnerConfigBuilder, RunnerError,
    StepExecutor, StepResult, StepStatus, TestRunResult, TestSpec, TestSuite,
};
pub use qa_transport::{RemoteConfig, RemoteConfigBuilder, Transport, TransportError};

#[doc(hidden)]
pub mod prelude;

#[cfg(test)]
mod tests {
    use crate::{Error, ErrorKind, Result};

    #[test]
    fn core_types_available() {
        let _error = Error::new(ErrorKind::Other, "test error");
        let _result: Result<()> = Ok(());
    }
}
