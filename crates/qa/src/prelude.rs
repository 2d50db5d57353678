//! A convenience module that re-exports commonly used items.
//!
//! ```
//! use qa::prelude::*;
//! ```

pub use crate::{
    browser_executor, Action, AsyncTestRunner, Browser, BrowserError, ContextGuard, CrawlConfig, Error, ErrorKind, IntelligentCrawler,
    ParallelExecutionResult, Pool, PoolConfig, RemoteConfig, Result, RunnerConfig, SelfHealingEngine, StepExecutor, TestRunResult, TestSpec,
    TestSuite, Transport,
};
