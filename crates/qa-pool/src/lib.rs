#![forbid(unsafe_code)]

mod config;
mod context;
mod error;
mod pool;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use context::{BrowserContext, ContextState};
pub use error::PoolError;
pub use pool::{ContextGuard, Pool, PoolStats};
