use std::time::Duration;

use derive_builder::Builder;

/// Bounds and timings for the browser context pool.
#[derive(Debug, Clone, Builder)]
#[builder(
    name = "PoolConfigBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate_config")
)]
pub struct PoolConfig {
    /// Minimum number of contexts kept alive even when idle.
    #[builder(default = "1")]
    pub min_size: usize,
    /// Maximum number of contexts the pool will ever hold.
    #[builder(default = "10")]
    pub max_size: usize,
    /// Recycle a context once it has served this many acquisitions.
    #[builder(default = "100")]
    pub max_uses: u64,
    /// Recycle a context once it has lived this long, regardless of use.
    #[builder(default = "Duration::from_secs(30 * 60)")]
    pub max_age: Duration,
    /// Recycle an Available context idle this long, provided `size > min_size`.
    #[builder(default = "Duration::from_secs(5 * 60)")]
    pub idle_timeout: Duration,
    /// Interval between background cleanup sweeps.
    #[builder(default = "Duration::from_secs(30)")]
    pub monitoring_interval: Duration,
    /// How long an `acquire` call waits before failing with `PoolExhausted`.
    #[builder(default = "Duration::from_secs(30)")]
    pub acquire_timeout: Duration,
    /// How long `stop()` waits for in-use contexts to become Available
    /// before force-closing them.
    #[builder(default = "Duration::from_secs(30)")]
    pub graceful_shutdown_timeout: Duration,
}

impl PoolConfigBuilder {
    fn validate_config(&self) -> Result<(), String> {
        let min = self.min_size.unwrap_or(1);
        let max = self.max_size.unwrap_or(10);
        if min > max {
            return Err(format!("min_size ({min}) cannot exceed max_size ({max})"));
        }
        if max == 0 {
            return Err("max_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            max_uses: 100,
            max_age: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(5 * 60),
            monitoring_interval: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(30),
            graceful_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_min_greater_than_max() {
        let result = PoolConfig::builder().with_min_size(5usize).with_max_size(2usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn defaults_are_sane() {
        let config = PoolConfig::default();
        assert!(config.min_size <= config.max_size);
    }
}
