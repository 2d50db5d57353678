use std::time::Duration;

use derive_builder::Builder;

/// Bounds for the runner's scheduling: concurrency cap, per-test timeout,
/// and infrastructure-failure retry behavior.
#[derive(Debug, Clone, Builder)]
#[builder(
    name = "RunnerConfigBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate_config")
)]
pub struct RunnerConfig {
    /// Maximum number of tests executed concurrently at `Pressure::None`.
    #[builder(default = "4")]
    pub max_parallel_tests: usize,
    /// Default per-test timeout, used when a `TestSpec` carries none.
    #[builder(default = "Duration::from_secs(600)")]
    pub default_timeout: Duration,
    /// Retries for infrastructure failures (pool acquisition, transport
    /// errors), not user test-logic failures.
    #[builder(default = "2")]
    pub max_retries: u32,
    /// Whether infrastructure failures are retried at all.
    #[builder(default = "true")]
    pub retry_on_infrastructure_failure: bool,
    /// Stop launching new tests after the first `Failed` result. In-flight
    /// tests still run to completion.
    #[builder(default = "false")]
    pub fail_fast: bool,
    /// React to `qa_core::Pressure` transitions by shrinking/growing the
    /// concurrency semaphore.
    #[builder(default = "true")]
    pub adaptive_parallelism: bool,
}

impl RunnerConfigBuilder {
    fn validate_config(&self) -> Result<(), String> {
        if self.max_parallel_tests.unwrap_or(4) == 0 {
            return Err("max_parallel_tests must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl RunnerConfig {
    pub fn builder() -> RunnerConfigBuilder {
        RunnerConfigBuilder::default()
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_parallel_tests: 4,
            default_timeout: Duration::from_secs(600),
            max_retries: 2,
            retry_on_infrastructure_failure: true,
            fail_fast: false,
            adaptive_parallelism: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_parallelism() {
        assert!(RunnerConfig::builder().with_max_parallel_tests(0usize).build().is_err());
    }

    #[test]
    fn defaults_are_sane() {
        let config = RunnerConfig::default();
        assert!(config.max_parallel_tests > 0);
    }
}
