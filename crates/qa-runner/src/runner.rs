use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use qa_core::{Pressure, ResourceMonitor, RetryPolicy};
use qa_pool::Pool;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::executor::{ExecutionContext, StepExecutor};
use crate::model::{StepStatus, TestRunResult, TestSpec, TestSuite};

/// Aggregate result of one `run_tests`/`run_suite` call.
#[derive(Debug, Clone)]
pub struct ParallelExecutionResult {
    pub suite_name: Option<String>,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub results: Vec<TestRunResult>,
    pub max_parallelism_reached: usize,
    pub duration: Duration,
}

impl ParallelExecutionResult {
    fn empty(suite_name: Option<String>) -> Self {
        Self {
            suite_name,
            total_tests: 0,
            passed_tests: 0,
            failed_tests: 0,
            skipped_tests: 0,
            results: Vec::new(),
            max_parallelism_reached: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_tests == 0 {
            0.0
        } else {
            self.passed_tests as f64 / self.total_tests as f64 * 100.0
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed_tests == 0
    }
}

/// Bounded-concurrency executor for `TestSpec`s: a global semaphore caps
/// in-flight tests, each running in its own pooled browser context, with
/// per-test timeout, infrastructure-failure retry, and pressure-adaptive
/// parallelism.
pub struct AsyncTestRunner<E> {
    pool: Arc<Pool>,
    executor: E,
    config: RunnerConfig,
    semaphore: Arc<Semaphore>,
    granted_permits: Arc<AtomicUsize>,
    adapt_task: Mutex<Option<JoinHandle<()>>>,
}

impl<E: StepExecutor + Sync> AsyncTestRunner<E> {
    pub fn new(pool: Arc<Pool>, executor: E, config: RunnerConfig) -> Arc<Self> {
        let max = config.max_parallel_tests;
        Arc::new(Self {
            pool,
            executor,
            config,
            semaphore: Arc::new(Semaphore::new(max)),
            granted_permits: Arc::new(AtomicUsize::new(max)),
            adapt_task: Mutex::new(None),
        })
    }

    /// Subscribes to `monitor`'s pressure transitions and resizes the
    /// concurrency semaphore to track `Pressure::desired_parallelism`.
    /// No-op if `config.adaptive_parallelism` is false.
    pub async fn start(self: &Arc<Self>, monitor: Option<Arc<dyn ResourceMonitor>>) {
        if !self.config.adaptive_parallelism {
            return;
        }
        let Some(monitor) = monitor else { return };

        let this = Arc::clone(self);
        let mut rx = monitor.subscribe();
        let mut guard = self.adapt_task.lock().await;
        *guard = Some(tokio::spawn(async move {
            loop {
                let pressure = *rx.borrow_and_update();
                this.adapt_to(pressure);
                if rx.changed().await.is_err() {
                    return;
                }
            }
        }));
    }

    /// Stops the adaptive-parallelism task, if running.
    pub async fn stop(self: &Arc<Self>) {
        if let Some(handle) = self.adapt_task.lock().await.take() {
            handle.abort();
        }
    }

    fn adapt_to(&self, pressure: Pressure) {
        let desired = pressure.desired_parallelism(self.config.max_parallel_tests);
        let granted = self.granted_permits.load(Ordering::Acquire);
        if desired > granted {
            self.semaphore.add_permits(desired - granted);
            self.granted_permits.store(desired, Ordering::Release);
        } else if desired < granted {
            // Best-effort: only forgets permits currently free. Any already
            // checked out keep running; the cap still converges as they
            // release and new acquisitions find fewer permits available.
            if let Ok(permit) = self.semaphore.clone().try_acquire_many_owned((granted - desired) as u32) {
                permit.forget();
                self.granted_permits.store(desired, Ordering::Release);
            }
        }
    }

    /// Runs `specs` concurrently, bounded by the runner's semaphore.
    pub async fn run_tests(self: &Arc<Self>, specs: Vec<TestSpec>, variables: HashMap<String, serde_json::Value>, fail_fast: bool) -> ParallelExecutionResult {
        let start = Instant::now();
        if specs.is_empty() {
            return ParallelExecutionResult::empty(None);
        }

        let total_tests = specs.len();
        let concurrent_count = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));
        let fail_fast_triggered = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let mut tasks = Vec::with_capacity(specs.len());
        for spec in specs {
            let this = Arc::clone(self);
            let variables = variables.clone();
            let concurrent_count = Arc::clone(&concurrent_count);
            let max_concurrent = Arc::clone(&max_concurrent);
            let fail_fast_triggered = Arc::clone(&fail_fast_triggered);

            tasks.push(tokio::spawn(async move {
                if fail_fast_triggered.load(Ordering::Acquire) {
                    return None;
                }
                let permit = this.semaphore.clone().acquire_owned().await.ok()?;
                let count = concurrent_count.fetch_add(1, Ordering::AcqRel) + 1;
                max_concurrent.fetch_max(count, Ordering::AcqRel);

                let result = this.execute_test(spec, variables).await;
                concurrent_count.fetch_sub(1, Ordering::AcqRel);
                drop(permit);

                if fail_fast && result.status == StepStatus::Failed {
                    fail_fast_triggered.store(true, Ordering::Release);
                }
                Some(result)
            }));
        }

        let mut result = ParallelExecutionResult::empty(None);
        result.total_tests = total_tests;
        for task in tasks {
            match task.await {
                Ok(Some(test_result)) => {
                    match test_result.status {
                        StepStatus::Passed => result.passed_tests += 1,
                        StepStatus::Failed => result.failed_tests += 1,
                        StepStatus::Skipped => result.skipped_tests += 1,
                    }
                    result.results.push(test_result);
                }
                Ok(None) => result.skipped_tests += 1,
                Err(_) => result.failed_tests += 1,
            }
        }

        result.max_parallelism_reached = max_concurrent.load(Ordering::Acquire);
        result.duration = start.elapsed();
        result
    }

    /// Runs `suite`, honoring its `parallel_execution`/`fail_fast` flags.
    pub async fn run_suite(self: &Arc<Self>, suite: TestSuite) -> ParallelExecutionResult {
        let mut result = if suite.parallel_execution {
            self.run_tests(suite.tests, suite.variables, suite.fail_fast).await
        } else {
            self.run_sequential(suite.tests, suite.variables, suite.fail_fast).await
        };
        result.suite_name = Some(suite.name);
        result
    }

    async fn run_sequential(self: &Arc<Self>, tests: Vec<TestSpec>, variables: HashMap<String, serde_json::Value>, fail_fast: bool) -> ParallelExecutionResult {
        let start = Instant::now();
        let mut result = ParallelExecutionResult::empty(None);
        result.total_tests = tests.len();
        result.max_parallelism_reached = if tests.is_empty() { 0 } else { 1 };

        for spec in tests {
            let test_result = self.execute_test(spec, variables.clone()).await;
            let failed = test_result.status == StepStatus::Failed;
            match test_result.status {
                StepStatus::Passed => result.passed_tests += 1,
                StepStatus::Failed => result.failed_tests += 1,
                StepStatus::Skipped => result.skipped_tests += 1,
            }
            result.results.push(test_result);
            if failed && fail_fast {
                break;
            }
        }

        result.duration = start.elapsed();
        result
    }

    /// Runs a single spec outside of any suite/batch, starting the runner's
    /// pool lazily if needed.
    pub async fn run_spec(self: &Arc<Self>, spec: TestSpec, variables: HashMap<String, serde_json::Value>) -> TestRunResult {
        self.execute_test(spec, variables).await
    }

    async fn execute_test(self: &Arc<Self>, spec: TestSpec, variables: HashMap<String, serde_json::Value>) -> TestRunResult {
        let start = Instant::now();
        let mut merged_variables = variables;
        merged_variables.extend(spec.variables.clone());

        let max_retries = spec.max_retries.unwrap_or(self.config.max_retries);
        let timeout = spec.timeout_seconds.map(Duration::from_secs).unwrap_or(self.config.default_timeout);
        let total_steps = spec.steps.len();
        let test_name = spec.name.clone();

        for attempt in 0..=max_retries {
            let guard = match self.pool.acquire(Some(test_name.clone()), None).await {
                Ok(guard) => guard,
                Err(err) => {
                    if attempt < max_retries && self.config.retry_on_infrastructure_failure {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(target: "qa_runner", test = %test_name, attempt, error = %err, "context acquisition failed, retrying");
                        tokio::time::sleep(RetryPolicy::linear_delay(attempt)).await;
                        continue;
                    }
                    let runner_error: RunnerError = RunnerError::PoolFailure(err.into());
                    return TestRunResult::failed(test_name, total_steps, runner_error.to_string(), start.elapsed());
                }
            };

            let cx = ExecutionContext {
                spec: spec.clone(),
                variables: merged_variables.clone(),
                context_id: guard.remote_id().to_string(),
            };

            let outcome = tokio::time::timeout(timeout, self.executor.clone().run_test(cx)).await;
            guard.release().await;

            return match outcome {
                Ok(result) => result,
                Err(_) => TestRunResult::failed(test_name, total_steps, format!("timed out after {}s", timeout.as_secs()), start.elapsed()),
            };
        }

        TestRunResult::failed(test_name, total_steps, "infrastructure retries exhausted", start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionContext;
    use crate::model::Action;
    use qa_pool::PoolConfig;
    use qa_transport::{RemoteConfig, Transport};
    use std::convert::Infallible;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn pool_against(server: &MockServer, size: usize) -> Arc<Pool> {
        Mock::given(method("POST"))
            .and(path("/execute/browser_create_context"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": {"context_id": "ctx-1"},
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/execute/browser_close_context"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true, "result": null})))
            .mount(server)
            .await;

        let remote = RemoteConfig::builder().with_base_url(server.uri()).with_max_concurrent(8usize).build().unwrap();
        let transport = Transport::new(remote).unwrap();
        let pool = Pool::new(PoolConfig::builder().with_min_size(size).with_max_size(size).build().unwrap(), transport, None);
        pool.start().await.unwrap();
        pool
    }

    /// A `StepExecutor` that always passes after a short sleep, tracking the
    /// highest number of tests it ever ran concurrently.
    fn counting_executor(gate: Arc<Semaphore>, peak: Arc<AtomicUsize>, inflight: Arc<AtomicUsize>) -> impl StepExecutor {
        tower::service_fn(move |cx: ExecutionContext| {
            let peak = Arc::clone(&peak);
            let inflight = Arc::clone(&inflight);
            let _gate = Arc::clone(&gate);
            async move {
                let count = inflight.fetch_add(1, Ordering::AcqRel) + 1;
                peak.fetch_max(count, Ordering::AcqRel);
                tokio::time::sleep(Duration::from_millis(20)).await;
                inflight.fetch_sub(1, Ordering::AcqRel);
                Ok::<_, Infallible>(TestRunResult::passed(cx.spec.name, Vec::new(), Duration::ZERO))
            }
        })
    }

    /// Always fails, for fail-fast coverage.
    fn failing_executor() -> impl StepExecutor {
        tower::service_fn(|cx: ExecutionContext| async move {
            Ok::<_, Infallible>(TestRunResult::failed(cx.spec.name, 1, "boom", Duration::ZERO))
        })
    }

    fn spec(name: &str) -> TestSpec {
        TestSpec::new(name, vec![Action::Navigate { url: "https://example.com".into() }])
    }

    #[tokio::test]
    async fn run_tests_respects_concurrency_cap() {
        let server = MockServer::start().await;
        let pool = pool_against(&server, 2).await;

        let peak = Arc::new(AtomicUsize::new(0));
        let inflight = Arc::new(AtomicUsize::new(0));
        let executor = counting_executor(Arc::new(Semaphore::new(2)), Arc::clone(&peak), inflight);

        let config = RunnerConfig::builder().with_max_parallel_tests(2usize).with_adaptive_parallelism(false).build().unwrap();
        let runner = AsyncTestRunner::new(pool, executor, config);

        let specs = (0..6).map(|i| spec(&format!("test-{i}"))).collect();
        let result = runner.run_tests(specs, HashMap::new(), false).await;

        assert_eq!(result.total_tests, 6);
        assert_eq!(result.passed_tests, 6);
        assert!(peak.load(Ordering::Acquire) <= 2);
        assert!(result.max_parallelism_reached <= 2);
    }

    #[tokio::test]
    async fn fail_fast_stops_launching_new_tests() {
        let server = MockServer::start().await;
        let pool = pool_against(&server, 1).await;

        let config = RunnerConfig::builder().with_max_parallel_tests(1usize).with_adaptive_parallelism(false).build().unwrap();
        let runner = AsyncTestRunner::new(pool, failing_executor(), config);

        let specs = (0..4).map(|i| spec(&format!("test-{i}"))).collect();
        let result = runner.run_tests(specs, HashMap::new(), true).await;

        assert_eq!(result.total_tests, 4);
        assert!(result.failed_tests + result.skipped_tests == 4);
        assert!(result.skipped_tests >= 1);
    }

    #[tokio::test]
    async fn run_suite_sequential_runs_one_at_a_time() {
        let server = MockServer::start().await;
        let pool = pool_against(&server, 3).await;

        let peak = Arc::new(AtomicUsize::new(0));
        let inflight = Arc::new(AtomicUsize::new(0));
        let executor = counting_executor(Arc::new(Semaphore::new(3)), Arc::clone(&peak), inflight);

        let config = RunnerConfig::builder().with_max_parallel_tests(3usize).with_adaptive_parallelism(false).build().unwrap();
        let runner = AsyncTestRunner::new(pool, executor, config);

        let mut suite = TestSuite::new("suite", (0..3).map(|i| spec(&format!("test-{i}"))).collect());
        suite.parallel_execution = false;
        let result = runner.run_suite(suite).await;

        assert_eq!(result.suite_name.as_deref(), Some("suite"));
        assert_eq!(result.passed_tests, 3);
        assert_eq!(peak.load(Ordering::Acquire), 1);
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let server = MockServer::start().await;
        let pool = pool_against(&server, 1).await;
        let config = RunnerConfig::default();
        let runner = AsyncTestRunner::new(pool, failing_executor(), config);

        let result = runner.run_tests(Vec::new(), HashMap::new(), false).await;
        assert_eq!(result.total_tests, 0);
        assert!(result.is_success());
    }
}
