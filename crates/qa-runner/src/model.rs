use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single DSL step. Closed set: a DSL source produces these, the runner
/// neither parses nor validates the DSL that generated them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Navigate { url: String },
    Click { selector: String },
    Fill { selector: String, value: String },
    Select { selector: String, value: String },
    Hover { selector: String },
    Scroll { selector: Option<String>, dx: i64, dy: i64 },
    KeyPress { selector: Option<String>, key: String },
    Wait { selector: Option<String>, timeout_ms: Option<u64> },
    AssertText { selector: String, expected: String },
    AssertVisible { selector: String },
    Extract { selector: String, variable: String },
}

impl Action {
    /// A short label for `StepResult`/log output; not the DSL's own name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
            Self::Select { .. } => "select",
            Self::Hover { .. } => "hover",
            Self::Scroll { .. } => "scroll",
            Self::KeyPress { .. } => "key_press",
            Self::Wait { .. } => "wait",
            Self::AssertText { .. } => "assert_text",
            Self::AssertVisible { .. } => "assert_visible",
            Self::Extract { .. } => "extract",
        }
    }
}

/// A named sequence of steps, externally produced and immutable here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    pub name: String,
    pub steps: Vec<Action>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl TestSpec {
    pub fn new(name: impl Into<String>, steps: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            steps,
            variables: HashMap::new(),
            timeout_seconds: None,
            max_retries: None,
        }
    }
}

/// A group of `TestSpec`s sharing suite-level variables and execution mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuite {
    pub name: String,
    pub tests: Vec<TestSpec>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
    #[serde(default = "default_true")]
    pub parallel_execution: bool,
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_true() -> bool {
    true
}

impl TestSuite {
    pub fn new(name: impl Into<String>, tests: Vec<TestSpec>) -> Self {
        Self {
            name: name.into(),
            tests,
            variables: HashMap::new(),
            parallel_execution: true,
            fail_fast: false,
        }
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

/// Per-step execution detail, appended to a `TestRunResult`.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub kind: &'static str,
    pub status: StepStatus,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Outcome of one `TestSpec` run.
#[derive(Debug, Clone)]
pub struct TestRunResult {
    pub test_name: String,
    pub status: StepStatus,
    pub steps: Vec<StepResult>,
    pub total_steps: usize,
    pub error: Option<String>,
    pub duration: Duration,
    pub retry_count: u32,
}

impl TestRunResult {
    pub fn passed(test_name: impl Into<String>, steps: Vec<StepResult>, duration: Duration) -> Self {
        let total_steps = steps.len();
        Self {
            test_name: test_name.into(),
            status: StepStatus::Passed,
            steps,
            total_steps,
            error: None,
            duration,
            retry_count: 0,
        }
    }

    pub fn failed(test_name: impl Into<String>, total_steps: usize, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            test_name: test_name.into(),
            status: StepStatus::Failed,
            steps: Vec::new(),
            total_steps,
            error: Some(error.into()),
            duration,
            retry_count: 0,
        }
    }
}
