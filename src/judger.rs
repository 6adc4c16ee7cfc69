//! Judger module for processing submissions
//!
//! Materializes the source, compiles it, runs it against each test case in
//! order and stops at the first failure. Whatever happens, the caller gets a
//! complete `JudgeResult`, and the submission's files are removed on the way
//! out.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error, info, info_span, Instrument, Span};

use crate::config::JudgeConfig;
use crate::core::utils::output_preview;
use crate::core::{TestStatus, Verdict};
use crate::engine::executer::{
    execute, signal_name, ExecutionLimits, ExecutionOutcome, ExecutionSpec, ExecutionStatus,
};
use crate::engine::{compile, Artifacts};

pub const TIME_LIMIT_EXCEEDED: &str = "Time Limit Exceeded";
pub const OUTPUT_LIMIT_EXCEEDED: &str = "Output Limit Exceeded";
pub const RUNTIME_ERROR: &str = "Runtime Error";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    /// Expected output, compared after trimming
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub code: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// 1-based position in the request
    pub test_case: usize,
    pub status: TestStatus,
    /// Wall time in ms; the timeout ceiling for timed-out runs
    pub execution_time: u64,
    /// Program stdout, truncated to a preview
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    /// Attached on output mismatch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of judging a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeResult {
    pub verdict: Verdict,
    /// Sum of execution times over the tests that ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    /// Placeholder, memory is not measured
    pub memory_usage: u64,
    pub test_results: Vec<TestCaseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_error: Option<String>,
    /// Engine fault description, only for `runtime_error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JudgeResult {
    fn compile_error(config: &JudgeConfig, diagnostic: String) -> Self {
        Self {
            verdict: Verdict::CompileError,
            execution_time: None,
            memory_usage: config.memory_placeholder_kb,
            test_results: vec![],
            compile_error: Some(diagnostic),
            error_message: None,
        }
    }

    fn engine_fault(config: &JudgeConfig, err: &anyhow::Error) -> Self {
        Self {
            verdict: Verdict::RuntimeError,
            execution_time: None,
            memory_usage: config.memory_placeholder_kb,
            test_results: vec![],
            compile_error: None,
            error_message: Some(format!("{:#}", err)),
        }
    }
}

/// Judge a submission. Never fails: engine faults become `runtime_error`.
pub async fn judge(config: &JudgeConfig, request: &JudgeRequest) -> JudgeResult {
    let span = info_span!(
        "judge",
        submission = tracing::field::Empty,
        tests = request.test_cases.len()
    );

    match run_pipeline(config, request).instrument(span.clone()).await {
        Ok(result) => result,
        Err(e) => {
            span.in_scope(|| error!("Judge pipeline failed: {:#}", e));
            JudgeResult::engine_fault(config, &e)
        }
    }
}

async fn run_pipeline(config: &JudgeConfig, request: &JudgeRequest) -> Result<JudgeResult> {
    let artifacts = Artifacts::materialize(&config.scratch_dir, &request.code).await?;
    Span::current().record("submission", artifacts.id());

    let compiled = compile(config, artifacts.source_path(), artifacts.binary_path()).await?;
    if !compiled.success {
        info!("Compilation failed");
        let diagnostic = compiled
            .message
            .unwrap_or_else(|| "Compilation failed".to_string());
        return Ok(JudgeResult::compile_error(config, diagnostic));
    }

    let mut test_results = Vec::with_capacity(request.test_cases.len());
    for (idx, tc) in request.test_cases.iter().enumerate() {
        let result = run_test_case(config, artifacts.binary_path(), idx + 1, tc).await?;

        debug!(
            "Test {}: status={}, time_ms={}",
            result.test_case, result.status, result.execution_time
        );

        let failed = result.status == TestStatus::Failed;
        test_results.push(result);
        if failed {
            break;
        }
    }

    let verdict = Verdict::from_test_statuses(test_results.iter().map(|r| r.status));
    let execution_time: u64 = test_results.iter().map(|r| r.execution_time).sum();

    info!(
        "Judge summary: verdict={}, executed={}/{}, total_time_ms={}",
        verdict,
        test_results.len(),
        request.test_cases.len(),
        execution_time
    );

    Ok(JudgeResult {
        verdict,
        execution_time: Some(execution_time),
        memory_usage: config.memory_placeholder_kb,
        test_results,
        compile_error: None,
        error_message: None,
    })
}

async fn run_test_case(
    config: &JudgeConfig,
    binary_path: &Path,
    number: usize,
    test_case: &TestCase,
) -> Result<TestCaseResult> {
    let mut spec = ExecutionSpec::new(binary_path)
        .with_limits(ExecutionLimits {
            timeout: config.execution_timeout(),
            output_limit_bytes: config.output_limit_bytes,
        })
        .with_stdin(test_case.input.as_str());
    if let Some(dir) = binary_path.parent() {
        spec = spec.with_work_dir(dir);
    }

    let outcome = execute(&spec).await?;
    Ok(evaluate_outcome(
        number,
        outcome,
        test_case,
        config.execution_timeout_ms,
    ))
}

/// Turn one execution outcome into a test result
pub fn evaluate_outcome(
    number: usize,
    outcome: ExecutionOutcome,
    test_case: &TestCase,
    timeout_ms: u64,
) -> TestCaseResult {
    let mut result = TestCaseResult {
        test_case: number,
        status: TestStatus::Failed,
        execution_time: outcome.elapsed_ms,
        actual_output: (!outcome.stdout.is_empty()).then(|| output_preview(&outcome.stdout)),
        expected_output: None,
        error: None,
    };
    let stderr = outcome.stderr.trim();

    match outcome.status {
        ExecutionStatus::TimeLimitExceeded => {
            result.execution_time = timeout_ms;
            result.error = Some(TIME_LIMIT_EXCEEDED.to_string());
        }
        ExecutionStatus::OutputLimitExceeded => {
            result.error = Some(OUTPUT_LIMIT_EXCEEDED.to_string());
        }
        ExecutionStatus::Signaled(sig) => {
            result.error = Some(if stderr.is_empty() {
                format!("{} ({})", RUNTIME_ERROR, signal_name(sig))
            } else {
                stderr.to_string()
            });
        }
        ExecutionStatus::Exited(code) if code != 0 => {
            result.error = Some(if stderr.is_empty() {
                format!("{} (exit code {})", RUNTIME_ERROR, code)
            } else {
                stderr.to_string()
            });
        }
        ExecutionStatus::Exited(_) if !stderr.is_empty() => {
            result.error = Some(stderr.to_string());
        }
        ExecutionStatus::Exited(_) => {
            if compare_output(&outcome.stdout, &test_case.output) {
                result.status = TestStatus::Passed;
            } else {
                result.actual_output = Some(output_preview(&outcome.stdout));
                result.expected_output = Some(output_preview(&test_case.output));
            }
        }
    }

    result
}

/// Exact equality after trimming leading and trailing whitespace.
///
/// Internal whitespace and line endings are significant.
pub fn compare_output(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}
