use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict from judging a whole submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    /// Covers mismatched output, time limit and program crashes alike.
    /// The per-test `error` field is where those are told apart.
    WrongAnswer,
    CompileError,
    /// Engine fault (scratch directory, spawn failure), never a program crash
    RuntimeError,
}

impl Verdict {
    /// Resolve the submission verdict from the statuses of the executed tests.
    ///
    /// Only called once compilation succeeded. An empty run is accepted.
    pub fn from_test_statuses(statuses: impl IntoIterator<Item = TestStatus>) -> Self {
        if statuses.into_iter().any(|s| s == TestStatus::Failed) {
            Verdict::WrongAnswer
        } else {
            Verdict::Accepted
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Accepted => "accepted",
            Verdict::WrongAnswer => "wrong_answer",
            Verdict::CompileError => "compile_error",
            Verdict::RuntimeError => "runtime_error",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a single test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
        }
    }
}
