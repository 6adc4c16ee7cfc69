//! C judge engine
//!
//! Compiles untrusted C submissions, runs them against test cases under a
//! per-test timeout and output cap, and reduces the outcome to a verdict.
//!
//! Entry points are [`judger::judge`] and [`validator::validate`]; both are
//! infallible and always clean up the submission's files.

pub mod config;
pub mod core;
pub mod engine;
pub mod jobs;
pub mod judger;
pub mod validator;

pub use config::JudgeConfig;
pub use core::{TestStatus, Verdict};
pub use judger::{judge, JudgeRequest, JudgeResult, TestCase, TestCaseResult};
pub use validator::{validate, ValidationResult};
