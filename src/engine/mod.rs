//! Engine module - compile and run submissions
//!
//! - `workspace`: per-submission source/binary files and their cleanup
//! - `compiler`: toolchain invocation under the compile timeout
//! - `executer`: process execution with timeout and output cap
//!
//! The engine module does NOT:
//! - Compare outputs or determine verdicts
//! - Know about jobs or the worker protocol

pub mod compiler;
pub mod executer;
pub mod workspace;

pub use compiler::{compile, CompileResult};
pub use executer::{execute, ExecutionLimits, ExecutionOutcome, ExecutionSpec, ExecutionStatus};
pub use workspace::Artifacts;
