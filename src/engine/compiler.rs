//! Compiler module - C source compilation
//!
//! Runs the configured toolchain on a materialized source file. A timeout or
//! a nonzero exit is a compile failure carrying the diagnostic text; warnings
//! with a zero exit are logged and otherwise ignored.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::JudgeConfig;
use crate::engine::executer::{
    execute, signal_name, ExecutionLimits, ExecutionSpec, ExecutionStatus,
};

/// Result of a compilation attempt
#[derive(Debug)]
pub struct CompileResult {
    pub success: bool,
    pub message: Option<String>,
}

/// Build the compiler argument list: flags, `-o <binary>`, source, link flags
pub fn compile_args(config: &JudgeConfig, source_path: &Path, binary_path: &Path) -> Vec<String> {
    let mut args = config.compile_flags.clone();
    args.push("-o".to_string());
    args.push(binary_path.to_string_lossy().into_owned());
    args.push(source_path.to_string_lossy().into_owned());
    args.extend(config.link_flags.iter().cloned());
    args
}

/// Compile `source_path` into `binary_path`.
///
/// Returns `Err` only when the toolchain cannot be run at all.
pub async fn compile(
    config: &JudgeConfig,
    source_path: &Path,
    binary_path: &Path,
) -> Result<CompileResult> {
    let args = compile_args(config, source_path, binary_path);
    debug!("Compiling with {} {:?}", config.compiler, args);

    let mut spec = ExecutionSpec::new(&config.compiler)
        .with_args(args)
        .with_limits(ExecutionLimits {
            timeout: config.compile_timeout(),
            output_limit_bytes: config.output_limit_bytes,
        });
    if let Some(dir) = source_path.parent() {
        spec = spec.with_work_dir(dir);
    }

    let result = execute(&spec)
        .await
        .with_context(|| format!("Failed to run compiler {}", config.compiler))?;

    if result.is_success() {
        if !result.stderr.trim().is_empty() {
            warn!(
                "Compiler warnings for {:?}:\n{}",
                source_path,
                result.stderr.trim_end()
            );
        }
        return Ok(CompileResult {
            success: true,
            message: None,
        });
    }

    let error_msg = match result.status {
        ExecutionStatus::TimeLimitExceeded => format!(
            "Compilation timed out after {}ms",
            config.compile_timeout_ms
        ),
        _ if !result.stderr.is_empty() => result.stderr,
        _ if !result.stdout.is_empty() => result.stdout,
        ExecutionStatus::Signaled(sig) => format!("Compiler crashed ({})", signal_name(sig)),
        ExecutionStatus::Exited(code) => format!("Compilation failed with exit code {}", code),
        ExecutionStatus::OutputLimitExceeded => "Compiler output exceeded limit".to_string(),
    };

    debug!("Compilation of {:?} failed: {}", source_path, error_msg);

    Ok(CompileResult {
        success: false,
        message: Some(error_msg),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::workspace::Artifacts;
    use std::path::PathBuf;

    fn gcc_available() -> bool {
        std::process::Command::new("gcc")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_compile_args_order() {
        let config = JudgeConfig::default();
        let args = compile_args(
            &config,
            &PathBuf::from("/scratch/a.c"),
            &PathBuf::from("/scratch/a"),
        );

        assert_eq!(
            args,
            vec!["-O2", "-Wall", "-std=c11", "-o", "/scratch/a", "/scratch/a.c", "-lm"]
        );
    }

    #[tokio::test]
    async fn test_compile_success_with_warnings() {
        if !gcc_available() {
            eprintln!("gcc not found, skipping");
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = JudgeConfig::with_scratch_dir(scratch.path());
        // unused variable triggers -Wall
        let code = "int main(void) { int unused; return 0; }\n";
        let artifacts = Artifacts::materialize(scratch.path(), code).await.unwrap();

        let result = compile(&config, artifacts.source_path(), artifacts.binary_path())
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.message.is_none());
        assert!(artifacts.binary_path().exists());
    }

    #[tokio::test]
    async fn test_compile_syntax_error() {
        if !gcc_available() {
            eprintln!("gcc not found, skipping");
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = JudgeConfig::with_scratch_dir(scratch.path());
        let artifacts = Artifacts::materialize(scratch.path(), "int main( { return 0 }")
            .await
            .unwrap();

        let result = compile(&config, artifacts.source_path(), artifacts.binary_path())
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.message.unwrap().contains("error"));
    }

    #[tokio::test]
    async fn test_compile_timeout() {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = JudgeConfig::with_scratch_dir(scratch.path());
        // A stand-in toolchain that never finishes
        config.compiler = "/bin/sh".to_string();
        config.compile_flags = vec!["-c".into(), "sleep 30".into()];
        config.compile_timeout_ms = 200;

        let result = compile(
            &config,
            &scratch.path().join("x.c"),
            &scratch.path().join("x"),
        )
        .await
        .unwrap();

        assert!(!result.success);
        assert_eq!(
            result.message.as_deref(),
            Some("Compilation timed out after 200ms")
        );
    }

    #[tokio::test]
    async fn test_missing_compiler_is_an_error() {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = JudgeConfig::with_scratch_dir(scratch.path());
        config.compiler = "/nonexistent/cc".to_string();

        let result = compile(
            &config,
            &scratch.path().join("x.c"),
            &scratch.path().join("x"),
        )
        .await;

        tokio_test::assert_err!(result);
    }
}
