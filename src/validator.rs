//! Validator module for fast syntax checks
//!
//! Runs only the compile step of the judging pipeline, with the same
//! artifact handling, and reports whether the source compiles.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn, Instrument, Span};

use crate::config::JudgeConfig;
use crate::engine::{compile, Artifacts};

/// Result of validating a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Check whether `code` compiles. Never fails: engine faults are reported
/// as `valid: false` with the fault description.
pub async fn validate(config: &JudgeConfig, code: &str) -> ValidationResult {
    let span = info_span!("validate", submission = tracing::field::Empty);

    match check_compiles(config, code).instrument(span).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Validation could not run: {:#}", e);
            ValidationResult {
                valid: false,
                error: Some(format!("{:#}", e)),
            }
        }
    }
}

async fn check_compiles(config: &JudgeConfig, code: &str) -> Result<ValidationResult> {
    let artifacts = Artifacts::materialize(&config.scratch_dir, code).await?;
    Span::current().record("submission", artifacts.id());

    let compiled = compile(config, artifacts.source_path(), artifacts.binary_path()).await?;
    debug!("Validation finished: valid={}", compiled.success);

    Ok(ValidationResult {
        valid: compiled.success,
        error: compiled.message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Verdict;
    use crate::judger::{judge, JudgeRequest};

    fn gcc_available() -> bool {
        std::process::Command::new("gcc")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_validation_result_serialization() {
        let json = serde_json::to_string(&ValidationResult {
            valid: true,
            error: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"valid":true}"#);
    }

    #[tokio::test]
    async fn test_validate_valid_and_invalid() {
        if !gcc_available() {
            eprintln!("gcc not found, skipping");
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = JudgeConfig::with_scratch_dir(scratch.path());

        let ok = validate(&config, "int main(void) { return 0; }").await;
        assert!(ok.valid);
        assert!(ok.error.is_none());

        let bad = validate(&config, "int main(void) { return 0 }").await;
        assert!(!bad.valid);
        assert!(!bad.error.unwrap().is_empty());

        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_validate_agrees_with_judge_compile_step() {
        if !gcc_available() {
            eprintln!("gcc not found, skipping");
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = JudgeConfig::with_scratch_dir(scratch.path());
        let sources = [
            "int main(void) { return 0; }",
            "#include <math.h>\nint main(void) { return (int)sqrt(4.0) - 2; }",
            "int main(void) { undeclared(); return 0; }",
            "this is not c",
            "",
        ];

        for code in sources {
            let validation = validate(&config, code).await;
            let judged = judge(
                &config,
                &JudgeRequest {
                    code: code.to_string(),
                    test_cases: vec![],
                },
            )
            .await;

            assert_eq!(
                validation.valid,
                judged.verdict != Verdict::CompileError,
                "disagreement on {:?}",
                code
            );
        }
    }

    #[tokio::test]
    async fn test_validate_engine_fault() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let config = JudgeConfig::with_scratch_dir(blocker.join("scratch"));

        let result = validate(&config, "int main(void) { return 0; }").await;

        assert!(!result.valid);
        assert!(result.error.unwrap().contains("scratch directory"));
    }
}
