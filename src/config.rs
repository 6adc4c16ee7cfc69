//! Judge configuration
//!
//! Limits and toolchain settings for the judge engine, loaded from an
//! optional TOML file and then overridden by environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("judge configuration already initialized")]
    AlreadyInitialized,
}

/// Judge engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Shared directory holding per-submission source files and binaries
    pub scratch_dir: PathBuf,
    /// C compiler executable
    pub compiler: String,
    /// Flags placed before the source path (optimization, warnings, standard)
    pub compile_flags: Vec<String>,
    /// Flags placed after the source path (libraries)
    pub link_flags: Vec<String>,
    /// Compile time limit in milliseconds (default: 10000ms)
    pub compile_timeout_ms: u64,
    /// Per-test wall time limit in milliseconds (default: 5000ms)
    pub execution_timeout_ms: u64,
    /// Cap on captured stdout/stderr per test, in bytes (default: 1MB)
    pub output_limit_bytes: usize,
    /// Reported memory figure. Memory is not measured.
    pub memory_placeholder_kb: u64,
    /// Optional cap on concurrently running jobs in the worker binary
    pub max_concurrent_jobs: Option<usize>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("cjudge"),
            compiler: "gcc".to_string(),
            compile_flags: vec!["-O2".into(), "-Wall".into(), "-std=c11".into()],
            link_flags: vec!["-lm".into()],
            compile_timeout_ms: 10_000,
            execution_timeout_ms: 5_000,
            output_limit_bytes: 1024 * 1024,
            memory_placeholder_kb: 0,
            max_concurrent_jobs: None,
        }
    }
}

impl JudgeConfig {
    /// Config rooted at a specific scratch directory, other fields default
    pub fn with_scratch_dir(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            ..Self::default()
        }
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    /// Parse a TOML config file. Missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `JUDGE_CONFIG` (if set) then apply environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var("JUDGE_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `JUDGE_*` overrides obtained through `lookup`
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = lookup("JUDGE_SCRATCH_DIR") {
            self.scratch_dir = PathBuf::from(dir);
        }
        if let Some(compiler) = lookup("JUDGE_COMPILER") {
            self.compiler = compiler;
        }
        if let Some(flags) = lookup("JUDGE_COMPILE_FLAGS") {
            self.compile_flags = flags.split_whitespace().map(String::from).collect();
        }
        if let Some(ms) = parse_env(&lookup, "JUDGE_COMPILE_TIMEOUT_MS")? {
            self.compile_timeout_ms = ms;
        }
        if let Some(ms) = parse_env(&lookup, "JUDGE_EXECUTION_TIMEOUT_MS")? {
            self.execution_timeout_ms = ms;
        }
        if let Some(bytes) = parse_env(&lookup, "JUDGE_OUTPUT_LIMIT_BYTES")? {
            self.output_limit_bytes = bytes;
        }
        if let Some(jobs) = parse_env::<usize>(&lookup, "JUDGE_MAX_CONCURRENT_JOBS")? {
            self.max_concurrent_jobs = Some(jobs);
        }
        // 0 means unbounded, whichever source it came from
        self.max_concurrent_jobs = self.max_concurrent_jobs.filter(|&n| n > 0);
        Ok(self)
    }
}

fn parse_env<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { key, value }),
    }
}

/// Global judge configuration
static JUDGE_CONFIG: OnceLock<JudgeConfig> = OnceLock::new();

/// Install the process-wide configuration
pub fn init_config(config: JudgeConfig) -> Result<(), ConfigError> {
    JUDGE_CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Get the process-wide configuration
pub fn get_config() -> &'static JudgeConfig {
    JUDGE_CONFIG.get().unwrap_or_else(|| {
        static DEFAULT: OnceLock<JudgeConfig> = OnceLock::new();

        warn!("Judge configuration not initialized, using default");
        DEFAULT.get_or_init(JudgeConfig::default)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = JudgeConfig::default();
        assert_eq!(config.compile_timeout(), Duration::from_secs(10));
        assert_eq!(config.execution_timeout(), Duration::from_secs(5));
        assert_eq!(config.output_limit_bytes, 1_048_576);
        assert_eq!(config.compiler, "gcc");
        assert!(config.max_concurrent_jobs.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = JudgeConfig::default()
            .apply_overrides(lookup_from(&[
                ("JUDGE_SCRATCH_DIR", "/var/tmp/judge"),
                ("JUDGE_COMPILE_FLAGS", "-O0  -g"),
                ("JUDGE_EXECUTION_TIMEOUT_MS", "250"),
                ("JUDGE_MAX_CONCURRENT_JOBS", "4"),
            ]))
            .unwrap();

        assert_eq!(config.scratch_dir, PathBuf::from("/var/tmp/judge"));
        assert_eq!(config.compile_flags, vec!["-O0", "-g"]);
        assert_eq!(config.execution_timeout_ms, 250);
        assert_eq!(config.max_concurrent_jobs, Some(4));
    }

    #[test]
    fn test_zero_concurrency_means_unbounded() {
        let config = JudgeConfig::default()
            .apply_overrides(lookup_from(&[("JUDGE_MAX_CONCURRENT_JOBS", "0")]))
            .unwrap();
        assert!(config.max_concurrent_jobs.is_none());
    }

    #[test]
    fn test_invalid_env_value() {
        let err = JudgeConfig::default()
            .apply_overrides(lookup_from(&[("JUDGE_COMPILE_TIMEOUT_MS", "ten")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                key: "JUDGE_COMPILE_TIMEOUT_MS",
                ..
            }
        ));
    }

    #[test]
    fn test_toml_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
compiler = "clang"
execution_timeout_ms = 1500
"#
        )
        .unwrap();

        let config = JudgeConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.compiler, "clang");
        assert_eq!(config.execution_timeout_ms, 1500);
        assert_eq!(config.compile_timeout_ms, 10_000);
    }

    #[test]
    fn test_toml_zero_concurrency_means_unbounded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrent_jobs = 0").unwrap();

        let config = JudgeConfig::from_toml_file(file.path())
            .unwrap()
            .apply_overrides(lookup_from(&[]))
            .unwrap();
        assert!(config.max_concurrent_jobs.is_none());
    }

    #[test]
    fn test_toml_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "compile_timeout_ms = \"soon\"").unwrap();

        let err = JudgeConfig::from_toml_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
