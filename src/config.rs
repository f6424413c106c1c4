//! Run configuration with per-field defaults and TOML loading.
//!
//! # Configuration File Format
//!
//! ```toml
//! [run]
//! probe_concurrency = 4
//! evaluation_concurrency = 4
//! completion_concurrency = 2
//! task_timeout_secs = 120
//! max_attempts = 3
//! backoff_base_ms = 500
//! backoff_cap_ms = 8000
//! max_rounds = 1
//! ```
//!
//! Every field is optional; absent fields take the defaults below.

use crate::executor::ExecutorConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_probe_concurrency() -> usize {
    4
}

fn default_evaluation_concurrency() -> usize {
    4
}

fn default_completion_concurrency() -> usize {
    2
}

fn default_task_timeout_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_cap_ms() -> u64 {
    8_000
}

fn default_max_rounds() -> u32 {
    1
}

/// Tuning for one speculative run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum pilots probing simultaneously.
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
    /// Maximum evaluations running simultaneously.
    #[serde(default = "default_evaluation_concurrency")]
    pub evaluation_concurrency: usize,
    /// Maximum pilots completing simultaneously (typically smaller).
    #[serde(default = "default_completion_concurrency")]
    pub completion_concurrency: usize,
    /// Per-attempt timeout for provider and evaluator calls, in seconds.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
    /// Attempt ceiling per task, including the first attempt.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff after the first failed attempt, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Ceiling on any single backoff delay, in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    /// Maximum probe/evaluate/reallocate rounds before completion.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            probe_concurrency: default_probe_concurrency(),
            evaluation_concurrency: default_evaluation_concurrency(),
            completion_concurrency: default_completion_concurrency(),
            task_timeout_secs: default_task_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            max_rounds: default_max_rounds(),
        }
    }
}

impl RunConfig {
    pub fn with_probe_concurrency(mut self, n: usize) -> Self {
        self.probe_concurrency = n;
        self
    }

    pub fn with_evaluation_concurrency(mut self, n: usize) -> Self {
        self.evaluation_concurrency = n;
        self
    }

    pub fn with_completion_concurrency(mut self, n: usize) -> Self {
        self.completion_concurrency = n;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base_ms = base.as_millis() as u64;
        self.backoff_cap_ms = cap.as_millis() as u64;
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    /// Executor tuning shared by all phases; each phase overrides the
    /// concurrency ceiling with its own.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::default()
            .with_task_timeout(self.task_timeout())
            .with_max_attempts(self.max_attempts)
            .with_backoff(self.backoff_base(), self.backoff_cap())
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.probe_concurrency == 0
            || self.evaluation_concurrency == 0
            || self.completion_concurrency == 0
        {
            anyhow::bail!("concurrency ceilings must be at least 1");
        }
        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }
        if self.max_rounds == 0 {
            anyhow::bail!("max_rounds must be at least 1");
        }
        if self.task_timeout_secs == 0 {
            anyhow::bail!("task_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Parse from a TOML document with a `[run]` section.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).context("Failed to parse run config")?;
        let config = file.run;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    run: RunConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.probe_concurrency, 4);
        assert_eq!(config.completion_concurrency, 2);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_rounds, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = RunConfig::default()
            .with_probe_concurrency(8)
            .with_completion_concurrency(1)
            .with_task_timeout(Duration::from_secs(30))
            .with_backoff(Duration::from_millis(10), Duration::from_millis(100))
            .with_max_rounds(3);

        assert_eq!(config.probe_concurrency, 8);
        assert_eq!(config.task_timeout(), Duration::from_secs(30));
        assert_eq!(config.backoff_base(), Duration::from_millis(10));
        assert_eq!(config.max_rounds, 3);
    }

    #[test]
    fn test_executor_config_carries_tuning() {
        let config = RunConfig::default()
            .with_task_timeout(Duration::from_secs(7))
            .with_max_attempts(5);
        let exec = config.executor_config();
        assert_eq!(exec.task_timeout, Duration::from_secs(7));
        assert_eq!(exec.max_attempts, 5);
    }

    #[test]
    fn test_parse_toml_partial() {
        let config = RunConfig::from_toml_str(
            r#"
[run]
probe_concurrency = 6
max_rounds = 2
"#,
        )
        .unwrap();
        assert_eq!(config.probe_concurrency, 6);
        assert_eq!(config.max_rounds, 2);
        // Unspecified fields keep their defaults.
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_parse_toml_empty_document() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert_eq!(config.probe_concurrency, 4);
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        assert!(
            RunConfig::default()
                .with_probe_concurrency(0)
                .validate()
                .is_err()
        );
        assert!(RunConfig::default().with_max_attempts(0).validate().is_err());
        assert!(RunConfig::default().with_max_rounds(0).validate().is_err());
    }

    #[test]
    fn test_from_toml_rejects_invalid_values() {
        let result = RunConfig::from_toml_str(
            r#"
[run]
max_attempts = 0
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.max_rounds, 1);
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "[run]\ncompletion_concurrency = 1\n").unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.completion_concurrency, 1);
    }
}
