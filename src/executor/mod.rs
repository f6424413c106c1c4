//! Bounded-concurrency phase execution with per-task timeout, retry, and
//! failure isolation.
//!
//! A phase is a batch of independent pilot-scoped tasks. At most
//! `max_concurrency` run simultaneously; each attempt runs under its own
//! timeout; transient failures retry with exponential backoff up to an
//! attempt ceiling. One task's failure never aborts the phase; the phase is
//! complete when every task has reached a terminal outcome.

use crate::pilot::PilotId;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default simultaneous tasks per phase.
const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default per-attempt timeout (2 minutes).
const DEFAULT_TASK_TIMEOUT_SECS: u64 = 120;

/// Default attempt ceiling per task.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default backoff after the first failed attempt.
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Default ceiling on any single backoff delay.
const DEFAULT_BACKOFF_CAP_MS: u64 = 8_000;

/// Tuning for one executor phase.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum tasks running simultaneously.
    pub max_concurrency: usize,
    /// Timeout applied to each individual attempt.
    pub task_timeout: Duration,
    /// Attempt ceiling per task (including the first attempt).
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each retry.
    pub backoff_base: Duration,
    /// Ceiling on any single backoff delay.
    pub backoff_cap: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            task_timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            backoff_cap: Duration::from_millis(DEFAULT_BACKOFF_CAP_MS),
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }
}

/// Error returned by one task attempt.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// Worth another attempt.
    #[error("{0}")]
    Retryable(String),
    /// Retrying cannot help.
    #[error("{0}")]
    Fatal(String),
}

/// Terminal failure of a task after all attempts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskFailure {
    #[error("timed out on all {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("{message}")]
    Fatal { message: String },
}

/// Terminal outcome of one task.
#[derive(Debug)]
pub struct TaskOutcome<T> {
    pub pilot_id: PilotId,
    pub outcome: Result<T, TaskFailure>,
}

impl<T> TaskOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs a list of independent pilot-scoped tasks under a concurrency ceiling.
pub struct PhaseExecutor {
    config: ExecutorConfig,
}

impl PhaseExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ExecutorConfig::default())
    }

    /// Run all tasks to terminal outcomes. Results preserve input order.
    ///
    /// Each task is a closure invoked once per attempt (the attempt number is
    /// passed in, starting at 1), so a retried task can resume from state it
    /// shares with the caller rather than redoing paid work.
    pub async fn run_phase<T, F, Fut>(&self, tasks: Vec<(PilotId, F)>) -> Vec<TaskOutcome<T>>
    where
        T: Send + 'static,
        F: Fn(u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let handles: Vec<_> = tasks
            .into_iter()
            .map(|(pilot_id, op)| {
                let semaphore = semaphore.clone();
                let config = self.config.clone();
                let id = pilot_id.clone();
                let handle = tokio::spawn(async move {
                    // The semaphore is never closed; a failed acquire only
                    // means we run unthrottled.
                    let _permit = semaphore.acquire_owned().await.ok();
                    run_task(id, op, &config).await
                });
                (pilot_id, handle)
            })
            .collect();

        let (ids, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        ids.into_iter()
            .zip(joined)
            .map(|(pilot_id, res)| match res {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(pilot = %pilot_id, error = %e, "task aborted before completion");
                    TaskOutcome {
                        pilot_id,
                        outcome: Err(TaskFailure::Fatal {
                            message: format!("task aborted: {e}"),
                        }),
                    }
                }
            })
            .collect()
    }
}

/// Drive one task through its attempts to a terminal outcome.
async fn run_task<T, F, Fut>(pilot_id: PilotId, op: F, config: &ExecutorConfig) -> TaskOutcome<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, TaskError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_error: Option<String> = None;
    let mut timed_out_only = true;

    for attempt in 1..=max_attempts {
        match timeout(config.task_timeout, op(attempt)).await {
            Ok(Ok(value)) => {
                debug!(pilot = %pilot_id, attempt, "task succeeded");
                return TaskOutcome {
                    pilot_id,
                    outcome: Ok(value),
                };
            }
            Ok(Err(TaskError::Fatal(message))) => {
                warn!(pilot = %pilot_id, attempt, %message, "task failed fatally");
                return TaskOutcome {
                    pilot_id,
                    outcome: Err(TaskFailure::Fatal { message }),
                };
            }
            Ok(Err(TaskError::Retryable(message))) => {
                warn!(pilot = %pilot_id, attempt, %message, "task attempt failed");
                timed_out_only = false;
                last_error = Some(message);
            }
            Err(_) => {
                warn!(
                    pilot = %pilot_id,
                    attempt,
                    timeout = ?config.task_timeout,
                    "task attempt timed out"
                );
                last_error = Some(format!("attempt {attempt} timed out"));
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(backoff_delay(config, attempt)).await;
        }
    }

    let failure = if timed_out_only {
        TaskFailure::Timeout {
            attempts: max_attempts,
        }
    } else {
        TaskFailure::Exhausted {
            attempts: max_attempts,
            last_error: last_error.unwrap_or_default(),
        }
    };
    TaskOutcome {
        pilot_id,
        outcome: Err(failure),
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped.
fn backoff_delay(config: &ExecutorConfig, attempt: u32) -> Duration {
    let factor = 1u32 << (attempt.saturating_sub(1)).min(16);
    (config.backoff_base * factor).min(config.backoff_cap)
}
