//! Delegated execution: the only place where a task leaves the core.
//!
//! The stage executor hands an immutable [`Task`] snapshot plus the chosen
//! worker id to an [`Executor`] and applies the state transition itself from
//! the returned [`ExecutionOutcome`].

use crate::types::Task;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one delegated execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Message appended to the task's error log on failure.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "execution failed without an error message".to_string())
    }
}

/// A worker backend.
///
/// Implementations must not mutate task state; they only report what
/// happened. Any timeout policy belongs to the implementation.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, task: &Task, worker_id: &str) -> ExecutionOutcome;
}

/// Always succeeds without doing anything. Useful for planning runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl Executor for DryRunExecutor {
    async fn execute(&self, task: &Task, worker_id: &str) -> ExecutionOutcome {
        debug!(task_id = %task.id, worker = %worker_id, "Dry run");
        ExecutionOutcome::success(format!("[dry-run] {worker_id} accepted '{}'", task.title))
    }
}

/// Runs a local command per task.
///
/// Task fields are exported as `AGENTX_*` environment variables. Exit status 0
/// is success; stdout becomes the task output.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const MAX_OUTPUT_BYTES: usize = 50_000;
const MAX_STDERR_BYTES: usize = 10_000;

impl ShellExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn env(task: &Task, worker_id: &str) -> Vec<(&'static str, String)> {
        let input = serde_json::to_string(&task.input_data).unwrap_or_else(|_| "{}".into());
        vec![
            ("AGENTX_TASK_ID", task.id.to_string()),
            ("AGENTX_TASK_TITLE", task.title.clone()),
            ("AGENTX_TASK_DESCRIPTION", task.description.clone()),
            ("AGENTX_TASK_CATEGORY", task.category.to_string()),
            ("AGENTX_TASK_PRIORITY", task.priority.to_string()),
            ("AGENTX_WORKER_ID", worker_id.to_string()),
            ("AGENTX_RETRY_COUNT", task.retry_count.to_string()),
            ("AGENTX_INPUT", input),
        ]
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn execute(&self, task: &Task, worker_id: &str) -> ExecutionOutcome {
        info!(
            task_id = %task.id,
            worker = %worker_id,
            program = %self.program,
            timeout_secs = self.timeout.as_secs(),
            "Executing task command"
        );

        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        for (key, value) in Self::env(task, worker_id) {
            command.env(key, value);
        }

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if output.status.success() {
                    ExecutionOutcome::success(truncate_output(stdout.trim(), MAX_OUTPUT_BYTES))
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let code = output.status.code().unwrap_or(-1);
                    ExecutionOutcome::failure(format!(
                        "{worker_id} exited with code {code}: {}",
                        truncate_output(stderr.trim(), MAX_STDERR_BYTES)
                    ))
                }
            }
            Ok(Err(e)) => {
                warn!(program = %self.program, error = %e, "Failed to spawn task command");
                ExecutionOutcome::failure(format!("Failed to execute command: {e}"))
            }
            Err(_) => ExecutionOutcome::failure(format!(
                "{worker_id} timed out after {}s",
                self.timeout.as_secs()
            )),
        }
    }
}

fn truncate_output(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}... [truncated, {} total bytes]", &s[..cut], s.len())
}

/// Dispatches to a per-worker backend, falling back to a default one.
pub struct ExecutorSet {
    backends: HashMap<String, Arc<dyn Executor>>,
    default: Arc<dyn Executor>,
}

impl ExecutorSet {
    pub fn new(default: Arc<dyn Executor>) -> Self {
        Self {
            backends: HashMap::new(),
            default,
        }
    }

    pub fn register(&mut self, worker_id: impl Into<String>, executor: Arc<dyn Executor>) {
        self.backends.insert(worker_id.into(), executor);
    }

    pub fn with(mut self, worker_id: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
        self.register(worker_id, executor);
        self
    }

    pub fn has_backend(&self, worker_id: &str) -> bool {
        self.backends.contains_key(worker_id)
    }
}

#[async_trait]
impl Executor for ExecutorSet {
    async fn execute(&self, task: &Task, worker_id: &str) -> ExecutionOutcome {
        let backend = self.backends.get(worker_id).unwrap_or(&self.default);
        backend.execute(task, worker_id).await
    }
}
