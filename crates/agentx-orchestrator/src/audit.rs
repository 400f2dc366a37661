use crate::types::{Task, TaskId, TaskStatus};
use agentx_core::AgentxResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// What happened to a task during a stage pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// Dependencies not met; the task stayed pending.
    TaskBlocked,
    TaskCompleted,
    TaskFailed,
    /// Failed with a fallback left; parked for the next pass.
    TaskRemediation,
    /// Set to review by an external signal.
    TaskReview,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::TaskBlocked => "task_blocked",
            AuditEventKind::TaskCompleted => "task_completed",
            AuditEventKind::TaskFailed => "task_failed",
            AuditEventKind::TaskRemediation => "task_remediation",
            AuditEventKind::TaskReview => "task_review",
        }
    }
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventKind,
    pub task_id: TaskId,
    pub task_title: String,
    pub worker_id: Option<String>,
    /// Task status after the transition.
    pub resulting_status: TaskStatus,
}

/// Append-only execution log.
pub struct AuditLog {
    events: Vec<AuditEvent>,
    emit: bool,
}

impl AuditLog {
    /// `emit` controls whether each event is also written as a tracing line.
    pub fn new(emit: bool) -> Self {
        Self {
            events: Vec::new(),
            emit,
        }
    }

    /// Record the current state of `task` under `kind`.
    pub fn record(&mut self, kind: AuditEventKind, task: &Task) {
        let entry = AuditEvent {
            timestamp: Utc::now(),
            event_type: kind,
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            worker_id: task.assigned_worker.clone(),
            resulting_status: task.status,
        };
        if self.emit {
            info!(
                event = %entry.event_type,
                task_id = %entry.task_id,
                worker = entry.worker_id.as_deref().unwrap_or("-"),
                status = %entry.resulting_status,
                "audit"
            );
        }
        self.events.push(entry);
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events for one task, oldest first.
    pub fn for_task<'a>(&'a self, id: &'a TaskId) -> impl Iterator<Item = &'a AuditEvent> + 'a {
        self.events.iter().filter(move |e| &e.task_id == id)
    }

    /// Append every event as one JSON line to `path`, creating parent dirs.
    pub async fn append_jsonl(&self, path: &Path) -> AgentxResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut buf = String::new();
        for entry in &self.events {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(true)
    }
}
