use agentx_core::{AgentxError, AgentxResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Default retry budget for a freshly created task.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Closed classification of task types. Selects the static candidate ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Coding,
    Testing,
    Deployment,
    Legal,
    Documentation,
    Integration,
    Remediation,
    Automation,
    Security,
    Review,
}

impl TaskCategory {
    /// Every category, in table order.
    pub const ALL: [TaskCategory; 10] = [
        TaskCategory::Coding,
        TaskCategory::Testing,
        TaskCategory::Deployment,
        TaskCategory::Legal,
        TaskCategory::Documentation,
        TaskCategory::Integration,
        TaskCategory::Remediation,
        TaskCategory::Automation,
        TaskCategory::Security,
        TaskCategory::Review,
    ];

    /// Stable wire value, also used as hash input for task ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Coding => "coding",
            TaskCategory::Testing => "testing",
            TaskCategory::Deployment => "deployment",
            TaskCategory::Legal => "legal",
            TaskCategory::Documentation => "documentation",
            TaskCategory::Integration => "integration",
            TaskCategory::Remediation => "remediation",
            TaskCategory::Automation => "automation",
            TaskCategory::Security => "security",
            TaskCategory::Review => "review",
        }
    }

    /// Human-readable label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            TaskCategory::Coding => "Coding",
            TaskCategory::Testing => "Testing",
            TaskCategory::Deployment => "Deployment",
            TaskCategory::Legal => "Legal drafting",
            TaskCategory::Documentation => "Documentation",
            TaskCategory::Integration => "Integration",
            TaskCategory::Remediation => "Remediation",
            TaskCategory::Automation => "Workflow automation",
            TaskCategory::Security => "Security audit",
            TaskCategory::Review => "Code review",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = AgentxError;

    fn from_str(s: &str) -> AgentxResult<Self> {
        TaskCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AgentxError::Config(format!("Unknown task category: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Critical => "critical",
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskPriority::Critical => "Critical",
            TaskPriority::High => "High",
            TaskPriority::Medium => "Medium",
            TaskPriority::Low => "Low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = AgentxError;

    fn from_str(s: &str) -> AgentxResult<Self> {
        match s {
            "critical" => Ok(TaskPriority::Critical),
            "high" => Ok(TaskPriority::High),
            "medium" => Ok(TaskPriority::Medium),
            "low" => Ok(TaskPriority::Low),
            other => Err(AgentxError::Config(format!("Unknown task priority: {other}"))),
        }
    }
}

/// Status of a task in the state machine.
///
/// `Review` is never produced by the stage executor; it is entered only through
/// an explicit external signal (see `Pipeline::mark_review`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Review,
    Remediation,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Review,
        TaskStatus::Remediation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Review => "review",
            TaskStatus::Remediation => "remediation",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
            TaskStatus::Review => "Awaiting review",
            TaskStatus::Remediation => "Remediating",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = AgentxError;

    fn from_str(s: &str) -> AgentxResult<Self> {
        TaskStatus::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| AgentxError::Config(format!("Unknown task status: {s}")))
    }
}

/// Content-derived task identifier.
///
/// The first 12 hex characters of `sha256("{title}:{description}:{category}")`,
/// so creating the same task twice yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn derive(title: &str, description: &str, category: TaskCategory) -> Self {
        let digest = Sha256::digest(format!("{title}:{description}:{category}").as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(12);
        TaskId(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// A unit of work routed to a single worker at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub category: TaskCategory,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_worker: Option<String>,
    /// Alternates consumed in order after failures; the last one is reused.
    pub fallback_workers: Vec<String>,
    pub dependencies: Vec<TaskId>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error_log: Vec<String>,
    /// Free-form input handed to the executor.
    #[serde(default)]
    pub input_data: HashMap<String, serde_json::Value>,
    /// Executor output from the last successful attempt.
    #[serde(default)]
    pub output: Option<String>,
    /// Worker ids invoked so far, in order.
    #[serde(default)]
    pub attempts: Vec<String>,
}

impl Task {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: TaskCategory,
    ) -> Self {
        let title = title.into();
        let description = description.into();
        Self {
            id: TaskId::derive(&title, &description, category),
            title,
            description,
            category,
            priority: TaskPriority::default(),
            status: TaskStatus::Pending,
            assigned_worker: None,
            fallback_workers: Vec::new(),
            dependencies: Vec::new(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            error_log: Vec::new(),
            input_data: HashMap::new(),
            output: None,
            attempts: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_assigned_worker(mut self, worker_id: impl Into<String>) -> Self {
        self.assigned_worker = Some(worker_id.into());
        self
    }

    pub fn with_fallback_workers(mut self, workers: Vec<String>) -> Self {
        self.fallback_workers = workers;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.input_data.insert(key.into(), value);
        self
    }

    /// Whether a failed task may move to `Remediation`.
    pub fn can_remediate(&self) -> bool {
        self.retry_count < self.max_retries && !self.fallback_workers.is_empty()
    }

    /// The fallback worker for the current retry count.
    ///
    /// Index is `min(retry_count - 1, len - 1)`: fallbacks are consumed in order
    /// and the last one is reused once the list is exhausted.
    pub fn next_fallback(&self) -> Option<&str> {
        let last = self.fallback_workers.len().checked_sub(1)?;
        let idx = (self.retry_count.saturating_sub(1) as usize).min(last);
        self.fallback_workers.get(idx).map(String::as_str)
    }
}

/// An ordered batch of tasks processed together before the pipeline advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub tasks: Vec<TaskId>,
    /// Advisory only: tasks still run in declaration order.
    #[serde(default)]
    pub parallel: bool,
    /// Informational only: a failed required stage does not stop the pipeline.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
            parallel: false,
            required: true,
        }
    }

    pub fn with_task(mut self, id: TaskId) -> Self {
        self.tasks.push(id);
        self
    }

    pub fn with_tasks(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.tasks.extend(ids);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}
