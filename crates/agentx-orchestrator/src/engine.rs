use crate::audit::{AuditEvent, AuditEventKind, AuditLog};
use crate::config::PipelineConfig;
use crate::executor::Executor;
use crate::registry::WorkerRegistry;
use crate::router::{Router, RoutingTable};
use crate::stage::StageExecutor;
use crate::task_queue::TaskQueue;
use crate::types::{Stage, Task, TaskCategory, TaskId, TaskStatus};
use agentx_core::{AgentxError, AgentxResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The pipeline controller.
///
/// Owns the task queue, the stages, the router (with its load counters) and
/// the audit log. The worker registry is shared read-only.
pub struct Pipeline {
    config: PipelineConfig,
    router: Router,
    executor: Arc<dyn Executor>,
    queue: TaskQueue,
    stages: Vec<Stage>,
    audit: AuditLog,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        registry: Arc<WorkerRegistry>,
        table: RoutingTable,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let audit = AuditLog::new(config.enable_audit_log);
        if config.check_credentials {
            let missing: Vec<String> = registry
                .credential_status()
                .into_iter()
                .filter(|(id, present)| !present && registry.is_enabled(id))
                .map(|(id, _)| id)
                .collect();
            if !missing.is_empty() {
                warn!(pipeline = %config.name, workers = ?missing, "Workers without API keys configured");
            }
        }
        Self {
            config,
            router: Router::new(registry, table),
            executor,
            queue: TaskQueue::new(),
            stages: Vec::new(),
            audit,
        }
    }

    /// A pipeline over the default worker seed and routing table.
    pub fn with_defaults(config: PipelineConfig, executor: Arc<dyn Executor>) -> Self {
        Self::new(
            config,
            Arc::new(WorkerRegistry::with_defaults()),
            RoutingTable::default(),
            executor,
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        self.router.registry()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.queue.get(id)
    }

    pub fn tasks(&self) -> &[Task] {
        self.queue.all_tasks()
    }

    /// Create a task with default priority and settings.
    pub fn create_task(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        category: TaskCategory,
    ) -> TaskId {
        self.add_task(Task::new(title, description, category))
    }

    /// Queue a pre-built task. Identical title, description and category map to
    /// the same id; the task already queued under that id is kept.
    pub fn add_task(&mut self, task: Task) -> TaskId {
        let id = task.id.clone();
        let title = task.title.clone();
        if self.queue.add(task) {
            info!(task_id = %id, title = %title, "Created task");
        } else {
            info!(task_id = %id, "Task already queued");
        }
        id
    }

    /// Append a stage. Every referenced task must already be queued.
    pub fn add_stage(&mut self, stage: Stage) -> AgentxResult<()> {
        if let Some(missing) = stage.tasks.iter().find(|id| !self.queue.contains(id)) {
            return Err(AgentxError::TaskNotFound(missing.to_string()));
        }
        info!(stage = %stage.name, tasks = stage.tasks.len(), "Added pipeline stage");
        self.stages.push(stage);
        Ok(())
    }

    /// Process one stage against this pipeline's queue, one attempt per task.
    ///
    /// Fails with `TaskNotFound` if the stage lists a task that is not queued.
    pub async fn execute_stage(&mut self, stage: &Stage) -> AgentxResult<Vec<Task>> {
        StageExecutor::new(
            &mut self.queue,
            &mut self.router,
            self.executor.as_ref(),
            &mut self.audit,
            &self.config,
        )
        .execute_stage(stage)
        .await
    }

    /// Run every stage once, in declaration order, and aggregate the results.
    ///
    /// Fails only when tasks are staged but no worker is enabled anywhere.
    /// A task parked in `Remediation` runs on its fallback worker the next
    /// time `run` is called. Calling `run` again re-processes the same queue:
    /// tasks already completed are attempted again if a stage still lists them.
    pub async fn run(&mut self) -> AgentxResult<PipelineResult> {
        let start = Instant::now();
        info!(pipeline = %self.config.name, stages = self.stages.len(), "Starting pipeline");

        let first_staged = self
            .stages
            .iter()
            .flat_map(|s| s.tasks.iter())
            .find_map(|id| self.queue.get(id));
        if let Some(task) = first_staged {
            if !self.registry().has_enabled() {
                error!(pipeline = %self.config.name, "Registry has no enabled workers");
                return Err(AgentxError::no_worker(task.category.as_str()));
            }
        }

        if self.queue.has_cycle() {
            warn!(pipeline = %self.config.name, "Dependency cycle detected; affected tasks will stay blocked");
        }

        let stages = self.stages.clone();
        let mut results: Vec<Task> = Vec::new();
        for stage in &stages {
            let stage_results = self.execute_stage(stage).await?;
            results.extend(stage_results);
        }

        let mut completed = 0;
        let mut failed = 0;
        let mut in_review = 0;
        let mut utilization: BTreeMap<String, usize> = BTreeMap::new();
        for task in &results {
            match task.status {
                TaskStatus::Completed => completed += 1,
                TaskStatus::Failed => failed += 1,
                TaskStatus::Review => in_review += 1,
                _ => {}
            }
            if let Some(worker) = &task.assigned_worker {
                *utilization.entry(worker.clone()).or_insert(0) += 1;
            }
        }

        let result = PipelineResult {
            run_id: Uuid::new_v4(),
            pipeline_name: self.config.name.clone(),
            total_tasks: results.len(),
            completed,
            failed,
            in_review,
            worker_utilization: utilization,
            execution_log: self.audit.events().to_vec(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            pipeline = %result.pipeline_name,
            run_id = %result.run_id,
            completed,
            failed,
            total = result.total_tasks,
            duration_ms = result.duration_ms,
            "Pipeline complete"
        );

        Ok(result)
    }

    /// External review signal. The executor never produces `Review` itself.
    pub fn mark_review(&mut self, id: &TaskId) -> AgentxResult<()> {
        let task = self
            .queue
            .get_mut(id)
            .ok_or_else(|| AgentxError::TaskNotFound(id.to_string()))?;
        task.status = TaskStatus::Review;
        self.audit.record(AuditEventKind::TaskReview, task);
        Ok(())
    }

    pub fn get_status(&self) -> PipelineStatus {
        PipelineStatus {
            pipeline: self.config.name.clone(),
            total_tasks: self.queue.total_count(),
            pending: self.queue.count_status(TaskStatus::Pending),
            in_progress: self.queue.count_status(TaskStatus::InProgress),
            completed: self.queue.count_status(TaskStatus::Completed),
            failed: self.queue.count_status(TaskStatus::Failed),
            review: self.queue.count_status(TaskStatus::Review),
            remediation: self.queue.count_status(TaskStatus::Remediation),
            stages: self.stages.len(),
            credentials: if self.config.check_credentials {
                self.registry().credential_status()
            } else {
                BTreeMap::new()
            },
        }
    }

    pub fn export_report(&self) -> PipelineReport {
        PipelineReport {
            generated_at: Utc::now(),
            config: self.config.clone(),
            routing: self.router.table().clone(),
            status: self.get_status(),
            load_distribution: self.router.load_distribution(),
            execution_log: self.audit.events().to_vec(),
            tasks: self.queue.all_tasks().to_vec(),
        }
    }

    /// Write [`Pipeline::export_report`] as pretty JSON to `path`.
    pub async fn export_report_to(&self, path: &Path) -> AgentxResult<()> {
        let json = serde_json::to_string_pretty(&self.export_report())?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, json).await?;
        info!(path = %path.display(), "Pipeline report exported");
        Ok(())
    }
}

/// Aggregate outcome of one [`Pipeline::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub total_tasks: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_review: usize,
    pub worker_utilization: BTreeMap<String, usize>,
    pub execution_log: Vec<AuditEvent>,
    pub duration_ms: u64,
}

impl PipelineResult {
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} tasks completed, {} failed, {} in review",
            self.pipeline_name, self.completed, self.total_tasks, self.failed, self.in_review
        )
    }
}

/// Counts by state across the whole task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub pipeline: String,
    pub total_tasks: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub review: usize,
    pub remediation: usize,
    pub stages: usize,
    /// Worker id → whether its API key variable is set. Empty when
    /// `check_credentials` is off.
    pub credentials: BTreeMap<String, bool>,
}

/// Full snapshot for offline inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub generated_at: DateTime<Utc>,
    pub config: PipelineConfig,
    pub routing: RoutingTable,
    pub status: PipelineStatus,
    pub load_distribution: BTreeMap<String, u64>,
    pub execution_log: Vec<AuditEvent>,
    pub tasks: Vec<Task>,
}
