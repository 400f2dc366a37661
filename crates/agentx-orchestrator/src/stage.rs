use crate::audit::{AuditEventKind, AuditLog};
use crate::config::PipelineConfig;
use crate::executor::Executor;
use crate::router::Router;
use crate::task_queue::TaskQueue;
use crate::types::{Stage, Task, TaskId, TaskStatus};
use agentx_core::{AgentxError, AgentxResult};
use tracing::{debug, info, warn};

/// Runs one stage at a time over a borrowed task queue.
///
/// Owns no state of its own: the queue, router and audit log belong to the
/// pipeline and are lent for the duration of a pass.
pub struct StageExecutor<'a> {
    queue: &'a mut TaskQueue,
    router: &'a mut Router,
    executor: &'a dyn Executor,
    audit: &'a mut AuditLog,
    config: &'a PipelineConfig,
}

fn not_found(id: &TaskId) -> AgentxError {
    AgentxError::TaskNotFound(id.to_string())
}

impl<'a> StageExecutor<'a> {
    pub fn new(
        queue: &'a mut TaskQueue,
        router: &'a mut Router,
        executor: &'a dyn Executor,
        audit: &'a mut AuditLog,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            queue,
            router,
            executor,
            audit,
            config,
        }
    }

    /// Process every task of `stage` once, in declaration order.
    ///
    /// Each task gets at most one delegated execution per call. A failed task
    /// with a fallback left is parked in `Remediation` on its next worker and
    /// runs again on the following pass. Exactly one audit event is appended
    /// per task, and a failing task never stops its siblings.
    ///
    /// Fails with `TaskNotFound` before touching any task if the stage lists
    /// an id that is not queued.
    pub async fn execute_stage(&mut self, stage: &Stage) -> AgentxResult<Vec<Task>> {
        if let Some(missing) = stage.tasks.iter().find(|id| !self.queue.contains(id)) {
            warn!(stage = %stage.name, task_id = %missing, "Stage references unknown task");
            return Err(not_found(missing));
        }

        info!(
            stage = %stage.name,
            tasks = stage.tasks.len(),
            parallel = stage.parallel,
            "Executing stage"
        );

        let mut results = Vec::with_capacity(stage.tasks.len());
        for id in &stage.tasks {
            results.push(self.process(id).await?);
        }
        Ok(results)
    }

    async fn process(&mut self, id: &TaskId) -> AgentxResult<Task> {
        let blocking = {
            let task = self.queue.get(id).ok_or_else(|| not_found(id))?;
            self.queue.blocking_dependencies(task)
        };
        if !blocking.is_empty() {
            return self.block(id, &blocking);
        }

        let worker = match self.assign(id) {
            Ok(worker) => worker,
            Err(e) if e.is_no_worker() => {
                let task = self.queue.get_mut(id).ok_or_else(|| not_found(id))?;
                task.status = TaskStatus::Failed;
                task.error_log.push(e.to_string());
                warn!(task_id = %id, "No worker could be assigned");
                self.audit.record(AuditEventKind::TaskFailed, task);
                return Ok(task.clone());
            }
            Err(e) => return Err(e),
        };

        {
            let task = self.queue.get_mut(id).ok_or_else(|| not_found(id))?;
            task.status = TaskStatus::InProgress;
            task.attempts.push(worker.clone());
            debug!(task_id = %id, worker = %worker, attempt = task.attempts.len(), "task_started");
        }

        let outcome = {
            let task = self.queue.get(id).ok_or_else(|| not_found(id))?;
            self.executor.execute(task, &worker).await
        };

        let task = self.queue.get_mut(id).ok_or_else(|| not_found(id))?;
        if outcome.success {
            task.status = TaskStatus::Completed;
            task.output = outcome.output;
            info!(task_id = %id, worker = %worker, "Task completed");
            self.audit.record(AuditEventKind::TaskCompleted, task);
            return Ok(task.clone());
        }

        let message = outcome.error_message();
        warn!(task_id = %id, worker = %worker, error = %message, "Task failed");
        task.status = TaskStatus::Failed;
        task.error_log.push(message);
        task.retry_count += 1;

        let next = if self.config.enable_remediation && task.can_remediate() {
            task.next_fallback().map(str::to_string)
        } else {
            None
        };

        match next {
            Some(fallback) => {
                info!(
                    task_id = %id,
                    retry = task.retry_count,
                    worker = %fallback,
                    "Task parked for remediation on fallback worker"
                );
                task.assigned_worker = Some(fallback);
                task.status = TaskStatus::Remediation;
                self.audit.record(AuditEventKind::TaskRemediation, task);
            }
            None => self.audit.record(AuditEventKind::TaskFailed, task),
        }
        Ok(task.clone())
    }

    fn block(&mut self, id: &TaskId, blocking: &[TaskId]) -> AgentxResult<Task> {
        let ids: Vec<&str> = blocking.iter().map(TaskId::as_str).collect();
        let task = self.queue.get_mut(id).ok_or_else(|| not_found(id))?;
        task.status = TaskStatus::Pending;
        task.error_log
            .push(format!("Blocked: dependencies not met: [{}]", ids.join(", ")));
        info!(task_id = %id, blocking = ?ids, "Task blocked");
        self.audit.record(AuditEventKind::TaskBlocked, task);
        Ok(task.clone())
    }

    /// Resolve the worker for this attempt, routing when unset. A task parked
    /// in `Remediation` already carries its fallback worker.
    ///
    /// On success the task carries the worker and, with `auto_fallback`, a
    /// fallback list.
    fn assign(&mut self, id: &TaskId) -> AgentxResult<String> {
        let task = self.queue.get(id).ok_or_else(|| not_found(id))?;
        let (category, priority) = (task.category, task.priority);
        let worker = match &task.assigned_worker {
            Some(worker) => worker.clone(),
            None => self.router.route(category, priority)?,
        };

        let fallbacks = if self.config.auto_fallback && task.fallback_workers.is_empty() {
            let registry = self.router.registry();
            Some(
                self.router
                    .route_with_fallback(category)
                    .into_iter()
                    .filter(|w| *w != worker && registry.is_enabled(w))
                    .collect::<Vec<_>>(),
            )
        } else {
            None
        };

        let task = self.queue.get_mut(id).ok_or_else(|| not_found(id))?;
        task.assigned_worker = Some(worker.clone());
        if let Some(fallbacks) = fallbacks {
            task.fallback_workers = fallbacks;
        }
        Ok(worker)
    }
}
