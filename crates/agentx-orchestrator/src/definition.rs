//! TOML pipeline definitions.
//!
//! A definition file declares the pipeline settings, an optional worker
//! roster, routing overrides, per-worker subprocess backends and the stages
//! with their tasks. Dependencies are written as task titles and resolved to
//! ids when the pipeline is built.

use crate::config::PipelineConfig;
use crate::engine::Pipeline;
use crate::executor::{Executor, ExecutorSet, ShellExecutor};
use crate::profiles::WorkerProfile;
use crate::registry::WorkerRegistry;
use crate::router::RoutingTable;
use crate::task_queue::TaskQueue;
use crate::types::{Stage, Task, TaskCategory, TaskId, TaskPriority, DEFAULT_MAX_RETRIES};
use agentx_core::{AgentxError, AgentxResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Routing key holding the emergency chain instead of a category row.
const EMERGENCY_KEY: &str = "emergency";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Replaces the default worker seed when non-empty.
    #[serde(default)]
    pub workers: Vec<WorkerProfile>,
    /// Category rows (and `emergency`) overriding the default table.
    #[serde(default)]
    pub routing: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub executors: Vec<ExecutorConfig>,
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
}

/// A subprocess backend bound to one worker id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub worker: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: TaskCategory,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub assigned_worker: Option<String>,
    #[serde(default)]
    pub fallback_workers: Vec<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Titles of tasks this one waits on.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub input: HashMap<String, serde_json::Value>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl PipelineDefinition {
    pub fn from_toml_str(s: &str) -> AgentxResult<Self> {
        toml::from_str(s).map_err(|e| AgentxError::Config(format!("invalid pipeline definition: {e}")))
    }

    pub async fn load(path: &Path) -> AgentxResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AgentxError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let definition = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            stages = definition.stages.len(),
            workers = definition.workers.len(),
            "Loaded pipeline definition"
        );
        Ok(definition)
    }

    /// Declared workers, or the default seed when none are declared.
    pub fn registry(&self) -> WorkerRegistry {
        if self.workers.is_empty() {
            WorkerRegistry::with_defaults()
        } else {
            WorkerRegistry::from_profiles(self.workers.clone())
        }
    }

    /// The default table with the declared rows swapped in.
    pub fn routing_table(&self) -> AgentxResult<RoutingTable> {
        let mut table = RoutingTable::default();
        for (key, workers) in &self.routing {
            if key == EMERGENCY_KEY {
                table.set_emergency(workers.clone());
            } else {
                let category: TaskCategory = key.parse()?;
                table.set(category, workers.clone());
            }
        }
        Ok(table)
    }

    /// Wrap `default` with the declared per-worker subprocess backends.
    pub fn executor(&self, default: Arc<dyn Executor>) -> ExecutorSet {
        let mut set = ExecutorSet::new(default);
        for cfg in &self.executors {
            let shell = ShellExecutor::new(&cfg.command)
                .with_args(cfg.args.clone())
                .with_timeout(Duration::from_secs(cfg.timeout_secs));
            set.register(&cfg.worker, Arc::new(shell));
        }
        set
    }

    /// Tasks in declaration order with `depends_on` resolved to ids.
    pub fn tasks(&self) -> AgentxResult<Vec<Task>> {
        let mut ids: HashMap<&str, TaskId> = HashMap::new();
        for def in self.stages.iter().flat_map(|s| s.tasks.iter()) {
            let id = TaskId::derive(&def.title, &def.description, def.category);
            if ids.insert(def.title.as_str(), id).is_some() {
                return Err(AgentxError::Config(format!(
                    "duplicate task title '{}'",
                    def.title
                )));
            }
        }

        let mut tasks = Vec::new();
        for def in self.stages.iter().flat_map(|s| s.tasks.iter()) {
            let dependencies = def
                .depends_on
                .iter()
                .map(|title| {
                    ids.get(title.as_str()).cloned().ok_or_else(|| {
                        AgentxError::Config(format!(
                            "task '{}' depends on unknown task '{title}'",
                            def.title
                        ))
                    })
                })
                .collect::<AgentxResult<Vec<_>>>()?;

            let mut task = Task::new(&def.title, &def.description, def.category)
                .with_priority(def.priority)
                .with_dependencies(dependencies)
                .with_fallback_workers(def.fallback_workers.clone())
                .with_max_retries(def.max_retries);
            if let Some(worker) = &def.assigned_worker {
                task = task.with_assigned_worker(worker);
            }
            task.input_data = def.input.clone();
            tasks.push(task);
        }

        let mut queue = TaskQueue::new();
        for task in &tasks {
            queue.add(task.clone());
        }
        if queue.has_cycle() {
            return Err(AgentxError::Config(
                "task dependencies form a cycle".to_string(),
            ));
        }
        Ok(tasks)
    }

    /// Build a ready-to-run pipeline. `default` executes every worker without
    /// a declared subprocess backend.
    pub fn build(&self, default: Arc<dyn Executor>) -> AgentxResult<Pipeline> {
        let tasks = self.tasks()?;
        let mut pipeline = Pipeline::new(
            self.pipeline.clone(),
            Arc::new(self.registry()),
            self.routing_table()?,
            Arc::new(self.executor(default)),
        );

        let mut by_title: HashMap<String, TaskId> = HashMap::new();
        for task in tasks {
            let title = task.title.clone();
            by_title.insert(title, pipeline.add_task(task));
        }

        for stage_def in &self.stages {
            let ids = stage_def
                .tasks
                .iter()
                .filter_map(|t| by_title.get(&t.title).cloned());
            let stage = Stage::new(&stage_def.name)
                .with_tasks(ids)
                .parallel(stage_def.parallel)
                .required(stage_def.required);
            pipeline.add_stage(stage)?;
        }
        Ok(pipeline)
    }
}
