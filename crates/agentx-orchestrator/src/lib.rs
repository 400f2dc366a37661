//! Task routing and staged pipeline execution for AgentX.
//!
//! Tasks are classified by category, routed to external workers through a
//! curated candidate table, and processed stage by stage with dependency
//! gating and fallback-driven remediation. Actual work is delegated to an
//! injected [`Executor`]; every task transition of a stage pass lands in the
//! [`AuditLog`].
//!
//! # Main types
//!
//! - [`Pipeline`]: Owns tasks, stages and the audit log and runs them end to end.
//! - [`Router`]: Picks a worker for a category and builds fallback chains.
//! - [`WorkerRegistry`]: Catalogue of worker profiles with capability queries.
//! - [`StageExecutor`]: Processes one stage under the task state machine.
//! - [`PipelineDefinition`]: TOML description of a complete pipeline.

/// Append-only execution log.
pub mod audit;
/// Pipeline-level settings.
pub mod config;
/// TOML pipeline definitions.
pub mod definition;
/// Pipeline controller and its result/report types.
pub mod engine;
/// Executor trait and built-in backends.
pub mod executor;
/// Worker profiles, capabilities and the default roster.
pub mod profiles;
/// Worker registry.
pub mod registry;
/// Category routing and fallback chains.
pub mod router;
/// Stage execution under the task state machine.
pub mod stage;
/// Task storage and dependency checks.
pub mod task_queue;
/// Shared types (Task, Stage, enums).
pub mod types;

pub use audit::{AuditEvent, AuditEventKind, AuditLog};
pub use config::PipelineConfig;
pub use definition::{ExecutorConfig, PipelineDefinition, StageDefinition, TaskDefinition};
pub use engine::{Pipeline, PipelineReport, PipelineResult, PipelineStatus};
pub use executor::{DryRunExecutor, ExecutionOutcome, Executor, ExecutorSet, ShellExecutor};
pub use profiles::{default_profiles, Capability, CostTier, WorkerProfile};
pub use registry::WorkerRegistry;
pub use router::{Router, RoutingTable};
pub use stage::StageExecutor;
pub use task_queue::TaskQueue;
pub use types::{
    Stage, Task, TaskCategory, TaskId, TaskPriority, TaskStatus, DEFAULT_MAX_RETRIES,
};
