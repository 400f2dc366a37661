//! End-to-end pipeline tests.
//!
//! Drives full `Pipeline::run` passes against a scripted executor and checks
//! routing, dependency gating, remediation, reporting and definition loading.

#![allow(clippy::unwrap_used)]

use agentx_core::AgentxError;
use agentx_orchestrator::*;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Scripted executor: fails for a fixed set of workers, records every call
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Scripted {
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl Scripted {
    fn failing(workers: &[&str]) -> Self {
        Self {
            failing: workers.iter().map(|w| (*w).to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls_for(&self, title: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == title)
            .map(|(_, w)| w.clone())
            .collect()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Executor for Scripted {
    async fn execute(&self, task: &Task, worker_id: &str) -> ExecutionOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((task.title.clone(), worker_id.to_string()));
        if self.failing.contains(worker_id) {
            ExecutionOutcome::failure(format!("{worker_id} unavailable"))
        } else {
            ExecutionOutcome::success(format!("{} done by {worker_id}", task.title))
        }
    }
}

fn workers(enabled: &[(&str, u32, bool)]) -> Arc<WorkerRegistry> {
    Arc::new(WorkerRegistry::from_profiles(enabled.iter().map(
        |(id, rank, on)| {
            let p = WorkerProfile::new(*id, id.to_uppercase(), "Test").with_rank(*rank);
            if *on {
                p
            } else {
                p.disabled()
            }
        },
    )))
}

fn pipeline_with(
    registry: Arc<WorkerRegistry>,
    table: RoutingTable,
    executor: Arc<Scripted>,
) -> Pipeline {
    Pipeline::new(PipelineConfig::named("e2e"), registry, table, executor)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_a_routes_to_first_table_candidate() {
    let exec = Arc::new(Scripted::default());
    let table = RoutingTable::empty().with(TaskCategory::Coding, &["w1", "w2"]);
    let mut p = pipeline_with(workers(&[("w1", 1, true), ("w2", 2, true)]), table, exec.clone());
    let id = p.create_task("Feature", "implement", TaskCategory::Coding);
    p.add_stage(Stage::new("build").with_task(id.clone())).unwrap();

    let result = p.run().await.unwrap();
    assert_eq!(result.completed, 1);
    assert_eq!(exec.calls_for("Feature"), vec!["w1"]);
    assert_eq!(p.task(&id).unwrap().assigned_worker.as_deref(), Some("w1"));
}

#[tokio::test]
async fn scenario_b_skips_disabled_candidate() {
    let exec = Arc::new(Scripted::default());
    let table = RoutingTable::empty().with(TaskCategory::Coding, &["w1", "w2"]);
    let mut p = pipeline_with(workers(&[("w1", 1, false), ("w2", 2, true)]), table, exec.clone());
    let id = p.create_task("Feature", "implement", TaskCategory::Coding);
    p.add_stage(Stage::new("build").with_task(id)).unwrap();

    p.run().await.unwrap();
    assert_eq!(exec.calls_for("Feature"), vec!["w2"]);
    assert_eq!(p.router().load_distribution().get("w2"), Some(&1));
}

#[tokio::test]
async fn scenario_c_failed_dependency_blocks_dependent() {
    let exec = Arc::new(Scripted::failing(&["w1"]));
    let table = RoutingTable::empty().with(TaskCategory::Coding, &["w1"]);
    let mut p = pipeline_with(workers(&[("w1", 1, true)]), table, exec.clone());
    let t1 = p.add_task(Task::new("T1", "first", TaskCategory::Coding));
    let t2 = p.add_task(
        Task::new("T2", "second", TaskCategory::Coding).with_dependencies(vec![t1.clone()]),
    );
    p.add_stage(Stage::new("s").with_tasks([t1.clone(), t2.clone()]))
        .unwrap();

    let result = p.run().await.unwrap();
    assert_eq!(p.task(&t1).unwrap().status, TaskStatus::Failed);
    let blocked = p.task(&t2).unwrap();
    assert_eq!(blocked.status, TaskStatus::Pending);
    assert!(blocked.error_log.last().unwrap().contains(t1.as_str()));
    assert!(exec.calls_for("T2").is_empty());
    assert_eq!(result.failed, 1);
    assert_eq!(result.completed, 0);
}

#[tokio::test]
async fn scenario_d_fallback_sequence_then_failed() {
    let exec = Arc::new(Scripted::failing(&["p", "f1", "f2"]));
    let registry = workers(&[("p", 1, true), ("f1", 2, true), ("f2", 3, true)]);
    let mut p = pipeline_with(registry, RoutingTable::empty(), exec.clone());
    let id = p.add_task(
        Task::new("Flaky", "keeps failing", TaskCategory::Testing)
            .with_assigned_worker("p")
            .with_fallback_workers(vec!["f1".into(), "f2".into()])
            .with_max_retries(3),
    );
    p.add_stage(Stage::new("s").with_task(id.clone())).unwrap();

    // One attempt per run: the task parks in Remediation on its next fallback.
    let first = p.run().await.unwrap();
    let task = p.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Remediation);
    assert_eq!(task.assigned_worker.as_deref(), Some("f1"));
    assert_eq!(task.retry_count, 1);
    assert_eq!(first.failed, 0);
    assert_eq!(first.worker_utilization.get("f1"), Some(&1));

    p.run().await.unwrap();
    let task = p.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Remediation);
    assert_eq!(task.assigned_worker.as_deref(), Some("f2"));

    let last = p.run().await.unwrap();
    assert_eq!(exec.calls_for("Flaky"), vec!["p", "f1", "f2"]);
    let task = p.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.retry_count, 3);
    assert_eq!(task.attempts, vec!["p", "f1", "f2"]);
    assert_eq!(task.error_log.len(), 3);
    assert_eq!(last.failed, 1);

    let kinds: Vec<AuditEventKind> = last.execution_log.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            AuditEventKind::TaskRemediation,
            AuditEventKind::TaskRemediation,
            AuditEventKind::TaskFailed,
        ]
    );
    assert_eq!(last.execution_log[0].worker_id.as_deref(), Some("f1"));
    assert_eq!(last.execution_log[2].resulting_status, TaskStatus::Failed);
}

#[tokio::test]
async fn scenario_e_no_enabled_worker_is_pipeline_error() {
    let exec = Arc::new(Scripted::default());
    let registry = workers(&[("w1", 1, false)]);
    let mut router = Router::new(registry.clone(), RoutingTable::default());
    let err = router
        .route(TaskCategory::Coding, TaskPriority::Medium)
        .unwrap_err();
    assert!(err.is_no_worker());

    let mut p = pipeline_with(registry, RoutingTable::default(), exec.clone());
    let id = p.create_task("Any", "thing", TaskCategory::Security);
    p.add_stage(Stage::new("s").with_task(id.clone())).unwrap();

    match p.run().await {
        Err(AgentxError::NoWorkerAvailable { category }) => assert_eq!(category, "security"),
        other => panic!("expected NoWorkerAvailable, got {other:?}"),
    }
    assert_eq!(exec.total_calls(), 0);
    assert_eq!(p.task(&id).unwrap().status, TaskStatus::Pending);
}

// ---------------------------------------------------------------------------
// Properties and reporting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn utilization_sums_to_assigned_results() {
    let exec = Arc::new(Scripted::failing(&["w2"]));
    let table = RoutingTable::empty()
        .with(TaskCategory::Coding, &["w1"])
        .with(TaskCategory::Testing, &["w2"]);
    let mut p = pipeline_with(workers(&[("w1", 1, true), ("w2", 2, true)]), table, exec);
    let a = p.create_task("A", "a", TaskCategory::Coding);
    let b = p.create_task("B", "b", TaskCategory::Testing);
    let c = p.add_task(
        Task::new("C", "c", TaskCategory::Coding).with_dependencies(vec![b.clone()]),
    );
    p.add_stage(Stage::new("one").with_tasks([a, b])).unwrap();
    p.add_stage(Stage::new("two").with_task(c)).unwrap();

    let result = p.run().await.unwrap();
    let with_worker = p
        .tasks()
        .iter()
        .filter(|t| t.assigned_worker.is_some())
        .count();
    let total: usize = result.worker_utilization.values().sum();
    assert_eq!(total, with_worker);
    assert_eq!(result.total_tasks, 3);
    assert_eq!(result.execution_log.len(), 3);
}

#[tokio::test]
async fn rerun_reattempts_completed_tasks() {
    let exec = Arc::new(Scripted::default());
    let table = RoutingTable::empty().with(TaskCategory::Coding, &["w1"]);
    let mut p = pipeline_with(workers(&[("w1", 1, true)]), table, exec.clone());
    let id = p.create_task("Once", "or twice", TaskCategory::Coding);
    p.add_stage(Stage::new("s").with_task(id.clone())).unwrap();

    p.run().await.unwrap();
    let second = p.run().await.unwrap();

    // A completed task still listed by a stage is executed again.
    assert_eq!(exec.calls_for("Once").len(), 2);
    assert_eq!(p.task(&id).unwrap().attempts, vec!["w1", "w1"]);
    assert_eq!(second.completed, 1);
    assert_eq!(second.execution_log.len(), 2);
}

#[tokio::test]
async fn export_report_contains_state() {
    let exec = Arc::new(Scripted::default());
    let mut p = Pipeline::with_defaults(PipelineConfig::named("report"), exec);
    let id = p.create_task("Docs", "write", TaskCategory::Documentation);
    p.add_stage(Stage::new("docs").with_task(id.clone())).unwrap();
    p.run().await.unwrap();

    let report = p.export_report();
    assert_eq!(report.status.completed, 1);
    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.execution_log.len(), 1);
    assert_eq!(report.load_distribution.values().sum::<u64>(), 1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("report.json");
    p.export_report_to(&path).await.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    assert_eq!(json["config"]["name"], "report");
    assert_eq!(json["status"]["completed"], 1);
    assert_eq!(json["tasks"][0]["id"], id.as_str());
    assert_eq!(json["execution_log"][0]["event_type"], "task_completed");
}

#[tokio::test]
async fn definition_file_builds_and_runs() {
    let toml = r#"
[pipeline]
name = "from-file"

[[workers]]
id = "w1"
name = "W1"
provider = "Acme"
priority_rank = 1

[[workers]]
id = "w2"
name = "W2"
provider = "Acme"
priority_rank = 2

[routing]
coding = ["w1"]
testing = ["w2"]

[[stages]]
name = "build"
[[stages.tasks]]
title = "Compile"
description = "build it"
category = "coding"
fallback_workers = ["w2"]

[[stages]]
name = "verify"
[[stages.tasks]]
title = "Test"
description = "test it"
category = "testing"
depends_on = ["Compile"]
"#;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.toml");
    tokio::fs::write(&path, toml).await.unwrap();

    let exec = Arc::new(Scripted::failing(&["w1"]));
    let def = PipelineDefinition::load(&path).await.unwrap();
    let mut p = def.build(exec.clone()).unwrap();
    // Compile fails on w1 and parks on its fallback; Test stays blocked.
    p.run().await.unwrap();
    assert_eq!(exec.calls_for("Compile"), vec!["w1"]);
    assert!(exec.calls_for("Test").is_empty());
    let status = p.get_status();
    assert_eq!(status.remediation, 1);
    assert_eq!(status.pending, 1);

    // The next run recovers Compile on w2, which unblocks Test.
    let result = p.run().await.unwrap();
    assert_eq!(exec.calls_for("Compile"), vec!["w1", "w2"]);
    assert_eq!(exec.calls_for("Test"), vec!["w2"]);
    assert_eq!(result.completed, 2);
    assert_eq!(result.pipeline_name, "from-file");
    assert_eq!(p.get_status().completed, 2);
}
