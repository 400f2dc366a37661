use agentx_orchestrator::{
    DryRunExecutor, ExecutionOutcome, Executor, PipelineDefinition, Router, Task, TaskCategory,
    TaskPriority, WorkerProfile,
};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agentx", about = "AgentX: multi-agent task routing and pipeline runner")]
struct Cli {
    /// Path to a pipeline definition (TOML). Defaults apply when omitted.
    #[arg(short = 'c', long)]
    definition: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage of the pipeline
    Run {
        /// Accept every task without invoking any backend
        #[arg(long)]
        dry_run: bool,
        /// Write the full JSON report here after the run
        #[arg(long)]
        report: Option<PathBuf>,
        /// Append audit events as JSON lines here after the run
        #[arg(long)]
        audit_log: Option<PathBuf>,
    },
    /// Show which worker a category routes to, and its fallback sequence
    Route {
        /// Task category (e.g. coding, testing, legal)
        category: String,
        #[arg(short, long, default_value = "medium")]
        priority: String,
    },
    /// List registered workers by rank
    Workers,
    /// Print the routing table with resolved worker names
    RoutingTable,
    /// Print which workers cover each capability
    Coverage,
    /// Print each worker's strengths
    Strengths,
    /// Print each worker's known weaknesses
    Weaknesses,
    /// Dump every worker profile as JSON, keyed by id
    ExportProfiles,
    /// Print task counts for the loaded pipeline without running it
    Status,
}

/// Default backend for workers with no declared `[[executors]]` entry.
struct Unconfigured;

#[async_trait]
impl Executor for Unconfigured {
    async fn execute(&self, task: &Task, worker_id: &str) -> ExecutionOutcome {
        warn!(task_id = %task.id, worker = %worker_id, "No executor configured for worker");
        ExecutionOutcome::failure(format!("no executor configured for worker '{worker_id}'"))
    }
}

async fn load_definition(path: Option<&Path>) -> anyhow::Result<PipelineDefinition> {
    match path {
        Some(path) => PipelineDefinition::load(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load definition '{}': {e}", path.display())),
        None => Ok(PipelineDefinition::default()),
    }
}

/// Key status suffix for the `workers` listing.
fn credential_marker(profile: &WorkerProfile) -> String {
    match (profile.credential_present(), profile.api_env_var.as_deref()) {
        (Some(true), _) => "[key set]".to_string(),
        (Some(false), Some(var)) => format!("[no key: {var}]"),
        _ => String::new(),
    }
}

fn print_report(report: &BTreeMap<String, Vec<String>>) {
    for (name, items) in report {
        println!("{name}:");
        for item in items {
            println!("  - {item}");
        }
    }
}

fn build_router(definition: &PipelineDefinition) -> anyhow::Result<Router> {
    Ok(Router::new(
        Arc::new(definition.registry()),
        definition.routing_table()?,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let mut definition = load_definition(cli.definition.as_deref()).await?;

    match cli.command {
        Commands::Run {
            dry_run,
            report,
            audit_log,
        } => {
            let default: Arc<dyn Executor> = if dry_run {
                if !definition.executors.is_empty() {
                    info!(
                        count = definition.executors.len(),
                        "Dry run: ignoring declared executors"
                    );
                }
                definition.executors.clear();
                Arc::new(DryRunExecutor)
            } else {
                Arc::new(Unconfigured)
            };

            let mut pipeline = definition.build(default)?;
            let result = pipeline.run().await?;

            if let Some(path) = &report {
                pipeline.export_report_to(path).await?;
            }
            if let Some(path) = &audit_log {
                pipeline.audit().append_jsonl(path).await?;
                info!(path = %path.display(), events = pipeline.audit().len(), "Audit log written");
            }

            println!("{}", result.summary());
            println!("{}", serde_json::to_string_pretty(&result.worker_utilization)?);
        }
        Commands::Route { category, priority } => {
            let category: TaskCategory = category.parse()?;
            let priority: TaskPriority = priority.parse()?;
            let mut router = build_router(&definition)?;
            let worker = router.route(category, priority)?;
            println!("{} ({}) → {worker}", category.label(), priority.label());
            println!("Fallback sequence:");
            for (i, id) in router.route_with_fallback(category).iter().enumerate() {
                let tier = if router.is_free_tier(id) { " [free tier]" } else { "" };
                println!("  {}. {id}{tier}", i + 1);
            }
        }
        Commands::Workers => {
            let registry = definition.registry();
            if registry.is_empty() {
                println!("No workers registered.");
            } else {
                println!("Registered workers:");
                for profile in registry.ranked() {
                    println!(
                        "  {:>2}. {:<24} {} - {} {}",
                        profile.priority_rank,
                        profile.id,
                        profile.display_name(),
                        profile.cost_tier.label(),
                        credential_marker(profile)
                    );
                }
                let disabled = registry.list_all().iter().filter(|p| !p.enabled).count();
                println!("\nTotal: {} worker(s), {disabled} disabled", registry.len());
            }
        }
        Commands::RoutingTable => {
            let router = build_router(&definition)?;
            for (category, names) in router.resolved_table() {
                println!("{:<16} {}", category.label(), names.join(" → "));
            }
            println!("{:<16} {}", "Emergency", router.emergency_fallbacks().join(" → "));
        }
        Commands::Coverage => {
            let registry = definition.registry();
            for (capability, workers) in registry.coverage_matrix() {
                println!("{:<24} {}", capability.as_str(), workers.join(", "));
            }
        }
        Commands::Strengths => print_report(&definition.registry().strengths_report()),
        Commands::Weaknesses => print_report(&definition.registry().weaknesses_report()),
        Commands::ExportProfiles => {
            let profiles = definition.registry().export_profiles();
            println!("{}", serde_json::to_string_pretty(&profiles)?);
        }
        Commands::Status => {
            let pipeline = definition.build(Arc::new(DryRunExecutor))?;
            println!("{}", serde_json::to_string_pretty(&pipeline.get_status())?);
        }
    }

    Ok(())
}
