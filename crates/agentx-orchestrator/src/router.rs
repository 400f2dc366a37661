use crate::profiles::{Capability, CostTier};
use crate::registry::WorkerRegistry;
use crate::types::{TaskCategory, TaskPriority};
use agentx_core::{AgentxError, AgentxResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Static category → ordered candidate table plus the emergency chain.
///
/// Curated offline; nothing here is computed at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    categories: BTreeMap<TaskCategory, Vec<String>>,
    emergency: Vec<String>,
}

impl RoutingTable {
    /// A table with no candidates and no emergency chain.
    pub fn empty() -> Self {
        Self {
            categories: BTreeMap::new(),
            emergency: Vec::new(),
        }
    }

    /// Ordered candidates for `category`; empty when the category has no row.
    pub fn candidates(&self, category: TaskCategory) -> &[String] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn set(&mut self, category: TaskCategory, workers: Vec<String>) {
        self.categories.insert(category, workers);
    }

    pub fn with(mut self, category: TaskCategory, workers: &[&str]) -> Self {
        self.set(category, workers.iter().map(|w| (*w).to_string()).collect());
        self
    }

    pub fn emergency(&self) -> &[String] {
        &self.emergency
    }

    pub fn set_emergency(&mut self, workers: Vec<String>) {
        self.emergency = workers;
    }

    pub fn with_emergency(mut self, workers: &[&str]) -> Self {
        self.set_emergency(workers.iter().map(|w| (*w).to_string()).collect());
        self
    }

    pub fn rows(&self) -> impl Iterator<Item = (TaskCategory, &[String])> {
        self.categories.iter().map(|(c, w)| (*c, w.as_slice()))
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::empty()
            .with(
                TaskCategory::Coding,
                &["openai_codex", "claude_code", "github_copilot", "manus"],
            )
            .with(
                TaskCategory::Testing,
                &["openai_codex", "manus", "gitlab_duo", "claude_code"],
            )
            .with(
                TaskCategory::Deployment,
                &["gitlab_duo", "github_copilot", "google_cloud_cli", "manus"],
            )
            .with(TaskCategory::Legal, &["abacus_ai", "claude_code"])
            .with(
                TaskCategory::Documentation,
                &["claude_code", "abacus_ai", "github_copilot"],
            )
            .with(
                TaskCategory::Integration,
                &["zapier_duo", "openai_codex", "claude_code", "manus"],
            )
            .with(
                TaskCategory::Remediation,
                &["claude_code", "openai_codex", "gitlab_duo"],
            )
            .with(
                TaskCategory::Automation,
                &["zapier_duo", "manus", "vscode_ai", "github_copilot"],
            )
            .with(
                TaskCategory::Security,
                &["gitlab_duo", "claude_code", "openai_codex"],
            )
            .with(
                TaskCategory::Review,
                &["claude_code", "github_copilot", "gitlab_duo"],
            )
            .with_emergency(&["groq", "gemini_free", "deepseek", "cloudflare_workers_ai"])
    }
}

/// Picks workers for tasks: static table first, then global rank.
///
/// Selection never looks at load. The per-worker counter is kept for
/// [`Router::load_distribution`] only.
pub struct Router {
    registry: Arc<WorkerRegistry>,
    table: RoutingTable,
    load: BTreeMap<String, u64>,
}

impl Router {
    pub fn new(registry: Arc<WorkerRegistry>, table: RoutingTable) -> Self {
        Self {
            registry,
            table,
            load: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Route a task to a single worker id.
    ///
    /// Returns the first enabled static candidate, else the best-ranked enabled
    /// worker overall. Fails only when no worker is enabled at all.
    pub fn route(&mut self, category: TaskCategory, priority: TaskPriority) -> AgentxResult<String> {
        let primary = self
            .table
            .candidates(category)
            .iter()
            .find(|id| self.registry.is_enabled(id))
            .cloned();

        if let Some(worker) = primary {
            info!(category = %category, priority = %priority, worker = %worker, "Routed task");
            self.track(&worker);
            return Ok(worker);
        }

        let fallback = self.registry.ranked().first().map(|p| p.id.clone());
        match fallback {
            Some(worker) => {
                warn!(
                    category = %category,
                    priority = %priority,
                    worker = %worker,
                    "No table candidate enabled, using highest-ranked worker"
                );
                self.track(&worker);
                Ok(worker)
            }
            None => Err(AgentxError::no_worker(category.as_str())),
        }
    }

    /// Full ordered attempt sequence for `category`: the table row followed by
    /// enabled emergency workers not already in it.
    ///
    /// Non-empty whenever at least one worker is enabled.
    pub fn route_with_fallback(&self, category: TaskCategory) -> Vec<String> {
        let mut sequence: Vec<String> = self.table.candidates(category).to_vec();
        for id in self.table.emergency() {
            if self.registry.is_enabled(id) && !sequence.contains(id) {
                sequence.push(id.clone());
            }
        }
        if sequence.is_empty() {
            if let Some(best) = self.registry.ranked().first() {
                sequence.push(best.id.clone());
            }
        }
        sequence
    }

    /// Raw table row for `category`.
    pub fn fallback_chain(&self, category: TaskCategory) -> &[String] {
        self.table.candidates(category)
    }

    /// Emergency workers that are currently enabled.
    pub fn emergency_fallbacks(&self) -> Vec<String> {
        self.table
            .emergency()
            .iter()
            .filter(|id| self.registry.is_enabled(id))
            .cloned()
            .collect()
    }

    pub fn is_free_tier(&self, worker_id: &str) -> bool {
        self.registry
            .get(worker_id)
            .is_some_and(|p| p.cost_tier == CostTier::Budget)
    }

    pub fn best_for_capability(&self, cap: Capability) -> Option<String> {
        self.registry.best_for_capability(cap).map(|p| p.id.clone())
    }

    /// Table rows with ids resolved to "Name (Provider)"; unknown ids are dropped.
    pub fn resolved_table(&self) -> BTreeMap<TaskCategory, Vec<String>> {
        self.table
            .rows()
            .map(|(category, ids)| {
                let names = ids
                    .iter()
                    .filter_map(|id| self.registry.get(id))
                    .map(|p| p.display_name())
                    .collect();
                (category, names)
            })
            .collect()
    }

    /// How many successful `route` calls picked each worker.
    pub fn load_distribution(&self) -> BTreeMap<String, u64> {
        self.load.clone()
    }

    fn track(&mut self, worker_id: &str) {
        *self.load.entry(worker_id.to_string()).or_insert(0) += 1;
    }
}
