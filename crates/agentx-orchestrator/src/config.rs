use serde::{Deserialize, Serialize};

/// Pipeline-level settings. Every key has a default so an empty `[pipeline]`
/// table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub owner: Option<String>,
    /// Advisory; the core never dispatches tasks concurrently.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_workers: usize,
    /// When false a failed task never enters remediation.
    #[serde(default = "default_true")]
    pub enable_remediation: bool,
    /// When false audit events are still stored but not traced.
    #[serde(default = "default_true")]
    pub enable_audit_log: bool,
    /// Fill an empty fallback list from the router's fallback sequence.
    #[serde(default)]
    pub auto_fallback: bool,
    /// Check each worker's `api_env_var` at construction and in status output.
    #[serde(default = "default_true")]
    pub check_credentials: bool,
    /// Advisory; carried into reports for downstream executors.
    #[serde(default = "default_true")]
    pub enable_rollback: bool,
    /// Advisory; carried into reports for downstream executors.
    #[serde(default)]
    pub sandbox_mode: bool,
}

fn default_name() -> String {
    "AgentX Multi-Agent Pipeline".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_max_concurrent() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            owner: None,
            max_concurrent_workers: default_max_concurrent(),
            enable_remediation: true,
            enable_audit_log: true,
            auto_fallback: false,
            check_credentials: true,
            enable_rollback: true,
            sandbox_mode: false,
        }
    }
}

impl PipelineConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
