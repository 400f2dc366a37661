//! Core error definitions for the AgentX orchestration crates.
//!
//! Every fallible operation in the workspace returns [`AgentxResult`]. Task-level
//! failures (a worker reporting an error, a blocked dependency) are recorded on
//! the task itself and never surface here; this enum only carries conditions
//! the caller has to act on.
//!
//! # Main types
//!
//! - [`AgentxError`]: Unified error enum for all AgentX subsystems.
//! - [`AgentxResult`]: Convenience alias for `Result<T, AgentxError>`.

/// Top-level error type for the AgentX crates.
#[derive(Debug, thiserror::Error)]
pub enum AgentxError {
    /// The router found no enabled worker for the category. Only possible when
    /// the registry holds zero enabled workers.
    #[error("No worker available for category '{category}'")]
    NoWorkerAvailable {
        /// Wire value of the category that could not be routed.
        category: String,
    },

    /// A task id did not resolve in the task queue.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An executor backend could not be constructed or invoked.
    #[error("Executor error: {0}")]
    Executor(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`AgentxError`].
pub type AgentxResult<T> = Result<T, AgentxError>;

impl AgentxError {
    /// Build a [`AgentxError::NoWorkerAvailable`] for the given category label.
    pub fn no_worker(category: impl Into<String>) -> Self {
        Self::NoWorkerAvailable {
            category: category.into(),
        }
    }

    /// Whether this error means the registry cannot route anything at all.
    pub fn is_no_worker(&self) -> bool {
        matches!(self, Self::NoWorkerAvailable { .. })
    }
}
