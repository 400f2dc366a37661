use agentx_core::{AgentxError, AgentxResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability tag advertised by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    CodeGeneration,
    CodeReview,
    Debugging,
    Testing,
    Deployment,
    CiCd,
    #[serde(rename = "cloud_infrastructure")]
    CloudInfra,
    IdeAutomation,
    WorkflowAutomation,
    RepoManagement,
    LegalDrafting,
    FinancialAnalysis,
    WebCrawling,
    DataExtraction,
    SandboxExecution,
    Documentation,
    SecurityAudit,
    Refactoring,
    Architecture,
    ApiIntegration,
}

impl Capability {
    pub const ALL: [Capability; 20] = [
        Capability::CodeGeneration,
        Capability::CodeReview,
        Capability::Debugging,
        Capability::Testing,
        Capability::Deployment,
        Capability::CiCd,
        Capability::CloudInfra,
        Capability::IdeAutomation,
        Capability::WorkflowAutomation,
        Capability::RepoManagement,
        Capability::LegalDrafting,
        Capability::FinancialAnalysis,
        Capability::WebCrawling,
        Capability::DataExtraction,
        Capability::SandboxExecution,
        Capability::Documentation,
        Capability::SecurityAudit,
        Capability::Refactoring,
        Capability::Architecture,
        Capability::ApiIntegration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CodeGeneration => "code_generation",
            Capability::CodeReview => "code_review",
            Capability::Debugging => "debugging",
            Capability::Testing => "testing",
            Capability::Deployment => "deployment",
            Capability::CiCd => "ci_cd",
            Capability::CloudInfra => "cloud_infrastructure",
            Capability::IdeAutomation => "ide_automation",
            Capability::WorkflowAutomation => "workflow_automation",
            Capability::RepoManagement => "repo_management",
            Capability::LegalDrafting => "legal_drafting",
            Capability::FinancialAnalysis => "financial_analysis",
            Capability::WebCrawling => "web_crawling",
            Capability::DataExtraction => "data_extraction",
            Capability::SandboxExecution => "sandbox_execution",
            Capability::Documentation => "documentation",
            Capability::SecurityAudit => "security_audit",
            Capability::Refactoring => "refactoring",
            Capability::Architecture => "architecture",
            Capability::ApiIntegration => "api_integration",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = AgentxError;

    fn from_str(s: &str) -> AgentxResult<Self> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AgentxError::Config(format!("Unknown capability: {s}")))
    }
}

/// Pricing bucket of a worker. `Budget` workers form the emergency chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Budget,
    #[default]
    Standard,
    Premium,
}

impl CostTier {
    pub fn label(&self) -> &'static str {
        match self {
            CostTier::Budget => "Budget / free tier",
            CostTier::Standard => "Standard",
            CostTier::Premium => "Premium",
        }
    }
}

/// Static metadata for one execution backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub description: String,
    /// Environment variable holding this worker's API key, if it needs one.
    #[serde(default)]
    pub api_env_var: Option<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    /// 1 = highest priority.
    #[serde(default = "default_rank")]
    pub priority_rank: u32,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub max_context_tokens: u32,
    #[serde(default)]
    pub supports_streaming: bool,
    #[serde(default)]
    pub supports_sandbox: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub cost_tier: CostTier,
}

fn default_rank() -> u32 {
    5
}

fn default_enabled() -> bool {
    true
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl WorkerProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider: provider.into(),
            description: String::new(),
            api_env_var: None,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            priority_rank: default_rank(),
            capabilities: Vec::new(),
            max_context_tokens: 0,
            supports_streaming: false,
            supports_sandbox: false,
            enabled: true,
            cost_tier: CostTier::default(),
        }
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.priority_rank = rank;
        self
    }

    pub fn with_capabilities(mut self, caps: &[Capability]) -> Self {
        self.capabilities = caps.to_vec();
        self
    }

    pub fn with_tier(mut self, tier: CostTier) -> Self {
        self.cost_tier = tier;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_api_env_var(mut self, var: impl Into<String>) -> Self {
        self.api_env_var = Some(var.into());
        self
    }

    pub fn with_strengths(mut self, strengths: &[&str]) -> Self {
        self.strengths = owned(strengths);
        self
    }

    pub fn with_weaknesses(mut self, weaknesses: &[&str]) -> Self {
        self.weaknesses = owned(weaknesses);
        self
    }

    /// Context window, streaming and sandbox support.
    pub fn with_limits(mut self, max_context_tokens: u32, streaming: bool, sandbox: bool) -> Self {
        self.max_context_tokens = max_context_tokens;
        self.supports_streaming = streaming;
        self.supports_sandbox = sandbox;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    /// "Name (Provider)", as shown in routing reports.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.provider)
    }

    /// Whether the API key variable is set to a non-empty value.
    /// `None` when the worker declares no variable.
    pub fn credential_present(&self) -> Option<bool> {
        self.api_env_var
            .as_deref()
            .map(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
    }
}

/// The offline-curated worker table used to seed a registry.
pub fn default_profiles() -> Vec<WorkerProfile> {
    use Capability::*;

    vec![
        WorkerProfile::new("claude_code", "Claude Code", "Anthropic")
            .with_description("Code architect for structure, planning and multi-file refactoring.")
            .with_api_env_var("ANTHROPIC_API_KEY")
            .with_strengths(&[
                "Code architecture and structural design",
                "Multi-file refactoring with full context",
                "Root-cause debugging and error analysis",
                "Documentation and code explanation",
            ])
            .with_weaknesses(&[
                "No isolated sandbox execution",
                "No inline IDE completions",
            ])
            .with_limits(200_000, true, false)
            .with_rank(2)
            .with_tier(CostTier::Premium)
            .with_capabilities(&[
                CodeGeneration,
                CodeReview,
                Debugging,
                Documentation,
                Refactoring,
                Architecture,
                SecurityAudit,
                ApiIntegration,
            ]),
        WorkerProfile::new("openai_codex", "OpenAI Codex", "OpenAI")
            .with_description("Autonomous coder with sandboxed execution; first choice for coding.")
            .with_api_env_var("OPENAI_API_KEY")
            .with_strengths(&[
                "Autonomous code generation across languages",
                "Sandboxed execution and runtime testing",
                "Rapid prototyping",
            ])
            .with_weaknesses(&[
                "Costly for long autonomous sessions",
                "May over-engineer simple solutions",
            ])
            .with_limits(128_000, true, true)
            .with_rank(1)
            .with_tier(CostTier::Premium)
            .with_capabilities(&[
                CodeGeneration,
                Debugging,
                Testing,
                SandboxExecution,
                ApiIntegration,
                Deployment,
                Refactoring,
            ]),
        WorkerProfile::new("github_copilot", "GitHub Copilot CLI", "GitHub / Microsoft")
            .with_description("IDE completion, Copilot CLI and GitHub workflow integration.")
            .with_api_env_var("GITHUB_TOKEN")
            .with_strengths(&[
                "Inline completion and boilerplate generation",
                "Native pull request and Actions integration",
            ])
            .with_weaknesses(&[
                "Suggestion-based, not autonomous",
                "Small context window",
            ])
            .with_limits(8_000, true, false)
            .with_rank(3)
            .with_capabilities(&[
                CodeGeneration,
                CodeReview,
                CiCd,
                RepoManagement,
                Deployment,
                IdeAutomation,
            ]),
        WorkerProfile::new("google_cloud_cli", "Google Cloud CLI (Gemini)", "Google")
            .with_description("Cloud SDK with Gemini assistance for GCP infrastructure and deployment.")
            .with_api_env_var("GOOGLE_APPLICATION_CREDENTIALS")
            .with_strengths(&[
                "GCP infrastructure and GKE management",
                "Serverless deployment",
            ])
            .with_weaknesses(&[
                "Tied to Google Cloud",
                "Not a general-purpose code generator",
            ])
            .with_limits(32_000, false, true)
            .with_rank(5)
            .with_capabilities(&[CloudInfra, Deployment, SecurityAudit, DataExtraction]),
        WorkerProfile::new("vscode_ai", "VS Code AI Extensions", "Microsoft")
            .with_description("Editor-integrated assistance for debugging and workspace automation.")
            .with_api_env_var("GITHUB_TOKEN")
            .with_strengths(&[
                "Integrated debugging and terminal automation",
                "Workspace configuration management",
            ])
            .with_weaknesses(&[
                "Needs a desktop or codespace session",
                "Cannot run headless in CI",
            ])
            .with_limits(8_000, true, false)
            .with_rank(6)
            .with_tier(CostTier::Budget)
            .with_capabilities(&[IdeAutomation, Debugging, CodeGeneration, RepoManagement]),
        WorkerProfile::new("gitlab_duo", "GitHub / GitLab Duo", "GitLab")
            .with_description("Repository management, CI/CD pipelines and DevSecOps scanning.")
            .with_api_env_var("GITLAB_TOKEN")
            .with_strengths(&[
                "CI/CD pipeline creation and debugging",
                "SAST, DAST and dependency scanning",
                "Environment and release management",
            ])
            .with_weaknesses(&[
                "DevOps focus, weak at code generation",
                "Complex YAML for advanced pipelines",
            ])
            .with_limits(16_000, false, true)
            .with_rank(4)
            .with_capabilities(&[CiCd, Deployment, RepoManagement, SecurityAudit, Testing]),
        WorkerProfile::new("zapier_duo", "Zapier Duo", "Zapier")
            .with_description("Workflow automation across third-party services.")
            .with_api_env_var("ZAPIER_API_KEY")
            .with_strengths(&[
                "Event-driven cross-platform automation",
                "Data mapping between services",
            ])
            .with_weaknesses(&[
                "No code generation or review",
                "Rate limits on high-volume workflows",
            ])
            .with_limits(4_000, false, false)
            .with_rank(7)
            .with_capabilities(&[WorkflowAutomation, ApiIntegration, DataExtraction]),
        WorkerProfile::new("manus", "Manus Autonomous Agent", "Manus AI")
            .with_description("Autonomous agent running multi-step terminal work in an isolated sandbox.")
            .with_api_env_var("MANUS_API_KEY")
            .with_strengths(&[
                "Unattended terminal and package operations",
                "Multi-step task orchestration with live progress",
            ])
            .with_weaknesses(&[
                "Sandbox resets between sessions",
                "Higher latency on long operations",
            ])
            .with_limits(128_000, true, true)
            .with_rank(2)
            .with_tier(CostTier::Premium)
            .with_capabilities(&[
                SandboxExecution,
                Deployment,
                Testing,
                CodeGeneration,
                CloudInfra,
                WebCrawling,
            ]),
        WorkerProfile::new("abacus_ai", "Abacus AI", "Abacus.AI")
            .with_description("Legal drafting, financial modelling and compliance documents.")
            .with_api_env_var("ABACUS_API_KEY")
            .with_strengths(&[
                "Legal and compliance document drafting",
                "Financial analysis and fraud modelling",
            ])
            .with_weaknesses(&[
                "Not meant for general software development",
                "Needs per-jurisdiction configuration",
            ])
            .with_limits(64_000, true, false)
            .with_rank(3)
            .with_tier(CostTier::Premium)
            .with_capabilities(&[
                LegalDrafting,
                FinancialAnalysis,
                Documentation,
                DataExtraction,
                SecurityAudit,
            ]),
        WorkerProfile::new("firecrawl", "Firecrawl", "Firecrawl")
            .with_description("Web crawling and structured data extraction.")
            .with_api_env_var("FIRECRAWL_API_KEY")
            .with_strengths(&[
                "JavaScript-rendered page crawling",
                "Structured JSON and markdown output",
            ])
            .with_weaknesses(&[
                "Read-only",
                "Rate limited on large crawls",
            ])
            .with_limits(16_000, false, false)
            .with_rank(8)
            .with_capabilities(&[WebCrawling, DataExtraction]),
        // Free-tier backups, reached through the emergency chain.
        WorkerProfile::new("groq", "Groq (Llama)", "Groq")
            .with_description("Free-tier hosted Llama models with low latency.")
            .with_api_env_var("GROQ_API_KEY")
            .with_strengths(&["Very fast inference"])
            .with_weaknesses(&["Strict free-tier rate limits"])
            .with_rank(9)
            .with_tier(CostTier::Budget)
            .with_capabilities(&[CodeGeneration, Documentation]),
        WorkerProfile::new("gemini_free", "Gemini Flash (free tier)", "Google")
            .with_description("Free-tier Gemini Flash model.")
            .with_api_env_var("GEMINI_API_KEY")
            .with_strengths(&["Large free context window"])
            .with_weaknesses(&["Daily request quota"])
            .with_rank(10)
            .with_tier(CostTier::Budget)
            .with_capabilities(&[CodeGeneration, Documentation, DataExtraction]),
        WorkerProfile::new("deepseek", "DeepSeek Coder", "DeepSeek")
            .with_description("Low-cost code model.")
            .with_api_env_var("DEEPSEEK_API_KEY")
            .with_strengths(&["Cheap code completion"])
            .with_weaknesses(&["Weaker at long-form reasoning"])
            .with_rank(11)
            .with_tier(CostTier::Budget)
            .with_capabilities(&[CodeGeneration, Debugging]),
        WorkerProfile::new("cloudflare_workers_ai", "Cloudflare Workers AI", "Cloudflare")
            .with_description("Edge-hosted open models on the Workers free allowance.")
            .with_api_env_var("CLOUDFLARE_API_TOKEN")
            .with_strengths(&["Always-on edge availability"])
            .with_weaknesses(&["Small models only"])
            .with_rank(12)
            .with_tier(CostTier::Budget)
            .with_capabilities(&[CodeGeneration]),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_profiles_unique_ids() {
        let profiles = default_profiles();
        let ids: HashSet<&str> = profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), profiles.len());
    }

    #[test]
    fn test_default_profiles_have_capabilities() {
        for profile in default_profiles() {
            assert!(!profile.capabilities.is_empty(), "{} has no capabilities", profile.id);
            assert!(profile.priority_rank >= 1);
            assert!(profile.enabled);
        }
    }

    #[test]
    fn test_free_backups_are_budget() {
        let profiles = default_profiles();
        for id in ["groq", "gemini_free", "deepseek", "cloudflare_workers_ai"] {
            let p = profiles.iter().find(|p| p.id == id).unwrap();
            assert_eq!(p.cost_tier, CostTier::Budget, "{id}");
        }
        let codex = profiles.iter().find(|p| p.id == "openai_codex").unwrap();
        assert_eq!(codex.cost_tier, CostTier::Premium);
        assert_eq!(codex.priority_rank, 1);
    }

    #[test]
    fn test_capability_serde_names() {
        let json = serde_json::to_string(&Capability::CloudInfra).unwrap();
        assert_eq!(json, "\"cloud_infrastructure\"");
        let parsed: Capability = serde_json::from_str("\"ci_cd\"").unwrap();
        assert_eq!(parsed, Capability::CiCd);
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
            assert_eq!(
                serde_json::to_string(&cap).unwrap(),
                format!("\"{}\"", cap.as_str())
            );
        }
    }

    #[test]
    fn test_profile_toml_defaults() {
        let profile: WorkerProfile =
            toml::from_str("id = \"w1\"\nname = \"W1\"\nprovider = \"Acme\"").unwrap();
        assert_eq!(profile.priority_rank, 5);
        assert!(profile.enabled);
        assert_eq!(profile.cost_tier, CostTier::Standard);
        assert!(profile.capabilities.is_empty());
        assert!(profile.description.is_empty());
        assert!(profile.api_env_var.is_none());
        assert_eq!(profile.max_context_tokens, 0);
        assert!(!profile.supports_streaming);
    }

    #[test]
    fn test_default_profiles_carry_metadata() {
        let profiles = default_profiles();
        for profile in &profiles {
            assert!(!profile.description.is_empty(), "{}", profile.id);
            assert!(profile.api_env_var.is_some(), "{}", profile.id);
            assert!(!profile.strengths.is_empty(), "{}", profile.id);
            assert!(!profile.weaknesses.is_empty(), "{}", profile.id);
        }
        let claude = profiles.iter().find(|p| p.id == "claude_code").unwrap();
        assert_eq!(claude.api_env_var.as_deref(), Some("ANTHROPIC_API_KEY"));
        assert_eq!(claude.max_context_tokens, 200_000);
        assert!(claude.supports_streaming);
        assert!(!claude.supports_sandbox);
    }

    #[test]
    fn test_credential_present_reads_env() {
        let var = "AGENTX_PROFILES_TEST_CREDENTIAL";
        let profile = WorkerProfile::new("w", "W", "Acme").with_api_env_var(var);
        assert_eq!(WorkerProfile::new("x", "X", "Acme").credential_present(), None);

        std::env::remove_var(var);
        assert_eq!(profile.credential_present(), Some(false));
        std::env::set_var(var, "");
        assert_eq!(profile.credential_present(), Some(false));
        std::env::set_var(var, "secret");
        assert_eq!(profile.credential_present(), Some(true));
        std::env::remove_var(var);
    }

    #[test]
    fn test_display_name() {
        let p = WorkerProfile::new("w", "Worker", "Acme");
        assert_eq!(p.display_name(), "Worker (Acme)");
    }
}
