use crate::profiles::{default_profiles, Capability, WorkerProfile};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Central registry for worker profiles.
///
/// Profiles keep their insertion order; re-registering an id replaces the
/// profile in place. The registry is built once and then shared read-only
/// (usually behind an `Arc`) by the router and the pipeline.
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    profiles: Vec<WorkerProfile>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            profiles: Vec::new(),
        }
    }

    /// A registry seeded with [`default_profiles`].
    pub fn with_defaults() -> Self {
        Self::from_profiles(default_profiles())
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = WorkerProfile>) -> Self {
        let mut registry = Self::new();
        for profile in profiles {
            registry.register(profile);
        }
        registry
    }

    /// Insert or replace a profile by id.
    pub fn register(&mut self, profile: WorkerProfile) {
        match self.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => {
                debug!(worker = %profile.id, "Replacing worker profile");
                *existing = profile;
            }
            None => {
                info!(worker = %profile.id, rank = profile.priority_rank, "Registered worker");
                self.profiles.push(profile);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&WorkerProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Whether `id` is registered and enabled.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.get(id).is_some_and(|p| p.enabled)
    }

    pub fn list_all(&self) -> &[WorkerProfile] {
        &self.profiles
    }

    pub fn list_enabled(&self) -> Vec<&WorkerProfile> {
        self.profiles.iter().filter(|p| p.enabled).collect()
    }

    pub fn has_enabled(&self) -> bool {
        self.profiles.iter().any(|p| p.enabled)
    }

    /// Enabled profiles advertising `cap`.
    pub fn find_by_capability(&self, cap: Capability) -> Vec<&WorkerProfile> {
        self.profiles
            .iter()
            .filter(|p| p.enabled && p.has_capability(cap))
            .collect()
    }

    /// Profiles from `provider`, compared case-insensitively. Includes disabled ones.
    pub fn find_by_provider(&self, provider: &str) -> Vec<&WorkerProfile> {
        self.profiles
            .iter()
            .filter(|p| p.provider.eq_ignore_ascii_case(provider))
            .collect()
    }

    /// Enabled profiles sorted by priority rank, ties kept in insertion order.
    pub fn ranked(&self) -> Vec<&WorkerProfile> {
        let mut enabled = self.list_enabled();
        enabled.sort_by_key(|p| p.priority_rank);
        enabled
    }

    /// Highest-ranked enabled worker advertising `cap`.
    pub fn best_for_capability(&self, cap: Capability) -> Option<&WorkerProfile> {
        let mut matches = self.find_by_capability(cap);
        matches.sort_by_key(|p| p.priority_rank);
        matches.into_iter().next()
    }

    /// Capability → names of the enabled workers covering it.
    pub fn coverage_matrix(&self) -> BTreeMap<Capability, Vec<String>> {
        Capability::ALL
            .iter()
            .map(|&cap| {
                let names = self
                    .find_by_capability(cap)
                    .into_iter()
                    .map(|p| p.name.clone())
                    .collect();
                (cap, names)
            })
            .collect()
    }

    /// Worker name → strengths, over every registered profile.
    pub fn strengths_report(&self) -> BTreeMap<String, Vec<String>> {
        self.profiles
            .iter()
            .map(|p| (p.name.clone(), p.strengths.clone()))
            .collect()
    }

    /// Worker name → weaknesses, over every registered profile.
    pub fn weaknesses_report(&self) -> BTreeMap<String, Vec<String>> {
        self.profiles
            .iter()
            .map(|p| (p.name.clone(), p.weaknesses.clone()))
            .collect()
    }

    /// Full profile dump keyed by worker id.
    pub fn export_profiles(&self) -> BTreeMap<String, WorkerProfile> {
        self.profiles
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect()
    }

    /// Worker id → whether its API key variable is set. Workers that
    /// declare no variable are left out.
    pub fn credential_status(&self) -> BTreeMap<String, bool> {
        self.profiles
            .iter()
            .filter_map(|p| p.credential_present().map(|present| (p.id.clone(), present)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::profiles::CostTier;

    fn worker(id: &str, rank: u32) -> WorkerProfile {
        WorkerProfile::new(id, id.to_uppercase(), "Acme").with_rank(rank)
    }

    #[test]
    fn test_empty_registry() {
        let registry = WorkerRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.has_enabled());
        assert!(registry.ranked().is_empty());
        assert!(registry.get("w1").is_none());
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = WorkerRegistry::new();
        registry.register(worker("w1", 1));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("w1").unwrap().name, "W1");
        assert!(registry.is_enabled("w1"));
        assert!(!registry.is_enabled("nope"));
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = WorkerRegistry::from_profiles([worker("w1", 1), worker("w2", 2)]);
        registry.register(worker("w1", 9).disabled());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list_all()[0].id, "w1");
        assert_eq!(registry.get("w1").unwrap().priority_rank, 9);
        assert!(!registry.is_enabled("w1"));
    }

    #[test]
    fn test_list_enabled_skips_disabled() {
        let registry = WorkerRegistry::from_profiles([
            worker("w1", 1),
            worker("w2", 2).disabled(),
            worker("w3", 3),
        ]);
        let ids: Vec<&str> = registry.list_enabled().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w3"]);
    }

    #[test]
    fn test_ranked_is_stable() {
        let registry = WorkerRegistry::from_profiles([
            worker("c", 3),
            worker("a", 1),
            worker("b2", 2),
            worker("b1", 2),
            worker("z", 0).disabled(),
        ]);
        let ids: Vec<&str> = registry.ranked().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b2", "b1", "c"]);
    }

    #[test]
    fn test_find_by_capability() {
        let registry = WorkerRegistry::from_profiles([
            worker("w1", 2).with_capabilities(&[Capability::Testing]),
            worker("w2", 1).with_capabilities(&[Capability::Testing]).disabled(),
            worker("w3", 3).with_capabilities(&[Capability::Testing, Capability::CiCd]),
        ]);
        let found: Vec<&str> = registry
            .find_by_capability(Capability::Testing)
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(found, vec!["w1", "w3"]);
        assert_eq!(
            registry.best_for_capability(Capability::Testing).unwrap().id,
            "w1"
        );
        assert!(registry.best_for_capability(Capability::LegalDrafting).is_none());
    }

    #[test]
    fn test_find_by_provider_case_insensitive() {
        let registry = WorkerRegistry::with_defaults();
        let google = registry.find_by_provider("google");
        let ids: Vec<&str> = google.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["google_cloud_cli", "gemini_free"]);
    }

    #[test]
    fn test_defaults_seed() {
        let registry = WorkerRegistry::with_defaults();
        assert_eq!(registry.ranked()[0].id, "openai_codex");
        assert_eq!(registry.get("groq").unwrap().cost_tier, CostTier::Budget);
    }

    #[test]
    fn test_coverage_matrix_lists_every_capability() {
        let registry = WorkerRegistry::with_defaults();
        let matrix = registry.coverage_matrix();
        assert_eq!(matrix.len(), Capability::ALL.len());
        assert!(matrix[&Capability::LegalDrafting].contains(&"Abacus AI".to_string()));
    }

    #[test]
    fn test_strengths_and_weaknesses_reports() {
        let registry = WorkerRegistry::from_profiles([
            worker("w1", 1).with_strengths(&["fast"]).with_weaknesses(&["costly"]),
            worker("w2", 2).disabled(),
        ]);
        let strengths = registry.strengths_report();
        assert_eq!(strengths.len(), 2);
        assert_eq!(strengths["W1"], vec!["fast".to_string()]);
        assert!(strengths["W2"].is_empty());
        assert_eq!(registry.weaknesses_report()["W1"], vec!["costly".to_string()]);

        let defaults = WorkerRegistry::with_defaults();
        assert_eq!(defaults.strengths_report().len(), defaults.len());
    }

    #[test]
    fn test_export_profiles_keyed_by_id() {
        let registry = WorkerRegistry::with_defaults();
        let exported = registry.export_profiles();
        assert_eq!(exported.len(), 14);
        assert_eq!(exported["firecrawl"].max_context_tokens, 16_000);

        let json = serde_json::to_value(&exported).unwrap();
        assert_eq!(json["manus"]["supports_sandbox"], true);
        assert_eq!(json["manus"]["api_env_var"], "MANUS_API_KEY");
    }

    #[test]
    fn test_credential_status_follows_env() {
        let var = "AGENTX_REGISTRY_TEST_CREDENTIAL";
        let registry = WorkerRegistry::from_profiles([
            worker("keyed", 1).with_api_env_var(var),
            worker("keyless", 2),
        ]);

        std::env::remove_var(var);
        let status = registry.credential_status();
        assert_eq!(status.len(), 1);
        assert!(!status["keyed"]);

        std::env::set_var(var, "token");
        assert!(registry.credential_status()["keyed"]);
        std::env::remove_var(var);
    }
}
