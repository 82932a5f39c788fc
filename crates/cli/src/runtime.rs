//! Wiring from `AppConfig` to a running agent.

use std::sync::Arc;
use std::time::Duration;

use tandem_actions::{ActionSettings, ShrinkSettings, default_registry};
use tandem_agent::{AgentLoop, AgentSession, BudgetShares, ContextBudgeter, LoopSettings, Planner};
use tandem_config::AppConfig;
use tandem_core::error::MemoryError;
use tandem_core::event::EventSink;
use tandem_core::identity::Identity;
use tandem_core::memory::{Embedder, LongTermStore};
use tandem_core::provider::Provider;
use tandem_memory::{
    FileStore, HashEmbedder, InMemoryStore, LongTermMemory, ProviderEmbedder, ShortTermConfig, ShortTermMemory,
};
use tracing::info;

/// Output size of OpenAI's `text-embedding-3-small`.
const PROVIDER_EMBEDDING_DIMENSIONS: usize = 1536;

/// Everything one agent process shares across sessions.
pub struct Runtime {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub embedder: Arc<dyn Embedder>,
    pub long_term: LongTermMemory,
}

impl Runtime {
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let router = tandem_providers::build_from_config(&config);
        let provider = router.default().ok_or("No default provider configured")?;
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: AppConfig, provider: Arc<dyn Provider>) -> Result<Self, Box<dyn std::error::Error>> {
        let embedder = build_embedder(&config, provider.clone());
        let store = build_store(&config)?;
        info!(
            provider = provider.name(),
            store = store.name(),
            embedder = embedder.name(),
            "Runtime ready"
        );
        let long_term = LongTermMemory::new(store, embedder.clone());
        Ok(Self {
            config,
            provider,
            embedder,
            long_term,
        })
    }

    pub fn agent(&self, events: Arc<dyn EventSink>) -> AgentLoop {
        let registry = default_registry(self.provider.clone(), &action_settings(&self.config));
        let planner = Planner::new(
            self.provider.clone(),
            self.config.default_model.clone(),
            ContextBudgeter::new(budget_shares(&self.config)),
        )
        .with_temperature(self.config.temperature);

        AgentLoop::new(self.provider.clone(), self.config.default_model.clone(), Arc::new(registry))
            .with_planner(planner)
            .with_settings(loop_settings(&self.config))
            .with_events(events)
    }

    pub fn session(&self) -> AgentSession {
        let memory = &self.config.memory;
        let short_term = ShortTermMemory::with_config(
            self.embedder.clone(),
            ShortTermConfig {
                decay_rate: memory.decay_rate,
                similarity_weight: memory.similarity_weight,
                recency_weight: memory.recency_weight,
            },
        );
        AgentSession::new(identity(&self.config), short_term, self.long_term.clone())
    }
}

pub fn identity(config: &AppConfig) -> Identity {
    let identity = Identity::new(config.identity.name.clone(), config.identity.personalities.clone());
    match &config.identity.location {
        Some(location) => identity.with_location(location.clone()),
        None => identity,
    }
}

pub fn build_embedder(config: &AppConfig, provider: Arc<dyn Provider>) -> Arc<dyn Embedder> {
    match config.memory.embedder.as_str() {
        "provider" => Arc::new(ProviderEmbedder::new(
            provider,
            config.memory.embedding_model.clone(),
            PROVIDER_EMBEDDING_DIMENSIONS,
        )),
        _ => Arc::new(HashEmbedder::new(config.memory.hash_dimensions)),
    }
}

pub fn build_store(config: &AppConfig) -> Result<Arc<dyn LongTermStore>, MemoryError> {
    Ok(match config.memory.store.as_str() {
        "memory" => Arc::new(InMemoryStore::new()),
        _ => Arc::new(FileStore::open(config.memory.resolved_path())?),
    })
}

pub fn budget_shares(config: &AppConfig) -> BudgetShares {
    BudgetShares {
        total: config.budget.total_tokens,
        short_term: config.budget.short_term_tokens,
        long_term: config.budget.long_term_tokens,
        history: config.budget.history_tokens,
    }
}

pub fn loop_settings(config: &AppConfig) -> LoopSettings {
    LoopSettings {
        action_credit: config.agent.action_credit,
        history_window: config.agent.history_window,
        short_term_top_k: config.agent.short_term_top_k,
        long_term_top_k: config.agent.long_term_top_k,
        relevance_threshold: config.memory.relevance_threshold,
        dedup_threshold: config.memory.dedup_threshold,
        action_timeout: Duration::from_secs(config.agent.action_timeout_secs),
        request_timeout: Duration::from_secs(config.agent.request_timeout_secs),
    }
}

pub fn action_settings(config: &AppConfig) -> ActionSettings {
    let browse = &config.browse;
    ActionSettings {
        search_api_key: config.search.api_key.clone(),
        search_endpoint: config.search.endpoint.clone(),
        search_top_k: config.search.top_k,
        http_timeout_secs: config.agent.action_timeout_secs,
        math_model: config.default_model.clone(),
        summary_model: if browse.use_fast_model {
            config.fast_model.clone()
        } else {
            config.default_model.clone()
        },
        shrink: ShrinkSettings {
            chunk_tokens: browse.chunk_tokens,
            chunk_overlap: browse.chunk_overlap,
            target_tokens: browse.target_tokens,
            max_rounds: browse.max_rounds,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::default();
        config.agent.action_credit = 3;
        config.memory.relevance_threshold = 0.2;
        config.budget.total_tokens = 3000;

        let settings = loop_settings(&config);
        assert_eq!(settings.action_credit, 3);
        assert_eq!(settings.relevance_threshold, 0.2);
        assert_eq!(budget_shares(&config).total, 3000);
    }

    #[test]
    fn browse_uses_fast_model_when_asked() {
        let mut config = AppConfig::default();
        assert_eq!(action_settings(&config).summary_model, config.fast_model);
        config.browse.use_fast_model = false;
        assert_eq!(action_settings(&config).summary_model, config.default_model);
    }

    #[test]
    fn memory_store_and_embedder_selection() {
        let mut config = AppConfig::default();
        config.memory.store = "memory".into();
        config.memory.embedder = "hash".into();
        config.memory.hash_dimensions = 64;

        assert_eq!(build_store(&config).unwrap().name(), "in_memory");
        let router = tandem_providers::build_from_config(&config);
        let embedder = build_embedder(&config, router.default().unwrap());
        assert_eq!(embedder.dimensions(), 64);
    }

    #[test]
    fn unreadable_memory_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.memory.store = "file".into();
        config.memory.path = Some(dir.path().to_path_buf());
        assert!(build_store(&config).is_err());
    }

    #[test]
    fn identity_carries_location() {
        let mut config = AppConfig::default();
        config.identity.location = Some("Singapore".into());
        assert_eq!(identity(&config).location.as_deref(), Some("Singapore"));
    }
}
