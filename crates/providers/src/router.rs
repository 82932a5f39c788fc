//! Gateway selection: one OpenAI-compatible client per configured backend.

use std::collections::BTreeMap;
use std::sync::Arc;
use tandem_config::AppConfig;
use tandem_core::provider::Provider;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// Named language-model backends with one designated default.
pub struct ProviderRouter {
    providers: BTreeMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: BTreeMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// The backend used for planning, actions and embeddings.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.get(&self.default_provider)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

/// Build every `[providers.*]` backend, plus the default one when it has no
/// table of its own. A backend without its own key falls back to the
/// top-level `api_key`.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, table) in &config.providers {
        let key = table.api_key.as_deref().or(config.api_key.as_deref());
        router.register(name.clone(), client(config, name, table.api_url.as_deref(), key));
    }

    if router.get(&config.default_provider).is_none() {
        let name = &config.default_provider;
        router.register(name.clone(), client(config, name, None, config.api_key.as_deref()));
    }

    debug!(default = %config.default_provider, backends = ?router.names(), "Providers built");
    router
}

fn client(config: &AppConfig, name: &str, api_url: Option<&str>, api_key: Option<&str>) -> Arc<dyn Provider> {
    let base_url = api_url.map(str::to_string).unwrap_or_else(|| default_base_url(name));
    Arc::new(
        OpenAiCompatProvider::new(name, &base_url, api_key.unwrap_or_default())
            .with_timeout(config.agent.request_timeout_secs),
    )
}

fn default_base_url(name: &str) -> String {
    match name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        _ => format!("https://{name}/v1"),
    }
}
