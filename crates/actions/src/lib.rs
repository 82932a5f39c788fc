//! Built-in actions for Tandem.
//!
//! Actions give the planner a way to reach outside its memory: search the
//! web, read a page, work a math problem. Each one implements
//! `tandem_core::Action` and is dispatched by name through the
//! `ActionRegistry`; none of them touch agent state.

pub mod browse;
pub mod math;
pub mod search;
pub mod summarize;

use std::sync::Arc;
use tandem_core::action::ActionRegistry;
use tandem_core::provider::Provider;

pub use browse::{BrowseAction, FetchedPage, HttpFetcher, PageFetcher, strip_html};
pub use math::{MathAction, evaluate};
pub use search::{BingSearch, SearchAction, SearchEngine, SearchHit};
pub use summarize::{ShrinkSettings, Summarizer, split_into_chunks};

/// Wiring for [`default_registry`].
#[derive(Debug, Clone)]
pub struct ActionSettings {
    pub search_api_key: Option<String>,
    pub search_endpoint: String,
    pub search_top_k: usize,
    /// HTTP timeout for search and page fetches
    pub http_timeout_secs: u64,
    /// Model for the math fallback
    pub math_model: String,
    /// Model for page summarisation
    pub summary_model: String,
    pub shrink: ShrinkSettings,
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            search_api_key: None,
            search_endpoint: search::BING_ENDPOINT.into(),
            search_top_k: 5,
            http_timeout_secs: 60,
            math_model: "gpt-4".into(),
            summary_model: "gpt-3.5-turbo".into(),
            shrink: ShrinkSettings::default(),
        }
    }
}

/// Create a registry with `search`, `browse`, and `math`.
pub fn default_registry(provider: Arc<dyn Provider>, settings: &ActionSettings) -> ActionRegistry {
    let mut registry = ActionRegistry::new();

    let engine = BingSearch::new(settings.search_api_key.clone())
        .with_endpoint(settings.search_endpoint.clone())
        .with_timeout(settings.http_timeout_secs);
    registry.register(Arc::new(SearchAction::new(Arc::new(engine), settings.search_top_k)));

    let summarizer =
        Summarizer::new(provider.clone(), settings.summary_model.clone()).with_settings(settings.shrink);
    registry.register(Arc::new(BrowseAction::new(
        Arc::new(HttpFetcher::new(settings.http_timeout_secs)),
        summarizer,
    )));

    registry.register(Arc::new(MathAction::new(provider, settings.math_model.clone())));

    registry
}
