//! Search action: web search through a pluggable engine.
//!
//! The shipped engine is Bing Web Search v7. Results are rendered as a
//! numbered list of `title`, `url`, and snippet, and also attached as
//! structured data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::action::{Action, ActionArgs, ActionOutput, ActionSpec, required_str};
use tandem_core::error::ActionError;
use tracing::{debug, warn};
use url::Url;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub content: String,
    pub url: String,
}

/// Anything that can answer a web query with ranked hits.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, ActionError>;
}

// ── Bing ───────────────────────────────────────────────────────────────────

pub const BING_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";

/// Bing Web Search v7 client.
pub struct BingSearch {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl BingSearch {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            endpoint: BING_ENDPOINT.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(Duration::from_secs(secs))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        self
    }
}

#[async_trait]
impl SearchEngine for BingSearch {
    fn name(&self) -> &str {
        "bing"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, ActionError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ActionError::NotConfigured("search.api_key (or BING_SUBSCRIPTION_KEY) is not set".into())
        })?;

        let count = top_k.to_string();
        let url = Url::parse_with_params(
            &self.endpoint,
            [
                ("q", query),
                ("count", count.as_str()),
                ("textDecorations", "false"),
                ("textFormat", "Raw"),
            ],
        )
        .map_err(|e| ActionError::NotConfigured(format!("invalid search endpoint: {e}")))?;

        debug!(query, top_k, "Bing search");
        let response = self
            .client
            .get(url)
            .header("Ocp-Apim-Subscription-Key", api_key)
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {status}: {body}")));
        }

        let body: BingResponse = response
            .json()
            .await
            .map_err(|e| failed(format!("unreadable response: {e}")))?;

        Ok(body.into_hits(top_k))
    }
}

fn failed(reason: String) -> ActionError {
    ActionError::ExecutionFailed {
        action: "search".into(),
        reason,
    }
}

#[derive(Debug, Deserialize)]
struct BingResponse {
    #[serde(rename = "webPages")]
    web_pages: Option<BingWebPages>,
}

#[derive(Debug, Deserialize)]
struct BingWebPages {
    #[serde(default)]
    value: Vec<BingPage>,
}

#[derive(Debug, Deserialize)]
struct BingPage {
    name: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

impl BingResponse {
    fn into_hits(self, top_k: usize) -> Vec<SearchHit> {
        self.web_pages
            .map(|p| p.value)
            .unwrap_or_default()
            .into_iter()
            .take(top_k)
            .map(|p| SearchHit {
                title: p.name,
                content: p.snippet,
                url: p.url,
            })
            .collect()
    }
}

// ── Action ─────────────────────────────────────────────────────────────────

pub struct SearchAction {
    engine: Arc<dyn SearchEngine>,
    top_k: usize,
}

impl SearchAction {
    pub fn new(engine: Arc<dyn SearchEngine>, top_k: usize) -> Self {
        Self {
            engine,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl Action for SearchAction {
    fn name(&self) -> &str {
        "search"
    }

    fn spec(&self) -> ActionSpec {
        ActionSpec {
            name: "search".into(),
            label: "Internet Search".into(),
            args: vec![("query".into(), "search_query".into())],
        }
    }

    async fn execute(&self, args: &ActionArgs) -> Result<ActionOutput, ActionError> {
        let query = required_str(args, "query")?;
        let hits = self.engine.search(query, self.top_k).await?;
        Ok(ActionOutput {
            content: render_hits(&hits),
            data: serde_json::to_value(&hits).ok(),
        })
    }
}

pub fn render_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".into();
    }
    hits.iter()
        .enumerate()
        .map(|(i, h)| format!("{}. {} ({})\n{}", i + 1, h.title, h.url, h.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine(Vec<SearchHit>);

    #[async_trait]
    impl SearchEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<SearchHit>, ActionError> {
            Ok(self.0.iter().take(top_k).cloned().collect())
        }
    }

    fn hit(n: usize) -> SearchHit {
        SearchHit {
            title: format!("Title {n}"),
            content: format!("Snippet {n}"),
            url: format!("https://example.com/{n}"),
        }
    }

    #[test]
    fn parses_bing_payload() {
        let data = r#"{
            "_type": "SearchResponse",
            "webPages": {
                "totalEstimatedMatches": 2,
                "value": [
                    {"name": "The Rust Book", "url": "https://doc.rust-lang.org/book/", "snippet": "Learn Rust"},
                    {"name": "Rust by Example", "url": "https://doc.rust-lang.org/rust-by-example/"}
                ]
            }
        }"#;
        let parsed: BingResponse = serde_json::from_str(data).unwrap();
        let hits = parsed.into_hits(5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "The Rust Book");
        assert_eq!(hits[0].content, "Learn Rust");
        assert_eq!(hits[1].content, "");
    }

    #[test]
    fn payload_without_web_pages_is_empty() {
        let parsed: BingResponse = serde_json::from_str(r#"{"_type": "SearchResponse"}"#).unwrap();
        assert!(parsed.into_hits(5).is_empty());
    }

    #[tokio::test]
    async fn action_renders_ranked_hits() {
        let action = SearchAction::new(Arc::new(FixedEngine(vec![hit(1), hit(2), hit(3)])), 2);
        let mut args = ActionArgs::new();
        args.insert("query".into(), serde_json::json!("anything"));

        let out = action.execute(&args).await.unwrap();
        assert!(out.content.starts_with("1. Title 1 (https://example.com/1)"));
        assert!(!out.content.contains("Title 3"));
        assert_eq!(out.data.unwrap().as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bing_without_key_is_not_configured() {
        let err = BingSearch::new(None).search("q", 3).await.unwrap_err();
        assert!(matches!(err, ActionError::NotConfigured(_)));
    }

    #[test]
    fn empty_results_render_notice() {
        assert_eq!(render_hits(&[]), "No results found.");
    }
}
