//! Browse action: fetch a page, extract its text, shrink it to an answer.
//!
//! Markup inside `script`, `style`, `header`, `footer`, `nav`, and
//! `noscript` is dropped before the text reaches the summarizer.

use async_trait::async_trait;
use scraper::{Html, Node};
use std::sync::Arc;
use std::time::Duration;
use tandem_core::action::{Action, ActionArgs, ActionOutput, ActionSpec, required_str};
use tandem_core::error::ActionError;
use tracing::{debug, warn};
use url::Url;

use crate::summarize::Summarizer;

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "header", "footer", "nav", "noscript", "template"];

/// A fetched document.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
    pub content_type: Option<String>,
}

/// Retrieves raw documents by URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, ActionError>;
}

/// Plain HTTP GET via `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("tandem/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, ActionError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| failed(format!("fetch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status} from {url}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| failed(format!("unreadable body: {e}")))?;

        Ok(FetchedPage { body, content_type })
    }
}

fn failed(reason: String) -> ActionError {
    ActionError::ExecutionFailed {
        action: "browse".into(),
        reason,
    }
}

/// Readable text of an HTML document, whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            parts.push(text);
        }
    }

    parts
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_like_html(page: &FetchedPage) -> bool {
    match &page.content_type {
        Some(ct) => ct.contains("html"),
        None => page.body.trim_start().starts_with('<'),
    }
}

pub struct BrowseAction {
    fetcher: Arc<dyn PageFetcher>,
    summarizer: Summarizer,
}

impl BrowseAction {
    pub fn new(fetcher: Arc<dyn PageFetcher>, summarizer: Summarizer) -> Self {
        Self { fetcher, summarizer }
    }
}

#[async_trait]
impl Action for BrowseAction {
    fn name(&self) -> &str {
        "browse"
    }

    fn spec(&self) -> ActionSpec {
        ActionSpec {
            name: "browse".into(),
            label: "Browse".into(),
            args: vec![
                ("url".into(), "url".into()),
                ("type".into(), "html/pdf/unknown".into()),
                ("question".into(), "what_you_want_to_find_on_website".into()),
            ],
        }
    }

    async fn execute(&self, args: &ActionArgs) -> Result<ActionOutput, ActionError> {
        let raw_url = required_str(args, "url")?;
        let question = required_str(args, "question")?;
        let doc_type = args.get("type").and_then(|v| v.as_str()).unwrap_or("unknown");

        let url = Url::parse(raw_url)
            .map_err(|e| ActionError::InvalidArguments(format!("Invalid URL '{raw_url}': {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ActionError::InvalidArguments(
                "Only HTTP and HTTPS URLs are supported".into(),
            ));
        }
        if doc_type.eq_ignore_ascii_case("pdf") {
            return Err(failed("PDF documents are not supported".into()));
        }

        let page = self.fetcher.fetch(&url).await?;
        if page
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("pdf"))
        {
            return Err(failed(format!("{url} is a PDF document, which is not supported")));
        }
        let text = if looks_like_html(&page) {
            strip_html(&page.body)
        } else {
            page.body.split_whitespace().collect::<Vec<_>>().join(" ")
        };
        debug!(url = %url, chars = text.len(), "Fetched page");

        if text.is_empty() {
            return Ok(ActionOutput::text(format!("No readable text at {url}")));
        }

        let answer = self.summarizer.shrink(&text, question).await?;
        Ok(ActionOutput {
            content: answer,
            data: Some(serde_json::json!({ "url": url.as_str() })),
        })
    }
}
