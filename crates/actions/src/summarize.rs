//! Question-directed summarisation and the recursive shrink.
//!
//! `shrink` repeatedly splits oversized text into overlapping chunks,
//! summarises each chunk against the question, and joins the summaries,
//! until the text fits the limit. A round that fails to reduce the token
//! count, or running out of rounds, ends in a hard truncation, so the
//! result always fits.

use std::sync::Arc;
use tandem_core::error::ActionError;
use tandem_core::message::Message;
use tandem_core::provider::{Provider, ProviderRequest};
use tandem_core::token::CHARS_PER_TOKEN;
use tracing::{debug, warn};

/// Chunking and stopping parameters for [`Summarizer::shrink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShrinkSettings {
    pub chunk_tokens: usize,
    pub chunk_overlap: usize,
    pub target_tokens: usize,
    pub max_rounds: usize,
}

impl Default for ShrinkSettings {
    fn default() -> Self {
        Self {
            chunk_tokens: 2000,
            chunk_overlap: 500,
            target_tokens: 2000,
            max_rounds: 6,
        }
    }
}

pub fn summary_prompt(text: &str, question: &str) -> String {
    format!(
        "{text}\nUsing the above text, please answer the following question: {question}\n\
         If the question cannot be answered using the text, please summarize the text."
    )
}

/// Summarises text through a provider.
#[derive(Clone)]
pub struct Summarizer {
    provider: Arc<dyn Provider>,
    model: String,
    settings: ShrinkSettings,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            settings: ShrinkSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ShrinkSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> ShrinkSettings {
        self.settings
    }

    fn count(&self, text: &str) -> usize {
        self.provider.count_tokens(&[Message::user(text)])
    }

    /// One summarisation call for a single chunk.
    pub async fn summarize(&self, text: &str, question: &str) -> Result<String, ActionError> {
        let request = ProviderRequest::new(
            self.model.clone(),
            vec![Message::user(summary_prompt(text, question))],
        );
        let response = self.provider.complete(request).await?;
        Ok(response.content)
    }

    /// Shrink `text` to the configured target.
    pub async fn shrink(&self, text: &str, question: &str) -> Result<String, ActionError> {
        self.shrink_to(text, question, self.settings.target_tokens).await
    }

    /// Shrink `text` until it costs at most `limit` tokens.
    pub async fn shrink_to(&self, text: &str, question: &str, limit: usize) -> Result<String, ActionError> {
        let mut current = text.to_string();
        let mut tokens = self.count(&current);

        for round in 0..self.settings.max_rounds {
            if tokens <= limit {
                return Ok(current);
            }

            let chunks = split_into_chunks(&current, self.settings.chunk_tokens, self.settings.chunk_overlap);
            debug!(round, tokens, chunks = chunks.len(), "Shrinking text");

            let mut parts = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                parts.push(self.summarize(chunk, question).await?);
            }
            let next = parts.join(" ");
            let next_tokens = self.count(&next);

            if next_tokens >= tokens {
                warn!(round, tokens, next_tokens, "Summaries did not shrink the text");
                break;
            }
            current = next;
            tokens = next_tokens;
        }

        if tokens <= limit {
            return Ok(current);
        }
        Ok(truncate_to_tokens(&current, limit))
    }
}

/// Split `text` into word-aligned chunks of roughly `chunk_tokens` tokens,
/// each starting about `overlap_tokens` before the previous one ended.
///
/// Every chunk holds at least one word, and the start index strictly
/// advances, so the split always terminates.
pub fn split_into_chunks(text: &str, chunk_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let budget = chunk_tokens.max(1) * CHARS_PER_TOKEN;
    let overlap_budget = overlap_tokens * CHARS_PER_TOKEN;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let mut end = start;
        let mut chars = 0;
        while end < words.len() && (end == start || chars + words[end].len() + 1 <= budget) {
            chars += words[end].len() + 1;
            end += 1;
        }
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }

        let mut next = end;
        let mut overlap = 0;
        while next > start + 1 && overlap + words[next - 1].len() + 1 <= overlap_budget {
            overlap += words[next - 1].len() + 1;
            next -= 1;
        }
        start = next;
    }
    chunks
}

/// Cut `text` to about `limit` tokens on a char boundary.
pub fn truncate_to_tokens(text: &str, limit: usize) -> String {
    let max_bytes = limit.saturating_sub(tandem_core::token::MESSAGE_OVERHEAD) * CHARS_PER_TOKEN;
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tandem_core::error::ProviderError;
    use tandem_core::provider::ProviderResponse;

    /// Answers every request with a fixed reply and records prompts.
    struct FixedReply {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedReply {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.into(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Provider for FixedReply {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            Ok(ProviderResponse {
                content: self.reply.clone(),
                usage: None,
                model: request.model,
            })
        }
    }

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i:04}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn chunks_overlap_and_cover_everything() {
        // each word "wNNNN" costs 6 chars with its separator
        let text = words(100);
        let chunks = split_into_chunks(&text, 30, 6); // 120-char chunks, 24-char overlap
        assert!(chunks.len() > 1);
        assert!(chunks[0].starts_with("w0000"));
        assert!(chunks.last().unwrap().ends_with("w0099"));

        let first: Vec<&str> = chunks[0].split(' ').collect();
        let second: Vec<&str> = chunks[1].split(' ').collect();
        assert_eq!(first.len(), 20);
        assert_eq!(&first[first.len() - 4..], &second[..4]);
    }

    #[test]
    fn oversized_word_still_progresses() {
        let text = format!("{} tail", "x".repeat(1000));
        let chunks = split_into_chunks(&text, 10, 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "tail");
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split_into_chunks("   ", 10, 2).is_empty());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(100);
        let cut = truncate_to_tokens(&text, 5);
        assert!(cut.len() <= 4);
        assert!(text.starts_with(&cut));
    }

    #[tokio::test]
    async fn short_text_is_untouched() {
        let provider = FixedReply::new("summary");
        let s = Summarizer::new(provider.clone(), "fast");
        let out = s.shrink("already short", "q").await.unwrap();
        assert_eq!(out, "already short");
        assert!(provider.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn long_text_is_summarised_against_question() {
        let provider = FixedReply::new("the answer is 42");
        let s = Summarizer::new(provider.clone(), "fast").with_settings(ShrinkSettings {
            chunk_tokens: 100,
            chunk_overlap: 10,
            target_tokens: 100,
            max_rounds: 3,
        });

        let out = s.shrink(&words(400), "what is the answer?").await.unwrap();
        assert!(s.count(&out) <= 100);
        assert!(out.contains("the answer is 42"));

        let prompts = provider.prompts.lock().unwrap();
        assert!(!prompts.is_empty());
        assert!(prompts[0].contains("please answer the following question: what is the answer?"));
    }

    #[tokio::test]
    async fn non_shrinking_summaries_fall_back_to_truncation() {
        let provider = FixedReply::new(&words(500));
        let s = Summarizer::new(provider, "fast").with_settings(ShrinkSettings {
            chunk_tokens: 200,
            chunk_overlap: 20,
            target_tokens: 50,
            max_rounds: 10,
        });

        let out = s.shrink(&words(300), "q").await.unwrap();
        assert!(s.count(&out) <= 50);
    }

    #[tokio::test]
    async fn round_cap_bounds_calls() {
        // One round shrinks the text but not below the target
        let provider = FixedReply::new(&words(60));
        let s = Summarizer::new(provider.clone(), "fast").with_settings(ShrinkSettings {
            chunk_tokens: 1000,
            chunk_overlap: 100,
            target_tokens: 20,
            max_rounds: 1,
        });
        let out = s.shrink(&words(800), "q").await.unwrap();
        assert!(s.count(&out) <= 20);
        assert_eq!(provider.prompts.lock().unwrap().len(), 2);
    }
}
