//! Embedders: text to vectors.
//!
//! - [`HashEmbedder`]: offline bag-of-words feature hashing, deterministic
//! - [`ProviderEmbedder`]: delegates to the configured provider's embeddings endpoint

use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::error::MemoryError;
use tandem_core::memory::Embedder;
use tandem_core::provider::{EmbeddingRequest, Provider};
use tracing::debug;

use crate::vector::normalize;

// ── Hash Embedder ────────────────────────────────────────────────────────────

/// Deterministic embedder based on the hashing trick.
///
/// Each lower-cased alphanumeric token is hashed into one of `dimensions`
/// buckets with a hash-derived sign, then the vector is normalized. Texts
/// sharing vocabulary land close together; identical texts are identical.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let hash = simple_hash(&token);
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }
        normalize(&mut embedding);
        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// djb2, mixed so that the top bit is usable as a sign.
fn simple_hash(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

// ── Provider Embedder ────────────────────────────────────────────────────────

/// Embeds through a [`Provider`]'s embeddings endpoint.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimensions: usize,
}

impl ProviderEmbedder {
    /// `dimensions` is what the model produces (1536 for text-embedding-3-small).
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| MemoryError::EmbeddingFailed("provider returned no embedding".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, count = texts.len(), "Embedding texts");
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: texts.to_vec(),
            })
            .await
            .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != texts.len() {
            return Err(MemoryError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::cosine_distance;
    use tandem_core::error::ProviderError;
    use tandem_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let e = HashEmbedder::new(64);
        let a = e.embed("What is 2+2?").await.unwrap();
        let b = e.embed("what is 2 + 2").await.unwrap();
        assert_eq!(a.len(), 64);
        assert!(cosine_distance(&a, &b) < 1e-6);
    }

    #[tokio::test]
    async fn shared_vocabulary_is_closer() {
        let e = HashEmbedder::default();
        let q = e.embed("rust async runtime").await.unwrap();
        let near = e.embed("the rust async runtime tokio").await.unwrap();
        let far = e.embed("banana bread recipe").await.unwrap();
        assert!(cosine_distance(&q, &near) < cosine_distance(&q, &far));
    }

    #[tokio::test]
    async fn empty_text_is_zero_vector() {
        let v = HashEmbedder::new(8).embed("  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    struct FixedEmbeddings;

    #[async_trait]
    impl Provider for FixedEmbeddings {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("no completions".into()))
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            Ok(EmbeddingResponse {
                embeddings: request.inputs.iter().map(|s| vec![s.len() as f32, 1.0]).collect(),
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn provider_embedder_batches() {
        let e = ProviderEmbedder::new(Arc::new(FixedEmbeddings), "m", 2);
        let out = e.embed_batch(&["a".into(), "abc".into()]).await.unwrap();
        assert_eq!(out, vec![vec![1.0, 1.0], vec![3.0, 1.0]]);
        assert_eq!(e.embed("ab").await.unwrap(), vec![2.0, 1.0]);
    }

    #[tokio::test]
    async fn provider_without_embeddings_fails() {
        struct NoEmbed;
        #[async_trait]
        impl Provider for NoEmbed {
            fn name(&self) -> &str {
                "none"
            }
            async fn complete(&self, _: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
                Err(ProviderError::NotConfigured("x".into()))
            }
        }
        let e = ProviderEmbedder::new(Arc::new(NoEmbed), "m", 2);
        assert!(matches!(
            e.embed("x").await,
            Err(MemoryError::EmbeddingFailed(_))
        ));
    }
}
