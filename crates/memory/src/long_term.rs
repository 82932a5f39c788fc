//! Long-term memory: durable, deduplicated knowledge gated by distance.
//!
//! Convention: distance = 1 − cosine similarity. An entry passes a gate when
//! `distance <= threshold`. The same rule serves the query-relevance gate
//! and the (tighter) dedup tolerance used at promotion.

use chrono::Utc;
use std::sync::Arc;
use tandem_core::error::MemoryError;
use tandem_core::memory::{Embedder, LongTermEntry, LongTermStore, ScoredLongTerm, ShortTermEntry};
use tracing::{debug, info};
use uuid::Uuid;

/// Outcome of one promotion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionReport {
    /// Ids of newly created long-term entries
    pub inserted: Vec<String>,
    /// Short-term ids skipped as near-duplicates
    pub skipped: Vec<String>,
}

/// Long-term memory: an embedder in front of a persistent store.
#[derive(Clone)]
pub struct LongTermMemory {
    store: Arc<dyn LongTermStore>,
    embedder: Arc<dyn Embedder>,
}

impl LongTermMemory {
    pub fn new(store: Arc<dyn LongTermStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &Arc<dyn LongTermStore> {
        &self.store
    }

    /// Insert `keys[i] -> contents[i]` pairs; embeddings are computed from the keys.
    pub async fn add(&self, keys: &[String], contents: &[String]) -> Result<Vec<String>, MemoryError> {
        if keys.len() != contents.len() {
            return Err(MemoryError::Storage(format!(
                "{} keys but {} contents",
                keys.len(),
                contents.len()
            )));
        }

        let embeddings = self.embedder.embed_batch(keys).await?;
        let mut ids = Vec::with_capacity(keys.len());
        for ((key, content), embedding) in keys.iter().zip(contents).zip(embeddings) {
            let id = Uuid::new_v4().to_string();
            self.store
                .insert(LongTermEntry {
                    id: id.clone(),
                    key: key.clone(),
                    content: content.clone(),
                    embedding,
                    created_at: Utc::now(),
                })
                .await?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Up to `top_k` entries whose distance to `text` is at most `threshold`, closest first.
    pub async fn query(&self, text: &str, top_k: usize, threshold: f32) -> Result<Vec<ScoredLongTerm>, MemoryError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(text).await?;
        let hits = self.store.nearest(&embedding, top_k).await?;
        let passing: Vec<ScoredLongTerm> = hits.into_iter().filter(|h| h.distance <= threshold).collect();
        debug!(query = %text, threshold, returned = passing.len(), "Long-term query");
        Ok(passing)
    }

    /// The closest existing entry to `key`, if it lies within `tolerance`.
    pub async fn contains_near(&self, key: &str, tolerance: f32) -> Result<Option<ScoredLongTerm>, MemoryError> {
        Ok(self.query(key, 1, tolerance).await?.into_iter().next())
    }

    /// Copy short-term entries into long-term memory, skipping any whose key
    /// already has a neighbour within `tolerance`. Entries are checked one at
    /// a time, so duplicates inside `candidates` collapse too.
    pub async fn promote(
        &self,
        candidates: &[ShortTermEntry],
        tolerance: f32,
    ) -> Result<PromotionReport, MemoryError> {
        let mut report = PromotionReport::default();
        for candidate in candidates {
            let key = candidate.key.to_string();
            if let Some(existing) = self.contains_near(&key, tolerance).await? {
                debug!(
                    short_term = %candidate.id,
                    existing = %existing.entry.id,
                    distance = existing.distance,
                    "Skipping near-duplicate promotion"
                );
                report.skipped.push(candidate.id.clone());
                continue;
            }
            let mut ids = self
                .add(std::slice::from_ref(&key), std::slice::from_ref(&candidate.content))
                .await?;
            report.inserted.append(&mut ids);
        }
        info!(
            inserted = report.inserted.len(),
            skipped = report.skipped.len(),
            "Promotion finished"
        );
        Ok(report)
    }

    /// Store the `<query, response>` pair as one entry keyed by the query.
    pub async fn remember_exchange(&self, query: &str, response: &str) -> Result<String, MemoryError> {
        let mut ids = self.add(&[query.to_string()], &[response.to_string()]).await?;
        ids.pop()
            .ok_or_else(|| MemoryError::Storage("exchange was not stored".into()))
    }

    pub async fn get(&self, id: &str) -> Result<Option<LongTermEntry>, MemoryError> {
        self.store.get(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        self.store.delete(id).await
    }

    pub async fn list(&self) -> Result<Vec<LongTermEntry>, MemoryError> {
        self.store.list().await
    }

    pub async fn count(&self) -> Result<usize, MemoryError> {
        self.store.count().await
    }

    pub async fn clear(&self) -> Result<(), MemoryError> {
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashEmbedder;
    use crate::in_memory::InMemoryStore;
    use async_trait::async_trait;
    use tandem_core::memory::MemoryKey;

    fn memory() -> LongTermMemory {
        LongTermMemory::new(Arc::new(InMemoryStore::new()), Arc::new(HashEmbedder::new(128)))
    }

    fn short(id: &str, key: &str, content: &str) -> ShortTermEntry {
        let now = Utc::now();
        ShortTermEntry {
            id: id.into(),
            key: MemoryKey::text(key),
            content: content.into(),
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Embeds "cos:<c>" to the unit vector whose cosine with (1, 0) is `c`,
    /// so distances can be set exactly.
    struct AngleEmbedder;

    #[async_trait]
    impl Embedder for AngleEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
            let cos: f32 = text
                .strip_prefix("cos:")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.0);
            Ok(vec![cos, (1.0 - cos * cos).max(0.0).sqrt()])
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn name(&self) -> &str {
            "angle"
        }
    }

    async fn gated_store() -> LongTermMemory {
        let store = Arc::new(InMemoryStore::new());
        let mem = LongTermMemory::new(store.clone(), Arc::new(AngleEmbedder));
        // distance 0.5 from the query direction (1, 0)
        store
            .insert(LongTermEntry {
                id: "far".into(),
                key: "far".into(),
                content: "far".into(),
                embedding: vec![0.5, (0.75f32).sqrt()],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        // distance 0.2
        store
            .insert(LongTermEntry {
                id: "near".into(),
                key: "near".into(),
                content: "near".into(),
                embedding: vec![0.8, 0.6],
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        mem
    }

    #[tokio::test]
    async fn threshold_keeps_near_drops_far() {
        let mem = gated_store().await;
        let hits = mem.query("cos:1", 10, 0.3).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["near"]);
    }

    #[tokio::test]
    async fn threshold_boundary_is_inclusive() {
        let mem = gated_store().await;
        let near_distance = mem.query("cos:1", 10, 2.0).await.unwrap()[0].distance;

        let at = mem.query("cos:1", 10, near_distance).await.unwrap();
        assert_eq!(at.len(), 1);
        assert_eq!(at[0].entry.id, "near");

        let below = mem.query("cos:1", 10, near_distance - 1e-4).await.unwrap();
        assert!(below.is_empty());
    }

    #[tokio::test]
    async fn add_requires_matching_lengths() {
        let mem = memory();
        let err = mem.add(&["a".into()], &[]).await.unwrap_err();
        assert!(matches!(err, MemoryError::Storage(_)));
    }

    #[tokio::test]
    async fn add_then_query_roundtrip() {
        let mem = memory();
        let ids = mem
            .add(
                &["capital of france".into(), "boiling point of water".into()],
                &["Paris".into(), "100C".into()],
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let hits = mem.query("capital of france", 1, 0.35).await.unwrap();
        assert_eq!(hits[0].entry.content, "Paris");
        assert!(hits[0].distance < 1e-6);
    }

    #[tokio::test]
    async fn promotion_is_idempotent() {
        let mem = memory();
        let entry = short("s1", "math: 2+2", "4");

        let first = mem.promote(std::slice::from_ref(&entry), 0.1).await.unwrap();
        assert_eq!(first.inserted.len(), 1);

        let second = mem.promote(std::slice::from_ref(&entry), 0.1).await.unwrap();
        assert!(second.inserted.is_empty());
        assert_eq!(second.skipped, vec!["s1".to_string()]);
        assert_eq!(mem.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn promotion_dedups_within_batch() {
        let mem = memory();
        let batch = vec![
            short("a", "rust release", "2015"),
            short("b", "rust release", "2015"),
            short("c", "tokio scheduler", "work stealing"),
        ];
        let report = mem.promote(&batch, 0.1).await.unwrap();
        assert_eq!(report.inserted.len(), 2);
        assert_eq!(report.skipped, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn exchange_is_stored_unconditionally() {
        let mem = memory();
        mem.remember_exchange("What is 2+2?", "4").await.unwrap();
        mem.remember_exchange("What is 2+2?", "4").await.unwrap();
        assert_eq!(mem.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_by_id() {
        let mem = memory();
        let id = mem.remember_exchange("q", "a").await.unwrap();
        assert!(mem.delete(&id).await.unwrap());
        assert!(mem.get(&id).await.unwrap().is_none());
    }
}
