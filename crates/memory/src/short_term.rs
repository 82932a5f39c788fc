//! Short-term memory: time-weighted store of recent action results.
//!
//! Every entry is ranked against a query by
//!
//! ```text
//! score = similarity_weight · sim + recency_weight · (1 − decay_rate)^hours
//! ```
//!
//! where `sim` is the better of key-vs-query and rendered-entry-vs-query
//! cosine similarity, mapped into [0, 1], and `hours` is the time since the
//! entry was last accessed. A query refreshes `last_accessed_at` on every
//! entry it returns, so reading has a side effect.
//!
//! Entries are never mutated otherwise and never deleted.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::Arc;
use tandem_core::error::MemoryError;
use tandem_core::memory::{Embedder, MemoryKey, ShortTermEntry};
use tracing::debug;
use uuid::Uuid;

use crate::vector::cosine_similarity;

/// Tunables for the ranking blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShortTermConfig {
    /// Fraction of recency lost per elapsed hour, in [0, 1)
    pub decay_rate: f64,
    pub similarity_weight: f64,
    pub recency_weight: f64,
}

impl Default for ShortTermConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.05,
            similarity_weight: 1.0,
            recency_weight: 1.0,
        }
    }
}

/// A short-term entry with the score that ranked it.
#[derive(Debug, Clone)]
pub struct RankedShortTerm {
    pub entry: ShortTermEntry,
    pub score: f64,
    pub similarity: f64,
    pub recency: f64,
}

struct Slot {
    entry: ShortTermEntry,
    key_embedding: Vec<f32>,
    text_embedding: Vec<f32>,
}

/// The per-session short-term store.
pub struct ShortTermMemory {
    slots: Vec<Slot>,
    embedder: Arc<dyn Embedder>,
    config: ShortTermConfig,
}

impl ShortTermMemory {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self::with_config(embedder, ShortTermConfig::default())
    }

    pub fn with_config(embedder: Arc<dyn Embedder>, config: ShortTermConfig) -> Self {
        Self {
            slots: Vec::new(),
            embedder,
            config,
        }
    }

    pub fn config(&self) -> ShortTermConfig {
        self.config
    }

    /// Store a result and return its fresh identifier.
    pub async fn add(&mut self, key: MemoryKey, content: impl Into<String>) -> Result<String, MemoryError> {
        self.add_at(key, content, Utc::now()).await
    }

    /// [`add`](Self::add) with an explicit creation time.
    pub async fn add_at(
        &mut self,
        key: MemoryKey,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<String, MemoryError> {
        let entry = ShortTermEntry {
            id: Uuid::new_v4().to_string(),
            key,
            content: content.into(),
            created_at: now,
            last_accessed_at: now,
        };

        let mut embeddings = self
            .embedder
            .embed_batch(&[entry.key.to_string(), entry.render()])
            .await?;
        let text_embedding = embeddings.pop().unwrap_or_default();
        let key_embedding = embeddings.pop().unwrap_or_default();

        let id = entry.id.clone();
        debug!(id = %id, key = %entry.key, "Short-term entry added");
        self.slots.push(Slot {
            entry,
            key_embedding,
            text_embedding,
        });
        Ok(id)
    }

    /// The `top_k` entries most relevant to `text`, best first.
    pub async fn query(&mut self, text: &str, top_k: usize) -> Result<Vec<RankedShortTerm>, MemoryError> {
        self.query_at(text, top_k, Utc::now()).await
    }

    /// [`query`](Self::query) evaluated at `now`; returned entries get
    /// `last_accessed_at = now`.
    pub async fn query_at(
        &mut self,
        text: &str,
        top_k: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedShortTerm>, MemoryError> {
        if self.slots.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(text).await?;

        let mut ranked: Vec<(usize, f64, f64, f64)> = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let similarity = similarity(&query, slot);
                let recency = recency(self.config.decay_rate, slot.entry.last_accessed_at, now);
                let score =
                    self.config.similarity_weight * similarity + self.config.recency_weight * recency;
                (i, score, similarity, recency)
            })
            .collect();

        // Ties go to the newer entry.
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.0.cmp(&a.0))
        });
        ranked.truncate(top_k);

        let results = ranked
            .into_iter()
            .map(|(i, score, similarity, recency)| {
                let slot = &mut self.slots[i];
                slot.entry.last_accessed_at = now;
                RankedShortTerm {
                    entry: slot.entry.clone(),
                    score,
                    similarity,
                    recency,
                }
            })
            .collect::<Vec<_>>();

        debug!(query = %text, returned = results.len(), "Short-term query");
        Ok(results)
    }

    pub fn get(&self, id: &str) -> Option<&ShortTermEntry> {
        self.slots.iter().find(|s| s.entry.id == id).map(|s| &s.entry)
    }

    /// Entries for `ids`, in store order; unknown ids are ignored.
    pub fn entries_by_ids<'a, I>(&self, ids: I) -> Vec<ShortTermEntry>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let wanted: std::collections::HashSet<&String> = ids.into_iter().collect();
        self.slots
            .iter()
            .filter(|s| wanted.contains(&s.entry.id))
            .map(|s| s.entry.clone())
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.entry.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn similarity(query: &[f32], slot: &Slot) -> f64 {
    let best = cosine_similarity(query, &slot.key_embedding)
        .max(cosine_similarity(query, &slot.text_embedding)) as f64;
    ((best + 1.0) / 2.0).clamp(0.0, 1.0)
}

fn recency(decay_rate: f64, last_accessed_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - last_accessed_at).num_milliseconds().max(0) as f64 / 3_600_000.0;
    (1.0 - decay_rate).powf(hours)
}
