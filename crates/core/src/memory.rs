//! Memory domain types: short-term entries, long-term entries, and the
//! traits behind vector storage.
//!
//! The two tiers share one similarity convention: **distance**, computed as
//! `1 − cosine similarity`. Lower is closer; a threshold gate keeps entries
//! whose distance is at or below the threshold.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MemoryError;

/// The structured label a memory entry is filed under.
///
/// Action results are keyed by the action that produced them; everything else
/// (exchanges, manual insertions) is keyed by free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryKey {
    Action {
        action: String,
        args: serde_json::Map<String, serde_json::Value>,
    },
    Text(String),
}

impl MemoryKey {
    pub fn action(action: impl Into<String>, args: serde_json::Map<String, serde_json::Value>) -> Self {
        Self::Action {
            action: action.into(),
            args,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

impl fmt::Display for MemoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKey::Action { action, args } => {
                let args = serde_json::Value::Object(args.clone());
                write!(f, "{action}: {args}")
            }
            MemoryKey::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for MemoryKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MemoryKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// A recent task result held in short-term memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortTermEntry {
    /// Unique, never reused
    pub id: String,

    pub key: MemoryKey,

    pub content: String,

    pub created_at: DateTime<Utc>,

    /// Refreshed every time a query returns this entry
    pub last_accessed_at: DateTime<Utc>,
}

impl ShortTermEntry {
    /// The text form used for ranking and for prompt inclusion.
    pub fn render(&self) -> String {
        format!("{} -> {}", self.key, self.content)
    }
}

/// A durable knowledge entry in long-term memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermEntry {
    pub id: String,

    /// Text the embedding was computed from (used for dedup)
    pub key: String,

    pub content: String,

    pub embedding: Vec<f32>,

    pub created_at: DateTime<Utc>,
}

impl LongTermEntry {
    pub fn render(&self) -> String {
        if self.key == self.content {
            self.content.clone()
        } else {
            format!("{} -> {}", self.key, self.content)
        }
    }
}

/// A long-term entry together with its distance to a query embedding.
#[derive(Debug, Clone)]
pub struct ScoredLongTerm {
    pub entry: LongTermEntry,
    pub distance: f32,
}

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    fn name(&self) -> &str;
}

/// A durable, similarity-searchable collection of long-term entries.
///
/// Implementations must be safe for concurrent reads and appends from
/// independent sessions, and `insert`/`delete` must be idempotent.
#[async_trait]
pub trait LongTermStore: Send + Sync {
    fn name(&self) -> &str;

    /// Insert an entry. Re-inserting an existing id replaces it.
    async fn insert(&self, entry: LongTermEntry) -> Result<(), MemoryError>;

    /// Delete by id. Returns whether anything was removed.
    async fn delete(&self, id: &str) -> Result<bool, MemoryError>;

    async fn get(&self, id: &str) -> Result<Option<LongTermEntry>, MemoryError>;

    /// The `top_k` entries closest to `embedding`, ascending by distance.
    async fn nearest(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredLongTerm>, MemoryError>;

    async fn list(&self) -> Result<Vec<LongTermEntry>, MemoryError>;

    async fn count(&self) -> Result<usize, MemoryError>;

    async fn clear(&self) -> Result<(), MemoryError>;
}
