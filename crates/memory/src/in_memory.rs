//! In-memory long-term store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::error::MemoryError;
use tandem_core::memory::{LongTermEntry, LongTermStore, ScoredLongTerm};
use tokio::sync::RwLock;

use crate::vector::rank_by_distance;

/// Stores entries in a Vec behind a `RwLock`, so clones of the handle can be
/// shared by independent sessions.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<Vec<LongTermEntry>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LongTermStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert(&self, entry: LongTermEntry) -> Result<(), MemoryError> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let mut entries = self.entries.write().await;
        let len_before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() < len_before)
    }

    async fn get(&self, id: &str) -> Result<Option<LongTermEntry>, MemoryError> {
        Ok(self.entries.read().await.iter().find(|e| e.id == id).cloned())
    }

    async fn nearest(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredLongTerm>, MemoryError> {
        let entries = self.entries.read().await;
        Ok(rank_by_distance(entries.iter(), embedding, top_k))
    }

    async fn list(&self) -> Result<Vec<LongTermEntry>, MemoryError> {
        Ok(self.entries.read().await.clone())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: &str, embedding: Vec<f32>) -> LongTermEntry {
        LongTermEntry {
            id: id.into(),
            key: format!("key {id}"),
            content: format!("content {id}"),
            embedding,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_is_idempotent_by_id() {
        let store = InMemoryStore::new();
        store.insert(entry("a", vec![1.0, 0.0])).await.unwrap();
        store.insert(entry("a", vec![1.0, 0.0])).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_twice_reports_once() {
        let store = InMemoryStore::new();
        store.insert(entry("a", vec![1.0])).await.unwrap();
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn nearest_orders_by_distance() {
        let store = InMemoryStore::new();
        store.insert(entry("x", vec![1.0, 0.0])).await.unwrap();
        store.insert(entry("y", vec![0.0, 1.0])).await.unwrap();
        let hits = store.nearest(&[0.1, 1.0], 5).await.unwrap();
        assert_eq!(hits[0].entry.id, "y");
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::new();
        let other = store.clone();
        store.insert(entry("a", vec![1.0])).await.unwrap();
        assert!(other.get("a").await.unwrap().is_some());
        other.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
