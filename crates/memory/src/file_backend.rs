//! File-based long-term store: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `LongTermEntry`, embedding included, so the
//! collection survives process restart and stays human-inspectable.
//!
//! Storage location: `~/.tandem/memory/long_term.jsonl` by default.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_core::error::MemoryError;
use tandem_core::memory::{LongTermEntry, LongTermStore, ScoredLongTerm};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::vector::rank_by_distance;

/// A file-backed long-term store using JSONL (one JSON object per line).
///
/// Entries are loaded into memory on creation and flushed to disk on every
/// mutation (insert, delete, clear). This gives fast reads with durable writes.
#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    entries: Arc<RwLock<Vec<LongTermEntry>>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file starts an empty store (created on first write). Lines
    /// that are not valid UTF-8 or not a valid entry are skipped. Any other
    /// read error fails the open, so an unreadable store is never overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let path = path.into();
        let entries = Self::load_from_disk(&path)?;
        debug!(path = %path.display(), count = entries.len(), "Long-term store loaded");
        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Result<Vec<LongTermEntry>, MemoryError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MemoryError::Storage(format!(
                    "Failed to read memory file {}: {e}",
                    path.display()
                )));
            }
        };

        let entries = bytes
            .split(|b| *b == b'\n')
            .enumerate()
            .filter(|(_, line)| !line.trim_ascii().is_empty())
            .filter_map(|(n, line)| match serde_json::from_slice::<LongTermEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(line = n + 1, error = %e, "Skipping corrupted long-term entry");
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    /// Flush all entries to disk as JSONL.
    ///
    /// Writes to a sibling temp file and renames it over the original, so a
    /// crash mid-write never leaves a truncated store.
    fn flush(&self, entries: &[LongTermEntry]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                MemoryError::Storage(format!("Failed to serialize long-term entry: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        std::fs::write(&tmp, &content)
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| MemoryError::Storage(format!("Failed to replace memory file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl LongTermStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn insert(&self, entry: LongTermEntry) -> Result<(), MemoryError> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        self.flush(&entries)
    }

    async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let mut entries = self.entries.write().await;
        let len_before = entries.len();
        entries.retain(|e| e.id != id);
        let deleted = entries.len() < len_before;
        if deleted {
            self.flush(&entries)?;
        }
        Ok(deleted)
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
        let mut entries = self.entries.write().await;
        entries.clear();
        self.flush(&entries)
    }
}
