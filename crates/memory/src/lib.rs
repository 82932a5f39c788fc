//! Memory system for Tandem.
//!
//! Three stores with different lifetimes:
//! - [`ConversationHistory`]: user/assistant turns, read back as a recent suffix
//! - [`ShortTermMemory`]: per-session action results ranked by relevance and recency
//! - [`LongTermMemory`]: durable knowledge behind a [`LongTermStore`], gated by distance
//!
//! Store backends: [`InMemoryStore`] and the JSONL [`FileStore`].

pub mod embedder;
pub mod file_backend;
pub mod history;
pub mod in_memory;
pub mod long_term;
pub mod short_term;
pub mod vector;

pub use embedder::{HashEmbedder, ProviderEmbedder};
pub use file_backend::FileStore;
pub use history::{ConversationHistory, HistoryEntry};
pub use in_memory::InMemoryStore;
pub use long_term::{LongTermMemory, PromotionReport};
pub use short_term::{RankedShortTerm, ShortTermConfig, ShortTermMemory};
pub use tandem_core::memory::LongTermStore;
pub use vector::{cosine_distance, cosine_similarity, rank_by_distance};
