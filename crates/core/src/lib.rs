//! # Tandem Core
//!
//! Domain types, traits, and error definitions for the Tandem planning agent.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Seams
//!
//! Each external collaborator is a trait here, with implementations in the
//! crate that owns the concern:
//! - [`Provider`]: the language model gateway (`tandem-providers`)
//! - [`Embedder`] and [`LongTermStore`]: vector and persistence plumbing (`tandem-memory`)
//! - [`Action`]: external actions such as search or browse (`tandem-actions`)
//! - [`EventSink`]: the user-facing status channel (any transport)

pub mod action;
pub mod error;
pub mod event;
pub mod identity;
pub mod memory;
pub mod message;
pub mod provider;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use action::{Action, ActionArgs, ActionOutput, ActionRegistry, ActionSpec};
pub use error::{ActionError, Error, MemoryError, ProviderError, Result};
pub use event::{AgentEvent, ChannelSink, EventSink, NullSink, SessionEvent, SessionToken};
pub use identity::Identity;
pub use memory::{
    Embedder, LongTermEntry, LongTermStore, MemoryKey, ScoredLongTerm, ShortTermEntry,
};
pub use message::{Message, Role};
pub use provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
