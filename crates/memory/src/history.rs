//! Conversation history: the user/assistant turn log.

use serde::{Deserialize, Serialize};
use tandem_core::message::{Message, Role};

/// One conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    /// Position in the log, starting at 0
    pub sequence_index: u64,
}

impl HistoryEntry {
    pub fn to_message(&self) -> Message {
        Message::new(self.role, self.content.clone())
    }
}

/// Insertion-ordered log of turns. Only a recent suffix is ever read back.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> u64 {
        self.push(Role::User, content.into())
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> u64 {
        self.push(Role::Assistant, content.into())
    }

    fn push(&mut self, role: Role, content: String) -> u64 {
        let sequence_index = self.entries.len() as u64;
        self.entries.push(HistoryEntry {
            role,
            content,
            sequence_index,
        });
        sequence_index
    }

    /// The last `k` turns, oldest first.
    pub fn recent(&self, k: usize) -> &[HistoryEntry] {
        let start = self.entries.len().saturating_sub(k);
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
