//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This is the
//! default `Provider::count_tokens` implementation and the unit used by
//! text chunking, so gateway accounting and chunk sizes agree.

use crate::message::Message;

/// Per-message overhead for role name and delimiters in the wire format.
pub const MESSAGE_OVERHEAD: usize = 4;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(&message.content)
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
