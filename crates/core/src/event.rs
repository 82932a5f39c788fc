//! Session events: the user-facing status stream.
//!
//! The agent emits typed events (`thinking`, `action_started`, `speak`,
//! `system`, `error`) tagged with a session token. Delivery is the sink's
//! business; the only guarantee required is per-session emission order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Opaque identifier of the session an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the agent reports while working on a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A planner call is about to be made.
    Thinking { query: String },

    /// An action was chosen and is being dispatched.
    ActionStarted {
        name: String,
        args: serde_json::Map<String, serde_json::Value>,
    },

    /// Text meant for the user: the planner's `speak` thought or the final response.
    Speak { content: String },

    /// Status notices from the agent itself.
    System { message: String },

    Error { message: String },
}

impl AgentEvent {
    /// Display style hint for front ends.
    pub fn style(&self) -> &'static str {
        match self {
            AgentEvent::Thinking { .. } | AgentEvent::System { .. } => "system",
            AgentEvent::ActionStarted { .. } => "task",
            AgentEvent::Speak { .. } => "speak",
            AgentEvent::Error { .. } => "error",
        }
    }
}

impl fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentEvent::Thinking { .. } => f.write_str("Thinking..."),
            AgentEvent::ActionStarted { name, args } => {
                write!(f, "Executing {name} {}", serde_json::Value::Object(args.clone()))
            }
            AgentEvent::Speak { content } => f.write_str(content),
            AgentEvent::System { message } => f.write_str(message),
            AgentEvent::Error { message } => write!(f, "Error: {message}"),
        }
    }
}

/// An event stamped with its session and emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session: SessionToken,
    pub event: AgentEvent,
    pub timestamp: DateTime<Utc>,
}

/// Where the agent sends its events.
pub trait EventSink: Send + Sync {
    fn emit(&self, session: &SessionToken, event: AgentEvent);
}

/// Forwards events into an unbounded mpsc channel; one consumer, strict order.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, session: &SessionToken, event: AgentEvent) {
        let _ = self.sender.send(SessionEvent {
            session: session.clone(),
            event,
            timestamp: Utc::now(),
        });
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _session: &SessionToken, _event: AgentEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();
        let session = SessionToken::new();
        sink.emit(&session, AgentEvent::Thinking { query: "q".into() });
        sink.emit(&session, AgentEvent::Speak { content: "a".into() });

        assert!(matches!(rx.recv().await.unwrap().event, AgentEvent::Thinking { .. }));
        assert!(matches!(rx.recv().await.unwrap().event, AgentEvent::Speak { .. }));
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let json = serde_json::to_value(AgentEvent::ActionStarted {
            name: "search".into(),
            args: serde_json::Map::new(),
        })
        .unwrap();
        assert_eq!(json["type"], "action_started");
        assert_eq!(
            AgentEvent::ActionStarted {
                name: "x".into(),
                args: Default::default()
            }
            .style(),
            "task"
        );
    }
}
