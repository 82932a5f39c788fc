//! Shared test helpers for agent tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tandem_core::action::{Action, ActionArgs, ActionOutput, ActionSpec, required_str};
use tandem_core::error::{ActionError, ProviderError};
use tandem_core::identity::Identity;
use tandem_core::memory::{LongTermEntry, MemoryKey, ShortTermEntry};
use tandem_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use tandem_memory::{HashEmbedder, InMemoryStore, LongTermMemory, ShortTermMemory};
use uuid::Uuid;

use crate::session::AgentSession;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request. Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that returns a single text response.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| make_text_response(t)).collect())
    }

    /// The same text `times` times.
    pub fn repeating(text: &str, times: usize) -> Self {
        Self::new(vec![make_text_response(text); times])
    }

    /// A provider whose first call fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait::async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let call = requests.len();

        if call >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                call,
                responses.len()
            );
        }

        requests.push(request);
        responses[call].clone()
    }
}

/// Create a simple text response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        content: text.into(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Planner output choosing `name` with `args`.
pub fn decision_json(name: &str, args: serde_json::Value) -> String {
    serde_json::json!({ "command_name": name, "command_args": args }).to_string()
}

/// Planner output that answers the user.
pub fn respond_json(response: &str) -> String {
    decision_json("respond", serde_json::json!({ "response": response }))
}

pub fn short_term_entry(key: &str, content: &str) -> ShortTermEntry {
    let now = Utc::now();
    ShortTermEntry {
        id: Uuid::new_v4().to_string(),
        key: MemoryKey::text(key),
        content: content.into(),
        created_at: now,
        last_accessed_at: now,
    }
}

pub fn long_term_entry(key: &str, content: &str) -> LongTermEntry {
    LongTermEntry {
        id: Uuid::new_v4().to_string(),
        key: key.into(),
        content: content.into(),
        embedding: vec![],
        created_at: Utc::now(),
    }
}

/// A session over hash embeddings and an in-memory long-term store.
pub fn test_session() -> AgentSession {
    let embedder = Arc::new(HashEmbedder::default());
    AgentSession::new(
        Identity::default(),
        ShortTermMemory::new(embedder.clone()),
        LongTermMemory::new(Arc::new(InMemoryStore::new()), embedder),
    )
}

fn spec(name: &str) -> ActionSpec {
    ActionSpec {
        name: name.into(),
        label: name.into(),
        args: vec![],
    }
}

/// Echoes its `text` argument.
pub struct EchoAction;

#[async_trait::async_trait]
impl Action for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    fn spec(&self) -> ActionSpec {
        ActionSpec {
            name: "echo".into(),
            label: "Echo".into(),
            args: vec![("text".into(), "text_to_echo".into())],
        }
    }

    async fn execute(&self, args: &ActionArgs) -> Result<ActionOutput, ActionError> {
        Ok(ActionOutput::text(required_str(args, "text")?))
    }
}

/// Always fails.
pub struct FailingAction;

#[async_trait::async_trait]
impl Action for FailingAction {
    fn name(&self) -> &str {
        "fail"
    }

    fn spec(&self) -> ActionSpec {
        spec("fail")
    }

    async fn execute(&self, _args: &ActionArgs) -> Result<ActionOutput, ActionError> {
        Err(ActionError::ExecutionFailed {
            action: "fail".into(),
            reason: "scripted failure".into(),
        })
    }
}

/// Sleeps before answering.
pub struct SlowAction(pub Duration);

#[async_trait::async_trait]
impl Action for SlowAction {
    fn name(&self) -> &str {
        "slow"
    }

    fn spec(&self) -> ActionSpec {
        spec("slow")
    }

    async fn execute(&self, _args: &ActionArgs) -> Result<ActionOutput, ActionError> {
        tokio::time::sleep(self.0).await;
        Ok(ActionOutput::text("finally"))
    }
}
