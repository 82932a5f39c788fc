//! Action trait: the abstraction over external tasks the planner can choose.
//!
//! Actions are what let the agent reach outside its own memory: search the
//! web, browse a page, work a math problem. Each action is side-effect-free
//! on agent state; the agent loop alone records results into memory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ActionError;

/// Arguments passed to an action, as decoded from the planner's `command_args`.
pub type ActionArgs = serde_json::Map<String, serde_json::Value>;

/// The result of an action execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutput {
    /// Text rendering of the result; this is what lands in short-term memory.
    pub content: String,

    /// Optional structured data (e.g. ranked search hits)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            data: None,
        }
    }
}

/// How an action is presented to the planner in the command catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Command name the planner must emit
    pub name: String,

    /// Human-readable label (e.g. "Internet Search")
    pub label: String,

    /// Argument names mapped to placeholder descriptions
    pub args: Vec<(String, String)>,
}

impl ActionSpec {
    /// Render as one catalogue line: `Label: "name", args: "a": "<desc>", ...`
    pub fn render(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|(name, desc)| format!("\"{name}\": \"<{desc}>\""))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}: \"{}\", args: {}", self.label, self.name, args)
    }
}

/// The core Action trait.
///
/// Actions are registered in the [`ActionRegistry`] and dispatched by name.
#[async_trait]
pub trait Action: Send + Sync {
    /// The unique command name of this action (e.g., "search", "browse").
    fn name(&self) -> &str;

    /// The catalogue entry shown to the planner.
    fn spec(&self) -> ActionSpec;

    /// Execute the action with the given arguments.
    async fn execute(&self, args: &ActionArgs) -> Result<ActionOutput, ActionError>;
}

/// Fetch a required string argument.
pub fn required_str<'a>(args: &'a ActionArgs, key: &str) -> Result<&'a str, ActionError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ActionError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// A registry of available actions, keyed by command name.
///
/// Adding an action means registering it here; the loop never branches on names.
/// A `BTreeMap` keeps the catalogue order stable across runs.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action. Replaces any existing action with the same name.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        let name = action.name().to_string();
        self.actions.insert(name, action);
    }

    /// Get an action by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// List all registered action names.
    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(|s| s.as_str()).collect()
    }

    /// Catalogue entries for every registered action.
    pub fn catalogue(&self) -> Vec<ActionSpec> {
        self.actions.values().map(|a| a.spec()).collect()
    }

    /// Execute an action by name.
    pub async fn execute(&self, name: &str, args: &ActionArgs) -> Result<ActionOutput, ActionError> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| ActionError::NotFound(name.to_string()))?;
        action.execute(args).await
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test action for unit tests.
    struct EchoAction;

    #[async_trait]
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

    fn args(value: serde_json::Value) -> ActionArgs {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(EchoAction));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn spec_renders_catalogue_line() {
        let line = EchoAction.spec().render();
        assert_eq!(line, r#"Echo: "echo", args: "text": "<text_to_echo>""#);
    }

    #[tokio::test]
    async fn registry_execute_action() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(EchoAction));
        let out = registry
            .execute("echo", &args(serde_json::json!({"text": "hello world"})))
            .await
            .unwrap();
        assert_eq!(out.content, "hello world");
    }

    #[tokio::test]
    async fn registry_execute_missing_action() {
        let registry = ActionRegistry::new();
        let err = registry
            .execute("nonexistent", &ActionArgs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_argument_is_invalid() {
        let err = EchoAction.execute(&ActionArgs::new()).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidArguments(_)));
    }
}
