//! Planner decisions parsed from language model output.
//!
//! The model is asked for `{"command_name": ..., "command_args": {...}}`,
//! optionally with a `thoughts` object. Anything else becomes
//! [`Decision::Invalid`], which the loop surfaces verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tandem_core::action::ActionArgs;

use crate::prompt::RESPOND_COMMAND;

/// Older prompts asked for `response`; both names end the loop.
const RESPOND_ALIAS: &str = "response";

/// Optional reasoning the model attaches to a decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thoughts {
    pub text: Option<String>,
    pub reasoning: Option<String>,
    pub plan: Option<String>,
    pub criticism: Option<String>,
    /// Meant to be shown to the user while the agent works
    pub speak: Option<String>,
}

impl Thoughts {
    /// Lenient read: strings are taken as-is, lists are joined line by line.
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |name: &str| -> Option<String> {
            match obj.get(name)? {
                Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                Value::Array(items) => {
                    let lines: Vec<String> = items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect();
                    (!lines.is_empty()).then(|| lines.join("\n"))
                }
                _ => None,
            }
        };
        Some(Self {
            text: field("text"),
            reasoning: field("reasoning"),
            plan: field("plan"),
            criticism: field("criticism"),
            speak: field("speak"),
        })
    }
}

/// What the planner decided to do next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Answer the user and stop.
    Respond {
        response: String,
        thoughts: Option<Thoughts>,
    },

    /// Dispatch a named action.
    Act {
        name: String,
        args: ActionArgs,
        thoughts: Option<Thoughts>,
    },

    /// Output that is not a well-formed decision.
    Invalid { raw: String, reason: String },
}

impl Decision {
    /// Parse raw model output. Never fails; malformed output is `Invalid`.
    pub fn parse(raw: &str) -> Self {
        let invalid = |reason: &str| Decision::Invalid {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let cleaned = strip_code_fences(raw);
        let value = match serde_json::from_str::<Value>(cleaned) {
            Ok(value) => value,
            Err(_) => match extract_json_object(cleaned).map(serde_json::from_str::<Value>) {
                Some(Ok(value)) => value,
                _ => return invalid("no JSON object found"),
            },
        };

        let Some(obj) = value.as_object() else {
            return invalid("decision is not a JSON object");
        };
        let Some(name) = obj.get("command_name").and_then(Value::as_str) else {
            return invalid("missing \"command_name\"");
        };
        let Some(args) = obj.get("command_args").and_then(Value::as_object) else {
            return invalid("missing \"command_args\"");
        };
        let thoughts = obj.get("thoughts").and_then(Thoughts::from_value);
        let name = name.trim();

        if name == RESPOND_COMMAND || name == RESPOND_ALIAS {
            return match args.get("response") {
                Some(Value::String(response)) => Decision::Respond {
                    response: response.clone(),
                    thoughts,
                },
                Some(other) if !other.is_null() => Decision::Respond {
                    response: other.to_string(),
                    thoughts,
                },
                _ => invalid("respond without a \"response\" argument"),
            };
        }

        Decision::Act {
            name: name.to_string(),
            args: args.clone(),
            thoughts,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Decision::Act { .. })
    }

    pub fn thoughts(&self) -> Option<&Thoughts> {
        match self {
            Decision::Respond { thoughts, .. } | Decision::Act { thoughts, .. } => thoughts.as_ref(),
            Decision::Invalid { .. } => None,
        }
    }
}

/// Strip markdown code fences from LLM output.
fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    for fence in ["```json", "```"] {
        if let Some(inner) = s.strip_prefix(fence).and_then(|rest| rest.strip_suffix("```")) {
            return inner.trim();
        }
    }
    s
}

/// The span from the first `{` to the last `}`.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}
