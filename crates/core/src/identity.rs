//! Agent identity: who the agent says it is in the instruction prefix.

use serde::{Deserialize, Serialize};

/// The agent's name, objectives, and the user's location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,

    /// Objectives, joined into one sentence in the prefix
    pub personalities: Vec<String>,

    /// Free-form user location, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "Tandem".into(),
            personalities: vec!["help users find accurate, referenced answers".into()],
            location: None,
        }
    }
}

impl Identity {
    pub fn new(name: impl Into<String>, personalities: Vec<String>) -> Self {
        Self {
            name: name.into(),
            personalities,
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// "You are {name}, an AI designed to {objectives}."
    pub fn objective(&self) -> String {
        let objectives = match self.personalities.as_slice() {
            [] => "assist the user".to_string(),
            [only] => only.clone(),
            [init @ .., last] => format!("{} and {}", init.join(", "), last),
        };
        format!("You are {}, an AI designed to {}.", self.name, objectives)
    }
}
