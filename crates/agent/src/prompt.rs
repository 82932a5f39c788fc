//! Prompt text for the planner.
//!
//! The request is laid out as:
//!
//! 1. **Prefix** (system): objective, time/location line, principles with the
//!    command catalogue and JSON response format
//! 2. **Short-term memory** (assistant): recent action results
//! 3. **Long-term memory** (system): recalled knowledge
//! 4. **History**: recent user/assistant turns, chronological
//! 5. **Guide** (user): the query, attempted-command notes, and the ask
//!
//! Only tiers 2–4 are subject to budget trimming.

use chrono::{DateTime, Utc};
use tandem_core::action::{ActionArgs, ActionSpec};
use tandem_core::identity::Identity;
use tandem_core::memory::{LongTermEntry, ShortTermEntry};
use tandem_core::message::Message;

/// Command name of the terminal "answer the user" decision.
pub const RESPOND_COMMAND: &str = "respond";

const PRINCIPLES_HEADER: &str = "Your decisions must always be made independently. \
Play to your strengths as an LLM and pursue simple strategies with no legal complications.

CONSTRAINTS:

1. Exclusively use the listed commands.
2. Responses should include url references of external sources to ensure reliability.
3. You should only respond in JSON format as described below, instead of the plain text.
4. Always contain \"command_name\" and \"command_args\" in the JSON response.

COMMANDS:
";

const RESPONSE_FORMAT: &str = "RESPONSE JSON FORMAT:
{
    \"command_name\": \"command_name\",
    \"command_args\": {
        \"arg_name\": \"arg_value\"
    }
}";

/// Catalogue entry for the built-in respond command.
pub fn respond_spec() -> ActionSpec {
    ActionSpec {
        name: RESPOND_COMMAND.into(),
        label: "Response".into(),
        args: vec![("response".into(), "response_with_reference_link".into())],
    }
}

/// The principles block, listing every registered action followed by `respond`.
pub fn principles(catalogue: &[ActionSpec]) -> String {
    let commands = catalogue
        .iter()
        .cloned()
        .chain(std::iter::once(respond_spec()))
        .enumerate()
        .map(|(i, spec)| format!("{}. {}", i + 1, spec.render()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{PRINCIPLES_HEADER}\n{commands}\n\n{RESPONSE_FORMAT}")
}

/// "The current time is {time}. User location is {location}."
pub fn meta_info(identity: &Identity, now: DateTime<Utc>) -> String {
    format!(
        "The current time is {}. User location is {}.",
        now.format("%Y-%m-%d %H:%M:%S UTC"),
        identity.location.as_deref().unwrap_or("unknown")
    )
}

/// The mandatory instruction prefix.
pub fn prefix_messages(identity: &Identity, catalogue: &[ActionSpec], now: DateTime<Utc>) -> Vec<Message> {
    vec![
        Message::system(identity.objective()),
        Message::system(meta_info(identity, now)),
        Message::system(principles(catalogue)),
    ]
}

/// The closing user message that asks for the next command.
pub fn guide_message(query: &str, attempted: &[String]) -> Message {
    let mut text = format!("Query: {query}\n");
    if !attempted.is_empty() {
        text.push('\n');
        for note in attempted {
            text.push_str(note);
            text.push('\n');
        }
    }
    text.push_str(
        "\nDetermine which next command to use, and respond using the JSON format specified above:",
    );
    Message::user(text)
}

/// Soft hint recorded after an action has been dispatched.
pub fn attempted_note(name: &str, args: &ActionArgs) -> String {
    format!(
        "command_name: {name} command_args: {} has been tried. Don't use this same command again.",
        serde_json::Value::Object(args.clone())
    )
}

pub fn short_term_message(entry: &ShortTermEntry) -> Message {
    Message::assistant(entry.render())
}

pub fn long_term_message(entry: &LongTermEntry) -> Message {
    Message::system(format!("Relevant memory: {}", entry.render()))
}
