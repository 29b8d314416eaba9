//! Append-only conversation history.

use crate::model::{Message, Part, Role, ToolCall, ToolResult};
use crate::{Error, Result};
use std::collections::HashMap;

/// One unit of conversation history.
#[derive(Debug, Clone)]
pub enum Turn {
    /// Persona and tool-usage instructions. Always the first turn.
    Instructions(String),
    User(String),
    ModelText(String),
    /// Tool calls the model asked for, with any text it wrote alongside.
    ToolCalls {
        preamble: Option<String>,
        calls: Vec<ToolCall>,
    },
    ToolResults(Vec<ToolResult>),
}

/// The shape of a [`Turn`], without its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Instructions,
    User,
    ModelText,
    ToolCalls,
    ToolResults,
}

impl Turn {
    pub fn kind(&self) -> TurnKind {
        match self {
            Self::Instructions(_) => TurnKind::Instructions,
            Self::User(_) => TurnKind::User,
            Self::ModelText(_) => TurnKind::ModelText,
            Self::ToolCalls { .. } => TurnKind::ToolCalls,
            Self::ToolResults(_) => TurnKind::ToolResults,
        }
    }

    /// Render the turn in provider-agnostic form.
    pub fn to_message(&self) -> Message {
        match self {
            Self::Instructions(text) => Message::new(Role::System, text.clone()),
            Self::User(text) => Message::new(Role::User, text.clone()),
            Self::ModelText(text) => Message::new(Role::Assistant, text.clone()),
            Self::ToolCalls { preamble, calls } => {
                let parts = preamble
                    .iter()
                    .map(|text| Part::Text(text.clone()))
                    .chain(calls.iter().cloned().map(Part::ToolCall))
                    .collect();
                Message::from_parts(Role::Assistant, parts)
            }
            Self::ToolResults(results) => Message::from_parts(
                Role::User,
                results.iter().cloned().map(Part::ToolResult).collect(),
            ),
        }
    }
}

/// Ordered history replayed to the model on every cycle.
///
/// Appends are validated so that a tool-call batch is always answered by
/// exactly one result batch covering every call before anything else is
/// added.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a conversation seeded with `instructions`.
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::Instructions(instructions.into())],
        }
    }

    pub fn append_turn(&mut self, turn: Turn) -> Result<()> {
        self.validate(&turn)?;
        self.turns.push(turn);
        Ok(())
    }

    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false: a conversation holds at least its instructions.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn kinds(&self) -> Vec<TurnKind> {
        self.turns.iter().map(Turn::kind).collect()
    }

    /// The unanswered tool-call batch, if the last turn is one.
    pub fn pending_calls(&self) -> Option<&[ToolCall]> {
        match self.turns.last() {
            Some(Turn::ToolCalls { calls, .. }) => Some(calls),
            _ => None,
        }
    }

    pub fn to_messages(&self) -> Vec<Message> {
        self.turns.iter().map(Turn::to_message).collect()
    }

    fn validate(&self, turn: &Turn) -> Result<()> {
        match (self.pending_calls(), turn) {
            (_, Turn::Instructions(_)) => Err(Error::InvalidHistory(
                "instructions may only seed a conversation".into(),
            )),
            (Some(calls), Turn::ToolResults(results)) => check_coverage(calls, results),
            (Some(_), other) => Err(Error::InvalidHistory(format!(
                "{:?} turn appended while tool calls are unanswered",
                other.kind()
            ))),
            (None, Turn::ToolResults(_)) => Err(Error::InvalidHistory(
                "tool results without a preceding tool-call batch".into(),
            )),
            (None, Turn::User(text)) if text.trim().is_empty() => Err(Error::EmptyInput),
            (None, Turn::ToolCalls { calls, .. }) if calls.is_empty() => Err(
                Error::InvalidHistory("tool-call batch must not be empty".into()),
            ),
            (None, _) => Ok(()),
        }
    }
}

fn check_coverage(calls: &[ToolCall], results: &[ToolResult]) -> Result<()> {
    let mut unanswered: HashMap<&str, usize> = HashMap::new();
    for call in calls {
        *unanswered.entry(call.id.as_str()).or_default() += 1;
    }
    for result in results {
        match unanswered.get_mut(result.tool_call_id.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => {
                return Err(Error::InvalidHistory(format!(
                    "result for `{}` does not answer a pending call",
                    result.tool_call_id
                )));
            }
        }
    }
    if let Some((id, _)) = unanswered.iter().find(|(_, count)| **count > 0) {
        return Err(Error::InvalidHistory(format!("call `{id}` has no result")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolError;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "check_appointment_availability", json!({}))
    }

    fn calls_turn(ids: &[&str]) -> Turn {
        Turn::ToolCalls {
            preamble: None,
            calls: ids.iter().map(|id| call(id)).collect(),
        }
    }

    #[test]
    fn seeded_with_instructions() {
        let conversation = Conversation::new("You are a scheduling assistant.");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.kinds(), [TurnKind::Instructions]);
        assert_eq!(conversation.to_messages()[0].role, Role::System);
    }

    #[test]
    fn full_tool_cycle() {
        let mut conversation = Conversation::new("sys");
        conversation
            .append_turn(Turn::User("Is 3pm free?".into()))
            .unwrap();
        conversation.append_turn(calls_turn(&["a", "b"])).unwrap();
        assert_eq!(conversation.pending_calls().map(<[_]>::len), Some(2));

        let results = vec![
            ToolResult::success(&call("b"), json!(true)),
            ToolResult::failure(&call("a"), ToolError::execution("boom")),
        ];
        conversation
            .append_turn(Turn::ToolResults(results))
            .unwrap();
        assert!(conversation.pending_calls().is_none());

        conversation
            .append_turn(Turn::ModelText("It is free.".into()))
            .unwrap();
        assert_eq!(
            conversation.kinds(),
            [
                TurnKind::Instructions,
                TurnKind::User,
                TurnKind::ToolCalls,
                TurnKind::ToolResults,
                TurnKind::ModelText,
            ]
        );
    }

    #[test]
    fn pending_batch_blocks_other_turns() {
        let mut conversation = Conversation::new("sys");
        conversation.append_turn(calls_turn(&["a"])).unwrap();
        let err = conversation
            .append_turn(Turn::User("hello?".into()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHistory(_)));
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn incomplete_or_orphan_results_rejected() {
        let mut conversation = Conversation::new("sys");
        conversation.append_turn(calls_turn(&["a", "b"])).unwrap();

        let partial = vec![ToolResult::success(&call("a"), json!(1))];
        assert!(conversation.append_turn(Turn::ToolResults(partial)).is_err());

        let orphan = vec![
            ToolResult::success(&call("a"), json!(1)),
            ToolResult::success(&call("b"), json!(1)),
            ToolResult::success(&call("c"), json!(1)),
        ];
        assert!(conversation.append_turn(Turn::ToolResults(orphan)).is_err());

        let doubled = vec![
            ToolResult::success(&call("a"), json!(1)),
            ToolResult::success(&call("a"), json!(1)),
        ];
        assert!(conversation.append_turn(Turn::ToolResults(doubled)).is_err());
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn blank_user_turn_rejected() {
        let mut conversation = Conversation::new("sys");
        for blank in ["", "  \n\t"] {
            let err = conversation
                .append_turn(Turn::User(blank.into()))
                .unwrap_err();
            assert!(matches!(err, Error::EmptyInput));
        }
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn results_without_calls_rejected() {
        let mut conversation = Conversation::new("sys");
        let results = vec![ToolResult::success(&call("a"), json!(1))];
        assert!(conversation.append_turn(Turn::ToolResults(results)).is_err());
        assert!(conversation.append_turn(calls_turn(&[])).is_err());
        assert!(
            conversation
                .append_turn(Turn::Instructions("again".into()))
                .is_err()
        );
    }

    #[test]
    fn tool_turns_render_as_parts() {
        let turn = Turn::ToolCalls {
            preamble: Some("Let me check.".into()),
            calls: vec![call("a")],
        };
        let message = turn.to_message();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text(), "Let me check.");
        assert_eq!(message.tool_calls().len(), 1);

        let results = Turn::ToolResults(vec![ToolResult::success(&call("a"), json!(1))]);
        assert_eq!(results.to_message().role, Role::User);
    }
}
