use super::errors::ModelError;
use crate::tools::{ToolError, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::ops::AddAssign;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates the call with its result.
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// What running a tool produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { output: Value },
    Failure { error: ToolError },
}

/// The result the runtime returned from a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    /// Echoes the name of the originating call.
    pub name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    /// Build a successful result for `call`.
    pub fn success(call: &ToolCall, output: Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            outcome: ToolOutcome::Success { output },
        }
    }

    /// Build a failed result for `call`.
    pub fn failure(call: &ToolCall, error: ToolError) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            outcome: ToolOutcome::Failure { error },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Failure { .. })
    }

    /// The error, if this result is a failure.
    pub fn error(&self) -> Option<&ToolError> {
        match &self.outcome {
            ToolOutcome::Failure { error } => Some(error),
            ToolOutcome::Success { .. } => None,
        }
    }
}

/// A part of a message, which can be text or a tool interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// A message, consisting of a role and one or more parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn from_parts(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// Get combined text content from all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all tool calls from this message.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FinishReason {
    #[default]
    Stop,
    /// Model wants tools to be run.
    ToolUse,
    /// Hit the token limit.
    Length,
    /// Forward compatibility with provider-specific reasons.
    Unknown(String),
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Everything needed for a model request.
///
/// The full conversation is replayed on every call; system-role messages
/// carry instructions rather than user speech.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
}

/// The response from a model.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub message: Message,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

/// Trait for LLM provider backends.
pub trait Backend: Send + Sync {
    fn call(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_text_extraction() {
        let msg = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text("Hello ".into()),
                Part::ToolCall(ToolCall::new("1", "test", Value::Null)),
                Part::Text("world".into()),
            ],
        };
        assert_eq!(msg.text(), "Hello world");
    }

    #[test]
    fn message_tool_calls_extraction() {
        let msg = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text("Let me check".into()),
                Part::ToolCall(ToolCall::new(
                    "1",
                    "check_appointment_availability",
                    serde_json::json!({"datetime": "2024-07-15T15:00:00Z"}),
                )),
                Part::ToolCall(ToolCall::new("2", "delete_appointment", Value::Null)),
            ],
        };
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "check_appointment_availability");
        assert_eq!(calls[1].name, "delete_appointment");
    }

    #[test]
    fn result_echoes_call() {
        let call = ToolCall::new("abc", "schedule_appointment", Value::Null);
        let ok = ToolResult::success(&call, Value::Bool(true));
        assert_eq!(ok.tool_call_id, "abc");
        assert_eq!(ok.name, "schedule_appointment");
        assert!(!ok.is_error());

        let failed = ToolResult::failure(&call, ToolError::Execution("slot taken".into()));
        assert!(failed.is_error());
        assert_eq!(
            failed.error().map(ToString::to_string).as_deref(),
            Some("execution failed: slot taken")
        );
    }

    #[test]
    fn usage_accumulates() {
        let mut usage = Usage::default();
        usage += Usage {
            input_tokens: 100,
            output_tokens: 50,
        };
        usage += Usage {
            input_tokens: 10,
            output_tokens: 5,
        };
        assert_eq!(usage.total_tokens(), 165);
    }
}
