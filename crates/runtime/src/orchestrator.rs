//! The tool-augmented conversation loop.

use crate::conversation::{Conversation, Turn};
use crate::model::{
    Backend, FinishReason, ModelError, ModelRequest, ModelResponse, ToolCall, Usage,
};
use crate::tools::{ToolSpec, TurnDispatcher};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default number of tool-call cycles allowed per user turn.
pub const DEFAULT_MAX_TOOL_CYCLES: usize = 8;

/// Default bound on a single model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Tuning knobs for the loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Tool-call cycles allowed before the turn is abandoned.
    pub max_tool_cycles: usize,
    pub model_timeout: Option<Duration>,
    pub tool_timeout: Option<Duration>,
    /// Calls from one batch running at once. `None` runs them all.
    pub max_concurrency: Option<usize>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_tool_cycles: DEFAULT_MAX_TOOL_CYCLES,
            model_timeout: Some(DEFAULT_MODEL_TIMEOUT),
            tool_timeout: None,
            max_concurrency: None,
        }
    }
}

/// Where the loop is within a user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingUserInput,
    AwaitingModelResponse,
    ProcessingToolCalls,
    /// The turn is over and control is back with the caller.
    Idle,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingUserInput => "awaiting_user_input",
            Self::AwaitingModelResponse => "awaiting_model_response",
            Self::ProcessingToolCalls => "processing_tool_calls",
            Self::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// What one user turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text to show the user.
    pub reply: String,
    /// False when the cycle cap cut the turn short.
    pub completed: bool,
    pub tool_cycles: usize,
    /// Every state the loop passed through, starting at `AwaitingUserInput`.
    pub transitions: Vec<LoopState>,
    pub usage: Usage,
}

/// How a model response is handled.
#[derive(Debug)]
enum Reply {
    Text(String),
    ToolCalls {
        preamble: Option<String>,
        calls: Vec<ToolCall>,
    },
}

/// Drives one conversation between the model and the tools.
///
/// The loop is the only writer of history: tools run through the
/// [`TurnDispatcher`] and never see the conversation.
pub struct Orchestrator<B> {
    backend: B,
    dispatcher: TurnDispatcher,
    catalog: Vec<ToolSpec>,
    config: LoopConfig,
}

impl<B: Backend> Orchestrator<B> {
    pub fn new(
        backend: B,
        dispatcher: TurnDispatcher,
        catalog: Vec<ToolSpec>,
        config: LoopConfig,
    ) -> Self {
        Self {
            backend,
            dispatcher,
            catalog,
            config,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn catalog(&self) -> &[ToolSpec] {
        &self.catalog
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run one user turn to completion.
    ///
    /// Transport failures and malformed responses end the turn with an
    /// error; history already committed stays as it is and nothing is
    /// retried. Usage of every model call that answered is added to `spent`
    /// as it arrives, so a failed turn still accounts for it.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        input: &str,
        spent: &mut Usage,
    ) -> Result<TurnOutcome> {
        let mut transitions = vec![LoopState::AwaitingUserInput];
        let mut usage = Usage::default();
        let mut cycles = 0;

        conversation.append_turn(Turn::User(input.to_string()))?;

        loop {
            transitions.push(LoopState::AwaitingModelResponse);
            let response = self.request(conversation).await.inspect_err(|e| {
                warn!(error = %e, cycle = cycles, "model call failed");
            })?;
            usage += response.usage;
            *spent += response.usage;

            let reply = classify(response).inspect_err(|e| {
                warn!(error = %e, cycle = cycles, "unusable model response");
            })?;

            match reply {
                Reply::Text(text) => {
                    conversation.append_turn(Turn::ModelText(text.clone()))?;
                    transitions.push(LoopState::Idle);
                    info!(
                        tool_cycles = cycles,
                        tokens = usage.total_tokens(),
                        "turn complete"
                    );
                    return Ok(TurnOutcome {
                        reply: text,
                        completed: true,
                        tool_cycles: cycles,
                        transitions,
                        usage,
                    });
                }
                Reply::ToolCalls { .. } if cycles >= self.config.max_tool_cycles => {
                    warn!(
                        max_tool_cycles = self.config.max_tool_cycles,
                        "tool-call cycle limit reached"
                    );
                    let reply = cycle_limit_reply(self.config.max_tool_cycles);
                    conversation.append_turn(Turn::ModelText(reply.clone()))?;
                    transitions.push(LoopState::Idle);
                    return Ok(TurnOutcome {
                        reply,
                        completed: false,
                        tool_cycles: cycles,
                        transitions,
                        usage,
                    });
                }
                Reply::ToolCalls { preamble, calls } => {
                    cycles += 1;
                    let calls = assign_call_ids(calls);
                    debug!(
                        cycle = cycles,
                        tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                        "model requested tools"
                    );
                    conversation.append_turn(Turn::ToolCalls {
                        preamble,
                        calls: calls.clone(),
                    })?;

                    transitions.push(LoopState::ProcessingToolCalls);
                    let results = self.dispatcher.dispatch_batch(&calls).await;
                    conversation.append_turn(Turn::ToolResults(results))?;
                }
            }
        }
    }

    async fn request(&self, conversation: &Conversation) -> Result<ModelResponse> {
        let messages = conversation.to_messages();
        let request = ModelRequest {
            messages: &messages,
            tools: &self.catalog,
        };
        debug!(
            messages = messages.len(),
            tools = self.catalog.len(),
            "calling model"
        );

        let response = match self.config.model_timeout {
            Some(limit) => tokio::time::timeout(limit, self.backend.call(request))
                .await
                .map_err(|_| ModelError::Timeout(limit))?,
            None => self.backend.call(request).await,
        };
        Ok(response?)
    }
}

/// Decide whether a response is a final answer or a batch of tool calls.
fn classify(response: ModelResponse) -> Result<Reply> {
    let calls = response.message.tool_calls();
    let text = response.message.text();

    if !calls.is_empty() {
        if let Some(bad) = calls
            .iter()
            .find(|c| !matches!(c.input, Value::Object(_) | Value::Null))
        {
            return Err(Error::MalformedResponse(format!(
                "arguments for `{}` are not an object",
                bad.name
            )));
        }
        if let Some(unnamed) = calls.iter().find(|c| c.name.trim().is_empty()) {
            return Err(Error::MalformedResponse(format!(
                "tool call `{}` has no name",
                unnamed.id
            )));
        }
        let preamble = Some(text).filter(|t| !t.trim().is_empty());
        return Ok(Reply::ToolCalls { preamble, calls });
    }

    if response.finish_reason == FinishReason::ToolUse {
        return Err(Error::MalformedResponse(
            "model stopped for tool use without requesting any tool".into(),
        ));
    }
    if text.trim().is_empty() {
        return Err(Error::MalformedResponse(
            "response contained neither text nor tool calls".into(),
        ));
    }
    Ok(Reply::Text(text))
}

/// Give every call in a batch a distinct id.
///
/// Calls with a missing or repeated id get a synthetic one, so two calls to
/// the same tool in one batch can never be confused.
fn assign_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.is_empty() || seen.contains(&call.id) {
                call.id = format!("call_{}", Uuid::new_v4().simple());
            }
            seen.insert(call.id.clone());
            call
        })
        .collect()
}

fn cycle_limit_reply(max: usize) -> String {
    format!(
        "I couldn't complete that request: it still needed more tool calls after {max} rounds. \
         Please try rephrasing or breaking it into smaller steps."
    )
}
