//! Steward runtime: the tool-augmented conversation loop.
//!
//! This crate lets a language model call local tools during a conversation
//! until it produces a final answer for the user.
//!
//! # Overview
//!
//! - **ToolRegistry**: name-keyed tool implementations and their specs.
//! - **ToolExecutor**: runs one call and turns every failure into a result
//!   the model can read.
//! - **TurnDispatcher**: runs all calls from one model turn concurrently.
//! - **Orchestrator**: the loop that alternates between the model and the
//!   tools, bounded by a per-turn cycle cap.
//! - **Session**: owns one conversation's history and drives the loop.
//! - **Backend**: a trait abstracting LLM providers (Anthropic, etc.).
//!
//! # Example
//!
//! ```ignore
//! use runtime::{AnthropicAuth, AnthropicBackend, Session, ToolRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() -> runtime::Result<()> {
//! let auth = AnthropicAuth::ApiKey("sk-ant-api01-...".into());
//! let backend = AnthropicBackend::builder(auth, "claude-sonnet-4-20250514").build();
//! let registry = Arc::new(ToolRegistry::new());
//!
//! let mut session = Session::builder(backend, registry, "You are a helpful assistant.").build()?;
//! let outcome = session.chat("Hello!").await?;
//! println!("{}", outcome.reply);
//! # Ok(())
//! # }
//! ```

pub mod conversation;
mod error;
pub mod model;
pub mod orchestrator;
pub mod providers;
mod session;
pub mod tools;

pub use conversation::{Conversation, Turn, TurnKind};
pub use error::{Error, Result};
pub use model::{
    Backend, FinishReason, Message, ModelError, ModelRequest, ModelResponse, Part, Role,
    ToolCall, ToolOutcome, ToolResult, Usage,
};
pub use orchestrator::{LoopConfig, LoopState, Orchestrator, TurnOutcome};
pub use providers::{AnthropicAuth, AnthropicBackend, AnthropicBackendBuilder};
pub use session::{Session, SessionBuilder, SessionId};
pub use tools::{
    FnTool, ParamType, Parameter, Tool, ToolArguments, ToolError, ToolExecutor, ToolRegistry,
    ToolSpec, TurnDispatcher,
};
