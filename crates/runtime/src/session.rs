//! Session management.

use crate::conversation::{Conversation, Turn};
use crate::model::{Backend, Usage};
use crate::orchestrator::{LoopConfig, Orchestrator, TurnOutcome};
use crate::tools::{ToolExecutor, ToolRegistry, ToolSpec, TurnDispatcher};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builder for a [`Session`].
pub struct SessionBuilder<B> {
    backend: B,
    registry: Arc<ToolRegistry>,
    instructions: String,
    catalog: Option<Vec<ToolSpec>>,
    config: LoopConfig,
}

impl<B: Backend> SessionBuilder<B> {
    /// Declare the catalog sent to the model explicitly.
    ///
    /// It is checked against the registry when the session is built.
    /// Without it, the registry's own specs are sent.
    pub fn catalog(mut self, catalog: Vec<ToolSpec>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Session<B>> {
        let catalog = match self.catalog {
            Some(catalog) => {
                self.registry.verify_catalog(&catalog)?;
                catalog
            }
            None => self.registry.specs().to_vec(),
        };

        let executor = ToolExecutor::new(self.registry).with_timeout(self.config.tool_timeout);
        let dispatcher =
            TurnDispatcher::new(executor).with_max_concurrency(self.config.max_concurrency);
        let orchestrator = Orchestrator::new(self.backend, dispatcher, catalog, self.config);

        let session = Session {
            id: SessionId::new(),
            conversation: Conversation::new(self.instructions),
            orchestrator,
            usage: Usage::default(),
        };
        info!(session = %session.id, tools = session.catalog().len(), "session started");
        Ok(session)
    }
}

/// A conversation session.
///
/// Owns its history exclusively; nothing is shared between sessions except
/// the immutable tool registry.
pub struct Session<B> {
    id: SessionId,
    conversation: Conversation,
    orchestrator: Orchestrator<B>,
    usage: Usage,
}

impl<B: Backend> Session<B> {
    pub fn builder(
        backend: B,
        registry: Arc<ToolRegistry>,
        instructions: impl Into<String>,
    ) -> SessionBuilder<B> {
        SessionBuilder {
            backend,
            registry,
            instructions: instructions.into(),
            catalog: None,
            config: LoopConfig::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Send a user message and run the loop until the model answers.
    pub async fn chat(&mut self, user_input: &str) -> Result<TurnOutcome> {
        self.orchestrator
            .run_turn(&mut self.conversation, user_input, &mut self.usage)
            .await
    }

    pub fn history(&self) -> &[Turn] {
        self.conversation.history()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn catalog(&self) -> &[ToolSpec] {
        self.orchestrator.catalog()
    }

    pub fn backend(&self) -> &B {
        self.orchestrator.backend()
    }

    /// Token usage of every model call in this session, failed turns included.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// End the session, discarding its history.
    pub fn end(self) -> Usage {
        info!(
            session = %self.id,
            turns = self.conversation.len(),
            tokens = self.usage.total_tokens(),
            "session ended"
        );
        self.usage
    }
}
