//! Tool trait.

use super::{ToolArguments, ToolError, ToolSpec};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

/// A side-effecting operation the model may ask to run.
///
/// This is the boundary between the conversation loop and side effects.
/// Implementations own whatever state they mutate; they never see the
/// conversation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The declaration exposed to the model.
    fn spec(&self) -> &ToolSpec;

    /// Run the tool.
    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError>;
}

/// A tool backed by an async closure.
pub struct FnTool<F> {
    spec: ToolSpec,
    f: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(ToolArguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    pub fn new(spec: ToolSpec, f: F) -> Self {
        Self { spec, f }
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(ToolArguments) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        (self.f)(arguments).await
    }
}
