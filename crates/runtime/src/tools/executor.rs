//! Single-call tool execution.

use super::{ToolArguments, ToolError, ToolRegistry};
use crate::model::{ToolCall, ToolResult};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs one tool call and folds every failure into a [`ToolResult`].
///
/// Unknown names, bad arguments, tool errors, panics and timeouts all come
/// back as failure outcomes; nothing escapes to the caller.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bound every call by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let started = Instant::now();
        match self.run(call).await {
            Ok(output) => {
                debug!(
                    tool = %call.name,
                    call_id = %call.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool succeeded"
                );
                ToolResult::success(call, output)
            }
            Err(error) => {
                warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    %error,
                    "tool failed"
                );
                ToolResult::failure(call, error)
            }
        }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let tool = self.registry.lookup(&call.name)?;
        let arguments = ToolArguments::try_from(call.input.clone())?;

        let invocation = AssertUnwindSafe(tool.call(arguments)).catch_unwind();
        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .map_err(|_| ToolError::Timeout(limit.as_millis() as u64))?,
            None => invocation.await,
        };

        finished.map_err(|panic| ToolError::Panicked(panic_message(panic.as_ref())))?
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, ParamType, ToolSpec};
    use serde_json::json;

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(FnTool::new(
                ToolSpec::new("check_appointment_availability", "Check a slot").required(
                    "datetime",
                    ParamType::String,
                    "UTC start",
                ),
                |args: ToolArguments| async move {
                    let datetime = args.str("datetime")?.to_string();
                    Ok::<_, ToolError>(json!({ "datetime": datetime, "available": true }))
                },
            )))
            .unwrap();
        registry
            .register(Arc::new(FnTool::new(
                ToolSpec::new("delete_appointment", "Delete a slot"),
                |_args: ToolArguments| async move {
                    Err::<Value, _>(ToolError::execution("no appointment at that time"))
                },
            )))
            .unwrap();
        registry
            .register(Arc::new(FnTool::new(
                ToolSpec::new("explode", "Panics"),
                |_args: ToolArguments| async move {
                    if true {
                        panic!("calendar backend exploded");
                    }
                    Ok::<_, ToolError>(Value::Null)
                },
            )))
            .unwrap();
        registry
            .register(Arc::new(FnTool::new(
                ToolSpec::new("slow", "Never finishes in time"),
                |_args: ToolArguments| async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok::<_, ToolError>(Value::Null)
                },
            )))
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn successful_call() {
        let executor = ToolExecutor::new(registry());
        let call = ToolCall::new(
            "toolu_1",
            "check_appointment_availability",
            json!({"datetime": "2024-07-15T15:00:00Z"}),
        );
        let result = executor.execute(&call).await;
        assert_eq!(result.tool_call_id, "toolu_1");
        assert_eq!(result.name, "check_appointment_availability");
        match result.outcome {
            crate::model::ToolOutcome::Success { output } => {
                assert_eq!(output["available"], true);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failure_result() {
        let executor = ToolExecutor::new(registry());
        let call = ToolCall::new("toolu_2", "book_flight", json!({}));
        let result = executor.execute(&call).await;
        assert_eq!(
            result.error(),
            Some(&ToolError::UnknownTool("book_flight".into()))
        );
    }

    #[tokio::test]
    async fn tool_error_is_contained() {
        let executor = ToolExecutor::new(registry());
        let call = ToolCall::new("toolu_3", "delete_appointment", json!({}));
        let result = executor.execute(&call).await;
        assert_eq!(
            result.error(),
            Some(&ToolError::Execution("no appointment at that time".into()))
        );
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let executor = ToolExecutor::new(registry());
        let call = ToolCall::new("toolu_4", "explode", Value::Null);
        let result = executor.execute(&call).await;
        assert_eq!(
            result.error(),
            Some(&ToolError::Panicked("calendar backend exploded".into()))
        );
    }

    #[tokio::test]
    async fn invalid_arguments_are_contained() {
        let executor = ToolExecutor::new(registry());
        let call = ToolCall::new("toolu_5", "check_appointment_availability", json!("3pm"));
        let result = executor.execute(&call).await;
        assert!(matches!(result.error(), Some(ToolError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn timeout_is_contained() {
        let executor =
            ToolExecutor::new(registry()).with_timeout(Some(Duration::from_millis(20)));
        let call = ToolCall::new("toolu_6", "slow", Value::Null);
        let result = executor.execute(&call).await;
        assert_eq!(result.error(), Some(&ToolError::Timeout(20)));
    }
}
