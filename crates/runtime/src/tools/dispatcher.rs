//! Batch execution of the tool calls from one model turn.

use super::ToolExecutor;
use crate::model::{ToolCall, ToolResult};
use futures::future::join_all;
use tracing::debug;

/// Executes every call of a batch, isolating failures.
///
/// Calls in a batch are independent, so they run concurrently, at most
/// `max_concurrency` at a time. Results come back in request order with
/// exactly one result per call.
#[derive(Debug, Clone)]
pub struct TurnDispatcher {
    executor: ToolExecutor,
    max_concurrency: Option<usize>,
}

impl TurnDispatcher {
    pub fn new(executor: ToolExecutor) -> Self {
        Self {
            executor,
            max_concurrency: None,
        }
    }

    /// Limit how many calls run at once. `None` runs the whole batch together.
    pub fn with_max_concurrency(mut self, max_concurrency: Option<usize>) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub async fn dispatch_batch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        if calls.is_empty() {
            return Vec::new();
        }

        let concurrency = self.max_concurrency.unwrap_or(calls.len()).max(1);
        let mut results = Vec::with_capacity(calls.len());
        for chunk in calls.chunks(concurrency) {
            let futs = chunk.iter().map(|call| self.executor.execute(call));
            results.extend(join_all(futs).await);
        }

        debug!(
            calls = calls.len(),
            failed = results.iter().filter(|r| r.is_error()).count(),
            "dispatched tool batch"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, ToolArguments, ToolError, ToolRegistry, ToolSpec};
    use serde_json::{Value, json};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn dispatcher(max_concurrency: Option<usize>) -> TurnDispatcher {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(FnTool::new(
                ToolSpec::new("ok", "Always succeeds"),
                |args: ToolArguments| async move { Ok::<_, ToolError>(json!(args.0)) },
            )))
            .unwrap();
        registry
            .register(Arc::new(FnTool::new(
                ToolSpec::new("fail", "Always fails"),
                |_args: ToolArguments| async move {
                    Err::<Value, _>(ToolError::execution("calendar offline"))
                },
            )))
            .unwrap();
        TurnDispatcher::new(ToolExecutor::new(Arc::new(registry)))
            .with_max_concurrency(max_concurrency)
    }

    fn batch(names: &[&str]) -> Vec<ToolCall> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ToolCall::new(format!("call_{i}"), *name, json!({ "n": i })))
            .collect()
    }

    #[tokio::test]
    async fn empty_batch() {
        assert!(dispatcher(None).dispatch_batch(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn one_result_per_call_despite_failures() {
        let calls = batch(&["ok", "fail", "missing", "ok", "fail"]);
        for limit in [None, Some(1), Some(2)] {
            let results = dispatcher(limit).dispatch_batch(&calls).await;
            assert_eq!(results.len(), calls.len());

            let ids: HashSet<_> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
            let expected: HashSet<_> = calls.iter().map(|c| c.id.as_str()).collect();
            assert_eq!(ids, expected);

            let failed = results.iter().filter(|r| r.is_error()).count();
            assert_eq!(failed, 3);
        }
    }

    #[tokio::test]
    async fn results_follow_request_order() {
        let calls = batch(&["fail", "ok", "missing"]);
        let results = dispatcher(None).dispatch_batch(&calls).await;
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["fail", "ok", "missing"]);
    }

    /// Highest number of calls observed running at once for a batch of `n`.
    async fn peak_concurrency(max_concurrency: Option<usize>, n: usize) -> usize {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut registry = ToolRegistry::new();
        let (r, p) = (running.clone(), peak.clone());
        registry
            .register(Arc::new(FnTool::new(
                ToolSpec::new("wait", "Sleeps briefly"),
                move |_args: ToolArguments| {
                    let (running, peak) = (r.clone(), p.clone());
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, ToolError>(Value::Null)
                    }
                },
            )))
            .unwrap();
        let dispatcher = TurnDispatcher::new(ToolExecutor::new(Arc::new(registry)))
            .with_max_concurrency(max_concurrency);

        let results = dispatcher.dispatch_batch(&batch(&vec!["wait"; n])).await;
        assert_eq!(results.len(), n);
        assert!(results.iter().all(|r| !r.is_error()));
        peak.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn calls_run_concurrently() {
        assert_eq!(peak_concurrency(None, 3).await, 3);
    }

    #[tokio::test]
    async fn max_concurrency_bounds_the_batch() {
        assert_eq!(peak_concurrency(Some(2), 5).await, 2);
        assert_eq!(peak_concurrency(Some(1), 3).await, 1);
    }
}
