//! Parallel agent dispatcher
//!
//! Fans out one invocation per task and fans back in before returning:
//!
//! ```text
//!   tasks[0] ──► invoke ──┐
//!   tasks[1] ──► invoke ──┼──► join_all ──► results[i] for tasks[i]
//!   tasks[2] ──► invoke ──┘
//! ```
//!
//! Each slot is bounded by its own timeout. A failed, timed-out, or
//! panicking task fills its slot with an error and never touches siblings.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::Semaphore;

use super::confidence::{aggregate_review, ReviewReport, DEFAULT_CONFIDENCE_THRESHOLD};
use super::types::{AgentInvoker, AgentResult, AgentTask};

/// Default per-task budget
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Per-task timeout; time spent waiting for a concurrency slot is excluded
    pub task_timeout: Duration,
    /// Upper bound on simultaneous invocations; `None` runs every task at once
    pub max_concurrency: Option<usize>,
    /// Threshold applied by [`ParallelAgentDispatcher::dispatch_review`]
    pub confidence_threshold: u8,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            task_timeout: DEFAULT_AGENT_TIMEOUT,
            max_concurrency: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Runs independent agent tasks concurrently
#[derive(Debug, Clone, Default)]
pub struct ParallelAgentDispatcher {
    config: DispatchConfig,
}

impl ParallelAgentDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run every task; the result at position `i` belongs to `tasks[i]`
    pub async fn dispatch(
        &self,
        tasks: &[AgentTask],
        invoker: &dyn AgentInvoker,
    ) -> Vec<AgentResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let permits = self
            .config
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        let timeout = self.config.task_timeout;

        tracing::info!(
            tasks = tasks.len(),
            max_concurrency = ?self.config.max_concurrency,
            timeout_secs = timeout.as_secs(),
            "Dispatching parallel agents"
        );

        let futures: Vec<_> = tasks
            .iter()
            .enumerate()
            .map(|(index, task)| {
                let permits = permits.clone();
                async move {
                    let _permit = match &permits {
                        Some(sem) => match sem.clone().acquire_owned().await {
                            Ok(p) => Some(p),
                            Err(_) => {
                                return AgentResult::failure(index, task, "dispatcher closed", 0)
                            }
                        },
                        None => None,
                    };
                    run_one(index, task, invoker, timeout).await
                }
            })
            .collect();

        let results = futures::future::join_all(futures).await;

        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(
            tasks = results.len(),
            failed,
            "Parallel agents finished"
        );
        results
    }

    /// Dispatch reviewers, then filter and de-duplicate their findings
    pub async fn dispatch_review(
        &self,
        tasks: &[AgentTask],
        invoker: &dyn AgentInvoker,
    ) -> ReviewReport {
        let results = self.dispatch(tasks, invoker).await;
        aggregate_review(results, self.config.confidence_threshold)
    }
}

async fn run_one(
    index: usize,
    task: &AgentTask,
    invoker: &dyn AgentInvoker,
    timeout: Duration,
) -> AgentResult {
    let start = Instant::now();
    let name = task.display_name(index);
    let call = AssertUnwindSafe(invoker.invoke(task)).catch_unwind();

    let outcome = tokio::time::timeout(timeout, call).await;
    let elapsed = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(Ok(output))) => {
            tracing::debug!(agent = %name, duration_ms = elapsed, "Agent completed");
            AgentResult::success(index, task, output, elapsed)
        }
        Ok(Ok(Err(e))) => {
            tracing::warn!(agent = %name, error = %e, "Agent failed");
            AgentResult::failure(index, task, e.to_string(), elapsed)
        }
        Ok(Err(_)) => {
            tracing::warn!(agent = %name, "Agent panicked");
            AgentResult::failure(index, task, "agent panicked", elapsed)
        }
        Err(_) => {
            tracing::warn!(agent = %name, timeout_ms = timeout.as_millis() as u64, "Agent timed out");
            AgentResult::failure(
                index,
                task,
                format!("agent timed out after {}ms", timeout.as_millis()),
                elapsed,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::types::{AgentOutput, Finding, Severity};
    use crate::error::{OrchestrationError, Result};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails on focus "fail", sleeps for "slow", otherwise echoes a finding.
    /// Earlier tasks sleep longer so completion order is reversed.
    struct ScriptedInvoker {
        total: usize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedInvoker {
        fn new(total: usize) -> Self {
            Self {
                total,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AgentInvoker for ScriptedInvoker {
        async fn invoke(&self, task: &AgentTask) -> Result<AgentOutput> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let idx: usize = task.context.parse().unwrap_or(0);
            let delay = (self.total - idx) as u64 * 5;
            let result = match task.focus.as_str() {
                "fail" => Err(OrchestrationError::external("model unavailable")),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(AgentOutput::text("late"))
                }
                "panic" => panic!("reviewer crashed"),
                _ => {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(AgentOutput::text(format!("done {idx}")).with_findings(vec![
                        Finding::new(format!("f{idx}.rs:1"), "issue", Severity::High, 90),
                    ]))
                }
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn tasks(n: usize, fail: Option<usize>) -> Vec<AgentTask> {
        (0..n)
            .map(|i| {
                let focus = if Some(i) == fail { "fail" } else { "ok" };
                AgentTask::new(focus, i.to_string())
            })
            .collect()
    }

    #[tokio::test]
    async fn results_follow_input_order() {
        let dispatcher = ParallelAgentDispatcher::default();
        let invoker = ScriptedInvoker::new(4);
        let results = dispatcher.dispatch(&tasks(4, None), &invoker).await;

        assert_eq!(results.len(), 4);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.source_task_index, i);
            assert_eq!(r.output, format!("done {i}"));
        }
    }

    #[tokio::test]
    async fn empty_dispatch_returns_nothing() {
        let dispatcher = ParallelAgentDispatcher::default();
        let invoker = ScriptedInvoker::new(0);
        assert!(dispatcher.dispatch(&[], &invoker).await.is_empty());
    }

    #[tokio::test]
    async fn timeout_is_isolated() {
        let dispatcher = ParallelAgentDispatcher::new(DispatchConfig {
            task_timeout: Duration::from_millis(200),
            ..Default::default()
        });
        let invoker = ScriptedInvoker::new(3);
        let mut ts = tasks(3, None);
        ts[1].focus = "slow".into();

        let results = dispatcher.dispatch(&ts, &invoker).await;
        assert!(results[0].is_success());
        assert!(results[1].error.as_deref().unwrap().contains("timed out"));
        assert!(results[1].findings.is_empty());
        assert!(results[2].is_success());
    }

    #[tokio::test]
    async fn panic_is_isolated() {
        let dispatcher = ParallelAgentDispatcher::default();
        let invoker = ScriptedInvoker::new(2);
        let mut ts = tasks(2, None);
        ts[0].focus = "panic".into();

        let results = dispatcher.dispatch(&ts, &invoker).await;
        assert_eq!(results[0].error.as_deref(), Some("agent panicked"));
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let dispatcher = ParallelAgentDispatcher::new(DispatchConfig {
            max_concurrency: Some(2),
            ..Default::default()
        });
        let invoker = ScriptedInvoker::new(6);
        let results = dispatcher.dispatch(&tasks(6, None), &invoker).await;

        assert!(results.iter().all(|r| r.is_success()));
        assert!(invoker.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn review_dispatch_filters_and_merges() {
        let dispatcher = ParallelAgentDispatcher::default();
        let invoker = ScriptedInvoker::new(3);
        let mut ts = tasks(3, Some(2));
        // Two reviewers report the same location
        ts[1].context = "0".into();

        let report = dispatcher.dispatch_review(&ts, &invoker).await;
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].location, "f0.rs:1");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]
        #[test]
        fn exactly_the_failing_slot_errors((n, k) in (1usize..8).prop_flat_map(|n| (Just(n), 0..n))) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            let results = rt.block_on(async {
                let invoker = ScriptedInvoker::new(n);
                ParallelAgentDispatcher::default()
                    .dispatch(&tasks(n, Some(k)), &invoker)
                    .await
            });

            prop_assert_eq!(results.len(), n);
            for (i, r) in results.iter().enumerate() {
                if i == k {
                    prop_assert!(r.error.is_some());
                    prop_assert!(r.findings.is_empty());
                } else {
                    prop_assert!(r.error.is_none());
                    prop_assert_eq!(r.findings.len(), 1);
                }
            }
        }
    }
}
