// src/runtime/executor.rs
//! Per-agent action executor
//!
//! Runs one named operation against the target service with a bounded
//! attempt budget and linear backoff, classifying every failure and
//! appending the outcome to the owning agent's metrics.
//!
//! # Retry timeline (budget 3, base 1s)
//!
//! ```text
//! attempt 1 ──✗── wait 1s ── attempt 2 ──✗── wait 2s ── attempt 3 ──✗── Err
//!                                                                  └─✓── Ok
//! ```
//!
//! No wait follows the final attempt. The backoff is uncapped.

use crate::model::{Action, AgentMetrics, ErrorRecord};
use crate::runtime::log::AgentLog;
use crate::target::TargetError;
use crate::utils::config::RunConfig;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Executes actions on behalf of a single agent and owns its metrics
pub struct ActionExecutor {
    /// Attempt budget for retryable actions
    max_retries: u32,

    /// Linear backoff unit
    base_delay: Duration,

    /// Metrics of the owning agent
    metrics: AgentMetrics,

    log: Arc<dyn AgentLog>,
}

impl ActionExecutor {
    /// Executor using the run's retry policy
    pub fn new(config: &RunConfig, steps_total: usize, log: Arc<dyn AgentLog>) -> Self {
        Self::with_policy(config.max_retries, config.retry_base_delay, steps_total, log)
    }

    pub fn with_policy(
        max_retries: u32,
        base_delay: Duration,
        steps_total: usize,
        log: Arc<dyn AgentLog>,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            metrics: AgentMetrics::new(steps_total),
            log,
        }
    }

    /// 1 for non-retryable actions, the configured budget otherwise
    pub fn attempt_budget(&self, retryable: bool) -> u32 {
        if retryable {
            self.max_retries.max(1)
        } else {
            1
        }
    }

    /// Wait inserted after failed attempt `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut AgentMetrics {
        &mut self.metrics
    }

    pub fn into_metrics(self) -> AgentMetrics {
        self.metrics
    }

    /// Run `operation` until it succeeds or the attempt budget is spent
    ///
    /// Every failed attempt appends an [`ErrorRecord`]. Exactly one
    /// [`Action`] is recorded per call. When the budget is exhausted the last
    /// error is returned to the caller.
    pub async fn execute<T, F, Fut>(
        &mut self,
        action_type: &str,
        retryable: bool,
        mut operation: F,
    ) -> Result<T, TargetError>
    where
        T: Serialize,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TargetError>>,
    {
        let start = Instant::now();
        let max_attempts = self.attempt_budget(retryable);
        let mut attempt = 0;

        self.log.info(&format!("Executing action: {}", action_type));

        loop {
            attempt += 1;

            match operation().await {
                Ok(result) => {
                    let duration = elapsed_ms(start);

                    let mut details = Map::new();
                    details.insert("attempts".to_string(), Value::from(attempt));
                    if let Ok(value) = serde_json::to_value(&result) {
                        if !value.is_null() {
                            details.insert("result".to_string(), value);
                        }
                    }

                    self.metrics.record_action(Action {
                        action_type: action_type.to_string(),
                        timestamp: Utc::now(),
                        duration,
                        success: true,
                        details,
                        error: None,
                    });

                    metrics::counter!("beta_swarm_actions_total", "outcome" => "success").increment(1);
                    metrics::histogram!("beta_swarm_action_duration_ms").record(duration as f64);

                    self.log.info(&format!(
                        "Action completed: {} ({}ms, {} attempt(s))",
                        action_type, duration, attempt
                    ));
                    return Ok(result);
                }
                Err(err) => {
                    let record = error_record(action_type, attempt, &err);
                    metrics::counter!(
                        "beta_swarm_action_errors_total",
                        "severity" => record.severity.as_str()
                    )
                    .increment(1);
                    self.metrics.record_error(record.clone());

                    if attempt < max_attempts {
                        self.log.warn(&format!(
                            "Action failed, retrying ({}/{}): {}: {}",
                            attempt, max_attempts, action_type, err
                        ));
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                        continue;
                    }

                    let duration = elapsed_ms(start);
                    self.log.error(&format!(
                        "Action failed permanently: {}: {}",
                        action_type, err
                    ));

                    let mut details = Map::new();
                    details.insert("attempts".to_string(), Value::from(attempt));

                    self.metrics.record_action(Action {
                        action_type: action_type.to_string(),
                        timestamp: Utc::now(),
                        duration,
                        success: false,
                        details,
                        error: Some(record),
                    });

                    metrics::counter!("beta_swarm_actions_total", "outcome" => "failure").increment(1);
                    metrics::histogram!("beta_swarm_action_duration_ms").record(duration as f64);

                    return Err(err);
                }
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn error_record(action_type: &str, attempt: u32, err: &TargetError) -> ErrorRecord {
    let mut context = Map::new();
    context.insert("actionType".to_string(), Value::from(action_type));
    context.insert("attempt".to_string(), Value::from(attempt));

    ErrorRecord {
        kind: err.kind_or_unknown().to_string(),
        severity: err.severity(),
        message: err.message.clone(),
        stack_trace: Some(format!("{:?}", err)),
        endpoint: err.endpoint.clone(),
        status_code: err.status,
        context,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use crate::runtime::log::MemoryLog;
    use serde_json::json;
    use tracing::Level;

    fn executor(max_retries: u32, log: Arc<MemoryLog>) -> ActionExecutor {
        ActionExecutor::with_policy(max_retries, Duration::from_millis(1000), 5, log)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let mut exec = executor(3, Arc::new(MemoryLog::new()));

        let result = exec
            .execute("view_analytics", true, || async { Ok(json!({"metrics": 4})) })
            .await
            .unwrap();

        assert_eq!(result["metrics"], 4);
        let metrics = exec.metrics();
        assert_eq!(metrics.actions.len(), 1);
        assert_eq!(metrics.actions[0].attempts(), 1);
        assert_eq!(metrics.actions[0].details["result"]["metrics"], 4);
        assert_eq!(metrics.steps_completed, 1);
        assert!(metrics.errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_succeed() {
        let log = Arc::new(MemoryLog::new());
        let mut exec = executor(3, log.clone());
        let mut calls = 0;
        let started = Instant::now();

        let result = exec
            .execute("upload_manuscript", true, || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Err(TargetError::http(503, "Service Unavailable"))
                    } else {
                        Ok(json!({"book": {"id": "b-1"}}))
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(3000));

        let metrics = exec.metrics();
        assert_eq!(metrics.actions.len(), 1);
        let action = &metrics.actions[0];
        assert!(action.success);
        assert_eq!(action.details["attempts"], 3);
        assert!(action.duration >= 3000);
        assert_eq!(metrics.errors.len(), 2);
        assert_eq!(metrics.steps_completed, 1);
        assert_eq!(log.count(Level::WARN, "retrying"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_records_failure_and_returns_error() {
        let mut exec = executor(3, Arc::new(MemoryLog::new()));
        let started = Instant::now();

        let err = exec
            .execute("signup_or_login", true, || async {
                Err::<Value, _>(
                    TargetError::http(500, "boom")
                        .with_kind("INTERNAL")
                        .with_endpoint("/api/auth/signup"),
                )
            })
            .await
            .unwrap_err();

        // 1s + 2s of backoff, nothing after the last attempt
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(6000));

        assert_eq!(err.status, Some(500));
        let metrics = exec.metrics();
        assert_eq!(metrics.errors.len(), 3);
        assert!(metrics.errors.iter().all(|e| e.severity == Severity::Critical));
        assert_eq!(metrics.errors[2].context["attempt"], 3);
        assert_eq!(metrics.errors[0].kind, "INTERNAL");
        assert_eq!(metrics.errors[0].endpoint.as_deref(), Some("/api/auth/signup"));

        assert_eq!(metrics.actions.len(), 1);
        let action = &metrics.actions[0];
        assert!(!action.success);
        assert_eq!(action.attempts(), 3);
        assert!(action.error.is_some());
        assert_eq!(metrics.steps_completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_gets_one_attempt() {
        let mut exec = executor(5, Arc::new(MemoryLog::new()));
        let started = Instant::now();
        let mut calls = 0;

        let result = exec
            .execute("explore_advanced_features", false, || {
                calls += 1;
                async { Err::<Value, _>(TargetError::http(429, "slow down")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(exec.metrics().errors[0].severity, Severity::Low);
        assert_eq!(exec.metrics().actions[0].attempts(), 1);
    }

    #[test]
    fn test_backoff_is_linear() {
        let exec = executor(4, Arc::new(MemoryLog::new()));
        assert_eq!(exec.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(exec.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(exec.backoff_delay(3), Duration::from_millis(3000));
        assert_eq!(exec.attempt_budget(true), 4);
        assert_eq!(exec.attempt_budget(false), 1);
    }

    #[test]
    fn test_zero_budget_still_attempts_once() {
        let exec = executor(0, Arc::new(MemoryLog::new()));
        assert_eq!(exec.attempt_budget(true), 1);
    }
}
