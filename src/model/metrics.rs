// src/model/metrics.rs
//! Per-agent metrics and run-level results

use crate::model::persona::Persona;
use crate::model::records::{Action, Decision, ErrorRecord, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Agent lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "PENDING",
            AgentStatus::Running => "RUNNING",
            AgentStatus::Completed => "COMPLETED",
            AgentStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Failed)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling profile of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Serial,
    Parallel,
    Stress,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Serial => "serial",
            RunMode::Parallel => "parallel",
            RunMode::Stress => "stress",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one agent recorded during its flow
///
/// Created empty when the agent is constructed, mutated only through the
/// agent's own action executor, frozen by [`AgentMetrics::finalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Flow duration in milliseconds, set on finalize
    pub duration: Option<u64>,
    pub actions: Vec<Action>,
    pub decisions: Vec<Decision>,
    pub errors: Vec<ErrorRecord>,
    /// Percentage of successful actions, `0..=100`
    pub success_rate: f64,
    pub steps_completed: usize,
    pub steps_total: usize,
    /// Duration of every recorded action, in recording order
    pub response_times: Vec<u64>,
    /// Optional steps whose failure was tolerated
    #[serde(default)]
    pub degraded_steps: Vec<String>,
}

impl AgentMetrics {
    pub fn new(steps_total: usize) -> Self {
        Self {
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            actions: Vec::new(),
            decisions: Vec::new(),
            errors: Vec::new(),
            success_rate: 0.0,
            steps_completed: 0,
            steps_total,
            response_times: Vec::new(),
            degraded_steps: Vec::new(),
        }
    }

    /// Append an action; a successful one completes a step
    pub fn record_action(&mut self, action: Action) {
        self.response_times.push(action.duration);
        if action.success && self.steps_completed < self.steps_total {
            self.steps_completed += 1;
        }
        self.actions.push(action);
    }

    pub fn record_error(&mut self, error: ErrorRecord) {
        self.errors.push(error);
    }

    pub fn record_decision(&mut self, decision: Decision) {
        self.decisions.push(decision);
    }

    pub fn successful_actions(&self) -> usize {
        self.actions.iter().filter(|a| a.success).count()
    }

    /// Successful actions over all actions, as a percentage
    pub fn compute_success_rate(&self) -> f64 {
        if self.actions.is_empty() {
            0.0
        } else {
            self.successful_actions() as f64 / self.actions.len() as f64 * 100.0
        }
    }

    /// Freeze the metrics at the end of a flow
    pub fn finalize(&mut self, elapsed: Duration) {
        self.end_time = Some(Utc::now());
        self.duration = Some(elapsed.as_millis() as u64);
        self.success_rate = self.compute_success_rate();
    }

    pub fn is_finalized(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Final outcome of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub agent_name: String,
    pub persona: Persona,
    pub status: AgentStatus,
    pub metrics: AgentMetrics,
    pub summary: String,
}

/// Error counts per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityBreakdown {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityBreakdown {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Aggregated outcome of a whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: String,
    pub platform: String,
    pub mode: RunMode,
    pub total_agents: usize,
    pub completed_agents: usize,
    pub failed_agents: usize,
    /// Wall-clock milliseconds
    pub duration: u64,
    /// Completed agents over total agents, as a percentage
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub p50_response_time: u64,
    pub p95_response_time: u64,
    pub p99_response_time: u64,
    /// Recorded actions per second
    pub throughput: f64,
    pub total_actions: usize,
    pub error_count: usize,
    pub severity_breakdown: SeverityBreakdown,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub results: Vec<AgentResult>,
}
