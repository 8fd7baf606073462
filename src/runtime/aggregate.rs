// src/runtime/aggregate.rs
//! Run-level aggregation
//!
//! Pure functions from agent results to a [`RunResult`]; persistence happens
//! afterwards and never feeds back into these numbers.

use crate::model::{AgentResult, AgentStatus, RunMode, RunResult, SeverityBreakdown};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Identity of the run being aggregated
#[derive(Debug, Clone)]
pub struct RunHeader {
    pub run_id: String,
    pub platform: String,
    pub mode: RunMode,
    /// Configured agent count, the denominator of the success rate
    pub total_agents: usize,
    pub started_at: DateTime<Utc>,
}

/// Nearest-rank percentile of an ascending slice, 0 when empty
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (p * sorted.len() as f64 / 100.0).ceil() as i64 - 1;
    let index = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    sorted[index]
}

/// Actions per second of wall-clock time, 0 for an instantaneous run
pub fn throughput(total_actions: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        total_actions as f64 / secs
    } else {
        0.0
    }
}

pub fn aggregate(header: RunHeader, results: Vec<AgentResult>, elapsed: Duration) -> RunResult {
    let completed_agents = results
        .iter()
        .filter(|r| r.status == AgentStatus::Completed)
        .count();
    let failed_agents = results
        .iter()
        .filter(|r| r.status == AgentStatus::Failed)
        .count();

    let mut durations: Vec<u64> = results
        .iter()
        .flat_map(|r| r.metrics.actions.iter().map(|a| a.duration))
        .collect();
    durations.sort_unstable();

    let total_actions = durations.len();
    let avg_response_time = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<u64>() as f64 / durations.len() as f64
    };

    let mut severity_breakdown = SeverityBreakdown::default();
    for error in results.iter().flat_map(|r| r.metrics.errors.iter()) {
        severity_breakdown.add(error.severity);
    }

    let success_rate = if header.total_agents == 0 {
        0.0
    } else {
        completed_agents as f64 / header.total_agents as f64 * 100.0
    };

    RunResult {
        run_id: header.run_id,
        platform: header.platform,
        mode: header.mode,
        total_agents: header.total_agents,
        completed_agents,
        failed_agents,
        duration: elapsed.as_millis() as u64,
        success_rate,
        avg_response_time,
        p50_response_time: percentile(&durations, 50.0),
        p95_response_time: percentile(&durations, 95.0),
        p99_response_time: percentile(&durations, 99.0),
        throughput: throughput(total_actions, elapsed),
        total_actions,
        error_count: severity_breakdown.total(),
        severity_breakdown,
        started_at: header.started_at,
        completed_at: Utc::now(),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, AgentMetrics, ErrorRecord, PersonaType, Severity};
    use crate::persona::PersonaGenerator;
    use crate::runtime::random::ScriptedRandom;
    use serde_json::Map;

    fn result(status: AgentStatus, durations: &[u64], severities: &[Severity]) -> AgentResult {
        let mut metrics = AgentMetrics::new(durations.len());
        for d in durations {
            metrics.record_action(Action {
                action_type: "step".to_string(),
                timestamp: Utc::now(),
                duration: *d,
                success: true,
                details: Map::new(),
                error: None,
            });
        }
        for s in severities {
            metrics.record_error(ErrorRecord {
                kind: "UNKNOWN".to_string(),
                severity: *s,
                message: "x".to_string(),
                stack_trace: None,
                endpoint: None,
                status_code: None,
                context: Map::new(),
                timestamp: Utc::now(),
            });
        }
        metrics.finalize(Duration::from_millis(1));
        AgentResult {
            agent_name: "a".to_string(),
            persona: PersonaGenerator::generate(PersonaType::Beginner, 1, &mut ScriptedRandom::constant(0.0)),
            status,
            metrics,
            summary: String::new(),
        }
    }

    fn header(total_agents: usize) -> RunHeader {
        RunHeader {
            run_id: "run".to_string(),
            platform: "lumina".to_string(),
            mode: RunMode::Parallel,
            total_agents,
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let sorted = [10, 20, 30, 40, 50];
        assert_eq!(percentile(&sorted, 50.0), 30);
        assert_eq!(percentile(&sorted, 95.0), 50);
        assert_eq!(percentile(&sorted, 99.0), 50);
        assert_eq!(percentile(&[7], 50.0), 7);
        assert_eq!(percentile(&[], 95.0), 0);
        assert_eq!(percentile(&[1, 2, 3, 4], 50.0), 2);
    }

    #[test]
    fn test_throughput() {
        assert_eq!(throughput(120, Duration::from_millis(60_000)), 2.0);
        assert_eq!(throughput(5, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_aggregate_counts_and_latency() {
        let results = vec![
            result(AgentStatus::Completed, &[10, 50], &[]),
            result(AgentStatus::Failed, &[30], &[Severity::Critical, Severity::Critical, Severity::Low]),
            result(AgentStatus::Completed, &[20, 40], &[Severity::High]),
        ];

        let run = aggregate(header(3), results, Duration::from_secs(5));

        assert_eq!(run.completed_agents, 2);
        assert_eq!(run.failed_agents, 1);
        assert_eq!(run.results.len(), 3);
        assert!((run.success_rate - 66.666).abs() < 0.01);
        assert_eq!(run.total_actions, 5);
        assert_eq!(run.avg_response_time, 30.0);
        assert_eq!(run.p50_response_time, 30);
        assert_eq!(run.p95_response_time, 50);
        assert_eq!(run.throughput, 1.0);
        assert_eq!(run.error_count, 4);
        assert_eq!(run.severity_breakdown.critical, 2);
        assert_eq!(run.severity_breakdown.high, 1);
        assert_eq!(run.severity_breakdown.low, 1);
        assert_eq!(run.duration, 5000);
    }

    #[test]
    fn test_empty_run() {
        let run = aggregate(header(0), Vec::new(), Duration::ZERO);
        assert_eq!(run.success_rate, 0.0);
        assert_eq!(run.avg_response_time, 0.0);
        assert_eq!(run.p99_response_time, 0);
        assert_eq!(run.throughput, 0.0);
    }
}
