// src/cli.rs
//! Command-line surface of the `beta-swarm` binary

use crate::model::{RunMode, RunResult};
use crate::platforms::Platform;
use crate::recording::{ExportFormat, Exporter};
use crate::runtime::scheduler::OrchestrationConfig;
use crate::utils::config::RunConfig;
use crate::utils::errors::{EngineError, Result};
use clap::Parser;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::error;

/// Success rate a run needs for a zero exit status
pub const PASS_THRESHOLD: f64 = 80.0;

/// Run a swarm of synthetic beta users against a platform
#[derive(Parser, Debug)]
#[command(name = "beta-swarm", version, about)]
pub struct Cli {
    /// Target platform (lumina, mednext)
    #[arg(value_name = "PLATFORM")]
    pub platform: String,

    /// Run agents concurrently (default 20 agents, 5 at a time)
    #[arg(long, conflicts_with = "stress")]
    pub parallel: bool,

    /// Stress profile (default 50 agents, 10 at a time)
    #[arg(long)]
    pub stress: bool,

    /// Number of agents
    #[arg(long, value_name = "N")]
    pub agents: Option<usize>,

    /// Concurrency ceiling, ignored in serial mode
    #[arg(long, value_name = "N")]
    pub concurrent: Option<usize>,

    /// Write the run result as JSON
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Write a JUnit XML report
    #[arg(long, value_name = "PATH")]
    pub junit: Option<PathBuf>,

    /// Draw persona types from the realistic population mix
    #[arg(long)]
    pub realistic: bool,

    /// Seed for personas and agent randomness
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

impl Cli {
    pub fn mode(&self) -> RunMode {
        if self.stress {
            RunMode::Stress
        } else if self.parallel {
            RunMode::Parallel
        } else {
            RunMode::Serial
        }
    }

    pub fn platform(&self) -> Result<Platform> {
        self.platform.parse()
    }

    /// Agent count and ceiling after applying mode defaults
    pub fn plan(&self) -> Result<RunPlan> {
        let mode = self.mode();
        let (default_agents, default_concurrent) = OrchestrationConfig::defaults(mode);

        let agents = self.agents.unwrap_or(default_agents);
        let concurrent = match mode {
            RunMode::Serial => 1,
            _ => self.concurrent.unwrap_or(default_concurrent),
        };

        if agents == 0 {
            return Err(EngineError::Validation("--agents must be at least 1".to_string()));
        }
        if concurrent == 0 {
            return Err(EngineError::Validation(
                "--concurrent must be at least 1".to_string(),
            ));
        }

        Ok(RunPlan {
            mode,
            agents,
            concurrent,
            realistic: self.realistic,
        })
    }
}

/// Resolved shape of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    pub mode: RunMode,
    pub agents: usize,
    pub concurrent: usize,
    pub realistic: bool,
}

impl RunPlan {
    pub fn orchestration(&self, run: RunConfig) -> OrchestrationConfig {
        OrchestrationConfig::new(self.mode, self.agents, run.with_max_concurrent(self.concurrent))
            .with_realistic_personas(self.realistic)
    }
}

/// Readiness band of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl Verdict {
    pub fn from_success_rate(rate: f64) -> Self {
        if rate >= 95.0 {
            Verdict::Excellent
        } else if rate >= PASS_THRESHOLD {
            Verdict::Good
        } else if rate >= 60.0 {
            Verdict::Warning
        } else {
            Verdict::Critical
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Excellent | Verdict::Good)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Verdict::Excellent => "EXCELLENT: all agents passed with a high success rate",
            Verdict::Good => "GOOD: most agents passed, some issues need attention",
            Verdict::Warning => "WARNING: significant issues detected, review errors before beta",
            Verdict::Critical => "CRITICAL: platform not ready for beta",
        };
        f.write_str(text)
    }
}

/// Write the requested reports and return how many failed
///
/// Failures are logged only; the exit status depends on the run alone.
pub async fn write_reports(result: &RunResult, json: Option<&Path>, junit: Option<&Path>) -> usize {
    let requested = [(ExportFormat::Json, json), (ExportFormat::JUnit, junit)];
    let mut failed = 0;
    for (format, path) in requested {
        let Some(path) = path else { continue };
        if let Err(e) = Exporter::new(format).write_to(result, path).await {
            error!("Could not write {:?} report to {}: {}", format, path.display(), e);
            failed += 1;
        }
    }
    failed
}

/// Human-readable summary printed at the end of a run
pub fn render_summary(result: &RunResult) -> String {
    let breakdown = &result.severity_breakdown;
    format!(
        "Run {run_id} ({platform}, {mode})\n\
         \x20 Agents:       {total} total, {completed} completed, {failed} failed\n\
         \x20 Success rate: {rate:.2}%\n\
         \x20 Duration:     {secs:.2}s\n\
         \x20 Actions:      {actions} ({throughput:.2} req/s)\n\
         \x20 Response:     avg {avg:.0}ms, p50 {p50}ms, p95 {p95}ms, p99 {p99}ms\n\
         \x20 Errors:       {errors} (critical {critical}, high {high}, medium {medium}, low {low})\n\
         {verdict}",
        run_id = result.run_id,
        platform = result.platform,
        mode = result.mode,
        total = result.total_agents,
        completed = result.completed_agents,
        failed = result.failed_agents,
        rate = result.success_rate,
        secs = result.duration as f64 / 1000.0,
        actions = result.total_actions,
        throughput = result.throughput,
        avg = result.avg_response_time,
        p50 = result.p50_response_time,
        p95 = result.p95_response_time,
        p99 = result.p99_response_time,
        errors = result.error_count,
        critical = breakdown.critical,
        high = breakdown.high,
        medium = breakdown.medium,
        low = breakdown.low,
        verdict = Verdict::from_success_rate(result.success_rate),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::storage::fixtures::sample_run;
    use tempfile::tempdir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("beta-swarm").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_mode_defaults() {
        let serial = parse(&["lumina"]).plan().unwrap();
        assert_eq!((serial.mode, serial.agents, serial.concurrent), (RunMode::Serial, 10, 1));

        let parallel = parse(&["lumina", "--parallel"]).plan().unwrap();
        assert_eq!((parallel.mode, parallel.agents, parallel.concurrent), (RunMode::Parallel, 20, 5));

        let stress = parse(&["mednext", "--stress"]).plan().unwrap();
        assert_eq!((stress.mode, stress.agents, stress.concurrent), (RunMode::Stress, 50, 10));
    }

    #[test]
    fn test_overrides() {
        let cli = parse(&["lumina", "--parallel", "--agents=7", "--concurrent=3", "--seed=42"]);
        let plan = cli.plan().unwrap();
        assert_eq!((plan.agents, plan.concurrent), (7, 3));
        assert_eq!(cli.seed, Some(42));

        // serial ignores the ceiling
        let serial = parse(&["lumina", "--agents=4", "--concurrent=8"]).plan().unwrap();
        assert_eq!((serial.agents, serial.concurrent), (4, 1));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(parse(&["lumina", "--agents=0"]).plan().is_err());
        assert!(parse(&["lumina", "--parallel", "--concurrent=0"]).plan().is_err());
        assert!(parse(&["unknown"]).platform().is_err());
        assert!(Cli::try_parse_from(["beta-swarm", "lumina", "--parallel", "--stress"]).is_err());
        assert!(Cli::try_parse_from(["beta-swarm"]).is_err());
    }

    #[test]
    fn test_plan_to_orchestration() {
        let plan = parse(&["mednext", "--parallel", "--realistic"]).plan().unwrap();
        let config = plan.orchestration(RunConfig::new("mednext", "http://localhost:3001"));
        assert_eq!(config.agent_count, 20);
        assert_eq!(config.concurrency(), 5);
        assert!(config.realistic_personas);
    }

    #[test]
    fn test_verdict_bands() {
        assert_eq!(Verdict::from_success_rate(100.0), Verdict::Excellent);
        assert_eq!(Verdict::from_success_rate(80.0), Verdict::Good);
        assert_eq!(Verdict::from_success_rate(79.9), Verdict::Warning);
        assert_eq!(Verdict::from_success_rate(10.0), Verdict::Critical);
        assert!(Verdict::Good.passed());
        assert!(!Verdict::Warning.passed());
    }

    #[test]
    fn test_summary_mentions_headline_numbers() {
        let run = sample_run();
        let summary = render_summary(&run);
        assert!(summary.contains(&run.run_id));
        assert!(summary.contains("2 total, 1 completed, 1 failed"));
        assert!(summary.contains("critical 1"));
    }

    #[tokio::test]
    async fn test_report_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("run.json");
        let junit = dir.path().join("missing").join("junit.xml");
        let run = sample_run();

        let failed = write_reports(&run, Some(&json), Some(&junit)).await;

        assert_eq!(failed, 1);
        assert!(json.exists());
        assert!(!junit.exists());
        assert_eq!(write_reports(&run, None, None).await, 0);
    }
}
