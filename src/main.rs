// src/main.rs
//! Beta Swarm
//!
//! Runs a swarm of persona-driven synthetic beta users against a platform,
//! stores the run and exits non-zero when the success rate is below 80%.

use anyhow::{Context, Result};
use beta_swarm_engine::cli::{render_summary, write_reports, Cli, Verdict};
use beta_swarm_engine::observability::{init_metrics, init_tracing, record_run};
use beta_swarm_engine::oracle::ClaudeOracle;
use beta_swarm_engine::recording::{RunStore, SqliteRunStore};
use beta_swarm_engine::runtime::random::{RandomSource, SeededRandom};
use beta_swarm_engine::runtime::{Agent, AgentSpec, Oracles, Orchestrator};
use beta_swarm_engine::target::HttpTarget;
use beta_swarm_engine::utils::config::{require_env, EngineConfig, RunConfig};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let detailed = std::env::var("ENABLE_DETAILED_LOGGING")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    if let Err(e) = init_tracing(detailed) {
        eprintln!("{}", e);
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Run failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Execute one run; `Ok(true)` when the run passed
async fn run(cli: Cli) -> Result<bool> {
    let platform = cli.platform()?;
    let plan = cli.plan()?;

    let api_key = require_env("ANTHROPIC_API_KEY")?;
    let engine = EngineConfig::load().context("loading engine configuration")?;
    let database_url = require_env("DATABASE_URL")
        .or_else(|e| engine.storage.database_url.clone().ok_or(e))?;

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    info!("Starting Beta Swarm v{}", beta_swarm_engine::VERSION);

    let run_config = RunConfig::from_env(platform.name(), &engine, plan.concurrent)?;
    info!(
        "Target {} at {} ({} mode, {} agents, {} concurrent)",
        platform.display_name(),
        run_config.base_url,
        plan.mode,
        plan.agents,
        plan.concurrent
    );
    let orchestration = plan.orchestration(run_config.clone());

    let store = SqliteRunStore::open(&database_url)
        .await
        .with_context(|| format!("opening run store at {}", database_url))?;
    let store: Arc<dyn RunStore> = Arc::new(store);

    let oracles = Oracles::shared(Arc::new(ClaudeOracle::new(api_key, engine.oracle.clone())?));
    let flow = Arc::new(platform.flow());
    let seed = cli.seed;

    let factory = move |spec: AgentSpec| -> beta_swarm_engine::Result<Agent> {
        let target = HttpTarget::new(&spec.config)?;
        let rng: Box<dyn RandomSource> = match seed {
            Some(seed) => Box::new(SeededRandom::seeded(seed.wrapping_add(spec.index as u64 + 1))),
            None => Box::new(SeededRandom::from_entropy()),
        };
        Ok(Agent::builder(spec.name, spec.persona, spec.config, flow.clone(), Arc::new(target))
            .oracles(oracles.clone())
            .random(rng)
            .build())
    };

    let mut orchestrator = Orchestrator::new().with_store(store);
    if let Some(seed) = seed {
        orchestrator = orchestrator.with_random(Box::new(SeededRandom::seeded(seed)));
    }

    let result = orchestrator.execute_run(&orchestration, &factory).await?;
    record_run(&result);

    info!("\n{}", render_summary(&result));

    let failed_reports = write_reports(&result, cli.export.as_deref(), cli.junit.as_deref()).await;
    if failed_reports > 0 {
        warn!("{} report(s) could not be written", failed_reports);
    }

    if let Some(handle) = metrics {
        tracing::debug!("Metrics:\n{}", handle.render());
    }

    Ok(Verdict::from_success_rate(result.success_rate).passed())
}
