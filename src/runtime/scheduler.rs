// src/runtime/scheduler.rs
//! Run orchestration
//!
//! Generates personas, builds one agent per persona and executes them either
//! one after another (serial) or as tokio tasks behind a semaphore that caps
//! how many flows run at once (parallel and stress).
//!
//! # Admission
//!
//! ```text
//! spawn all ──► [ queue ] ──permit──► running (≤ max_concurrent) ──► result
//!                   ▲                              │
//!                   └──────── permit released ─────┘
//! ```
//!
//! Results are collected in agent order. One agent's failure, or even a
//! panic inside its task, never aborts the run.

use crate::model::{AgentResult, AgentStatus, Persona, RunMode, RunResult};
use crate::persona::PersonaGenerator;
use crate::recording::RunStore;
use crate::runtime::agent::{aborted_result, Agent};
use crate::runtime::aggregate::{aggregate, RunHeader};
use crate::runtime::random::{RandomSource, SeededRandom};
use crate::utils::config::RunConfig;
use crate::utils::errors::{EngineError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use ulid::Ulid;

/// What to run and how wide
#[derive(Debug, Clone)]
pub struct OrchestrationConfig {
    pub mode: RunMode,

    /// Number of agents (and personas) in the run
    pub agent_count: usize,

    /// Draw persona types from the realistic mix instead of round-robin
    pub realistic_personas: bool,

    /// Settings shared by every agent; `max_concurrent` is the ceiling
    pub run: RunConfig,
}

impl OrchestrationConfig {
    /// Serial runs are pinned to a ceiling of 1
    pub fn new(mode: RunMode, agent_count: usize, mut run: RunConfig) -> Self {
        if mode == RunMode::Serial {
            run.max_concurrent = 1;
        }
        Self {
            mode,
            agent_count,
            realistic_personas: false,
            run,
        }
    }

    /// Mode defaults: serial 10 agents, parallel 20 by 5, stress 50 by 10
    pub fn for_mode(mode: RunMode, run: RunConfig) -> Self {
        let (agents, concurrent) = Self::defaults(mode);
        Self::new(mode, agents, run.with_max_concurrent(concurrent))
    }

    pub fn defaults(mode: RunMode) -> (usize, usize) {
        match mode {
            RunMode::Serial => (10, 1),
            RunMode::Parallel => (20, 5),
            RunMode::Stress => (50, 10),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        if self.mode != RunMode::Serial {
            self.run.max_concurrent = max_concurrent;
        }
        self
    }

    pub fn with_realistic_personas(mut self, realistic: bool) -> Self {
        self.realistic_personas = realistic;
        self
    }

    pub fn platform(&self) -> &str {
        &self.run.platform
    }

    pub fn concurrency(&self) -> usize {
        match self.mode {
            RunMode::Serial => 1,
            _ => self.run.max_concurrent,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.agent_count == 0 {
            return Err(EngineError::Validation(
                "agent_count must be at least 1".to_string(),
            ));
        }
        self.run.validate()
    }
}

/// Everything needed to build one agent
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Zero-based position in the run
    pub index: usize,
    pub name: String,
    pub persona: Persona,
    pub config: Arc<RunConfig>,
}

/// Builds the agents of a run
pub trait AgentFactory: Send + Sync {
    fn create(&self, spec: AgentSpec) -> Result<Agent>;
}

impl<F> AgentFactory for F
where
    F: Fn(AgentSpec) -> Result<Agent> + Send + Sync,
{
    fn create(&self, spec: AgentSpec) -> Result<Agent> {
        self(spec)
    }
}

enum Slot {
    Ready(AgentResult),
    Agent(Agent),
}

enum Pending {
    Ready(AgentResult),
    Running {
        name: String,
        persona: Persona,
        steps_total: usize,
        handle: JoinHandle<AgentResult>,
    },
}

/// Executes runs and optionally persists them
pub struct Orchestrator {
    store: Option<Arc<dyn RunStore>>,
    rng: Mutex<Box<dyn RandomSource>>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            store: None,
            rng: Mutex::new(Box::new(SeededRandom::from_entropy())),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Random source used for persona generation
    pub fn with_random(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn generate_personas(&self, config: &OrchestrationConfig) -> Vec<Persona> {
        let mut rng = self.rng.lock();
        if config.realistic_personas {
            PersonaGenerator::generate_realistic_batch(config.agent_count, &mut **rng)
        } else {
            PersonaGenerator::generate_batch(config.agent_count, &mut **rng)
        }
    }

    /// Run every agent and aggregate the outcome
    ///
    /// Only invalid configuration fails the run. Storage failures are
    /// logged and the computed result is still returned.
    pub async fn execute_run(
        &self,
        config: &OrchestrationConfig,
        factory: &dyn AgentFactory,
    ) -> Result<RunResult> {
        config.validate()?;

        let run_id = Ulid::new().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            "Starting {} run {} on {}: {} agents, {} concurrent",
            config.mode,
            run_id,
            config.platform(),
            config.agent_count,
            config.concurrency()
        );

        let shared = Arc::new(config.run.clone());
        let slots: Vec<Slot> = self
            .generate_personas(config)
            .into_iter()
            .enumerate()
            .map(|(index, persona)| {
                let name = format!("{}_agent_{}", config.platform(), index + 1);
                let spec = AgentSpec {
                    index,
                    name: name.clone(),
                    persona: persona.clone(),
                    config: shared.clone(),
                };
                match factory.create(spec) {
                    Ok(agent) => Slot::Agent(agent),
                    Err(e) => {
                        error!("Failed to construct {}: {}", name, e);
                        Slot::Ready(aborted_result(name, persona, 0, &e.to_string()))
                    }
                }
            })
            .collect();

        let results = match config.mode {
            RunMode::Serial => Self::run_serial(slots).await,
            RunMode::Parallel | RunMode::Stress => {
                Self::run_bounded(slots, config.concurrency()).await
            }
        };

        let result = aggregate(
            RunHeader {
                run_id,
                platform: config.platform().to_string(),
                mode: config.mode,
                total_agents: config.agent_count,
                started_at,
            },
            results,
            start.elapsed(),
        );

        info!(
            "Run {} finished: {}/{} agents completed ({:.1}%), {} errors, {}ms",
            result.run_id,
            result.completed_agents,
            result.total_agents,
            result.success_rate,
            result.error_count,
            result.duration
        );

        if let Some(store) = &self.store {
            match store.save_run(&result, &config.run).await {
                Ok(()) => debug!("Persisted run {}", result.run_id),
                Err(e) => error!("Failed to persist run {}: {}", result.run_id, e),
            }
        }

        Ok(result)
    }

    async fn run_serial(slots: Vec<Slot>) -> Vec<AgentResult> {
        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            let pending = Self::launch(slot, None);
            results.push(Self::collect(pending).await);
        }
        results
    }

    async fn run_bounded(slots: Vec<Slot>, max_concurrent: usize) -> Vec<AgentResult> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

        let pending: Vec<Pending> = slots
            .into_iter()
            .map(|slot| Self::launch(slot, Some(semaphore.clone())))
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        for p in pending {
            results.push(Self::collect(p).await);
        }
        results
    }

    fn launch(slot: Slot, semaphore: Option<Arc<Semaphore>>) -> Pending {
        let agent = match slot {
            Slot::Ready(result) => return Pending::Ready(result),
            Slot::Agent(agent) => agent,
        };

        let name = agent.name().to_string();
        let persona = agent.persona().clone();
        let steps_total = agent.steps_total();

        let task_name = name.clone();
        let task_persona = persona.clone();
        let handle = tokio::spawn(async move {
            let _permit = match semaphore {
                Some(sem) => match sem.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        return aborted_result(task_name, task_persona, steps_total, "scheduler closed")
                    }
                },
                None => None,
            };
            agent.run_flow().await
        });

        Pending::Running {
            name,
            persona,
            steps_total,
            handle,
        }
    }

    async fn collect(pending: Pending) -> AgentResult {
        match pending {
            Pending::Ready(result) => result,
            Pending::Running {
                name,
                persona,
                steps_total,
                handle,
            } => match handle.await {
                Ok(result) => {
                    match result.status {
                        AgentStatus::Completed => info!("{}: {}", result.agent_name, result.summary),
                        _ => warn!("{}: {}", result.agent_name, result.summary),
                    }
                    result
                }
                Err(e) => {
                    error!("Agent {} task aborted: {}", name, e);
                    aborted_result(name, persona, steps_total, &e.to_string())
                }
            },
        }
    }
}
