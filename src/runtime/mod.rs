// src/runtime/mod.rs
//! Agent execution runtime
//!
//! - **Executor**: retrying, classifying action runner owned by each agent
//! - **Flow**: declarative step lists and the context steps run in
//! - **Agent**: one synthetic user walking one flow
//! - **Scheduler**: serial or semaphore-bounded execution of a whole run
//! - **Aggregate**: pure reduction of agent results into a run result
//! - **Pacing / Random / Log**: injectable human delays, randomness and sinks
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    Orchestrator                      │
//! │   personas ──► AgentFactory ──► Agent × N            │
//! │                                   │                  │
//! │              Semaphore (max_concurrent)              │
//! │                                   │                  │
//! │   Agent: Flow ─► ActionExecutor ─► TargetService     │
//! │                       │                              │
//! │                 AgentMetrics ──► aggregate() ──► RunResult
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod aggregate;
pub mod executor;
pub mod flow;
pub mod log;
pub mod pacing;
pub mod random;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{Agent, AgentBuilder};
pub use aggregate::{aggregate, percentile, RunHeader};
pub use executor::ActionExecutor;
pub use flow::{Flow, FlowStep, GateOdds, Oracles, StepCondition, StepContext};
pub use log::{AgentLog, MemoryLog, TracingLog};
pub use pacing::PacingPolicy;
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use scheduler::{AgentFactory, AgentSpec, OrchestrationConfig, Orchestrator};
