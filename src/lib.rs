// src/lib.rs
//! Beta Swarm Engine Library
//!
//! Persona-driven synthetic beta users that walk realistic flows against a
//! web platform and report reliability and performance.
//!
//! # Architecture
//!
//! - **model**: personas, per-attempt records, agent and run results
//! - **persona**: persona generation and population mixes
//! - **runtime**: action executor, flows, agents, scheduler, aggregation
//! - **target**: transport to the platform under test
//! - **oracle**: decision and content strategies with random fallback
//! - **platforms**: concrete flows (LUMINA, MedNext-Healthcare)
//! - **recording**: durable run storage and report export
//! - **observability**: tracing and metrics setup
//! - **cli**: argument parsing and run verdicts
//! - **utils**: configuration and errors

pub mod cli;
pub mod model;
pub mod observability;
pub mod oracle;
pub mod persona;
pub mod platforms;
pub mod recording;
pub mod runtime;
pub mod target;
pub mod utils;

// Re-export commonly used types
pub use model::{AgentResult, AgentStatus, Persona, PersonaType, RunMode, RunResult, Severity};
pub use platforms::Platform;
pub use runtime::{Agent, OrchestrationConfig, Orchestrator};
pub use utils::config::{EngineConfig, RunConfig};
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
