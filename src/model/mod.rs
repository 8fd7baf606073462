// src/model/mod.rs
//! Metrics and record types
//!
//! Plain data shared by every other module. Nothing in here performs I/O.
//!
//! - **persona**: simulated user description
//! - **records**: per-attempt records (`Action`, `Decision`, `ErrorRecord`)
//! - **metrics**: per-agent and per-run aggregates

pub mod metrics;
pub mod persona;
pub mod records;

pub use metrics::{AgentMetrics, AgentResult, AgentStatus, RunMode, RunResult, SeverityBreakdown};
pub use persona::{
    Characteristics, DecisionPatterns, ErrorHandlingStyle, FeatureAdoption, Persona, PersonaType,
};
pub use records::{Action, Decision, ErrorRecord, Severity};
