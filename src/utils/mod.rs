// src/utils/mod.rs
//! Common utilities shared by every engine module
//!
//! - **errors**: crate-wide error type and `Result` alias
//! - **config**: engine tuning and per-platform run configuration

pub mod config;
pub mod errors;

pub use config::{EngineConfig, RunConfig};
pub use errors::{EngineError, Result};
