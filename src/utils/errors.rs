// src/utils/errors.rs
//! Error types for engine operations
//!
//! Failures of individual target-service calls are not engine errors: they
//! are classified and recorded by the action executor (see
//! [`crate::target::TargetError`]). `EngineError` covers what can stop the
//! engine itself from doing its job.

use thiserror::Error;

/// Error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Agent construction failed: {0}")]
    AgentConstruction(String),

    #[error("Storage error: {0}")]
    StorageFailed(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Observability setup failed: {0}")]
    Observability(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::StorageFailed(err.to_string())
    }
}

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, EngineError>;
