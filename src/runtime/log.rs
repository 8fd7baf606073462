// src/runtime/log.rs
//! Per-agent logging sink
//!
//! Each agent owns its own sink instead of sharing a process-wide logger.
//! [`TracingLog`] forwards to `tracing` with the agent name attached;
//! [`MemoryLog`] captures lines for assertions in tests.

use parking_lot::Mutex;
use tracing::Level;

/// Logging interface handed to agents and their executors
pub trait AgentLog: Send + Sync {
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::DEBUG, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::INFO, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::WARN, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::ERROR, message);
    }
}

/// Sink that emits `tracing` events tagged with the agent name
pub struct TracingLog {
    agent: String,
    detailed: bool,
}

impl TracingLog {
    pub fn new(agent: impl Into<String>, detailed: bool) -> Self {
        Self {
            agent: agent.into(),
            detailed,
        }
    }
}

impl AgentLog for TracingLog {
    fn log(&self, level: Level, message: &str) {
        let agent = self.agent.as_str();
        match level {
            Level::ERROR => tracing::error!(agent, "{}", message),
            Level::WARN => tracing::warn!(agent, "{}", message),
            Level::INFO => tracing::info!(agent, "{}", message),
            // Debug output is opt-in per run
            _ if self.detailed => tracing::info!(agent, detail = true, "{}", message),
            _ => tracing::debug!(agent, "{}", message),
        }
    }
}

/// Sink that keeps every line in memory
#[derive(Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().clone()
    }

    /// Lines at `level` containing `needle`
    pub fn count(&self, level: Level, needle: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(l, m)| *l == level && m.contains(needle))
            .count()
    }
}

impl AgentLog for MemoryLog {
    fn log(&self, level: Level, message: &str) {
        self.entries.lock().push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_captures_levels() {
        let log = MemoryLog::new();
        log.info("Executing action: signup");
        log.warn("Action failed, retrying (1/3)");
        log.warn("Action failed, retrying (2/3)");

        assert_eq!(log.entries().len(), 3);
        assert_eq!(log.count(Level::WARN, "retrying"), 2);
        assert_eq!(log.count(Level::ERROR, "retrying"), 0);
    }
}
