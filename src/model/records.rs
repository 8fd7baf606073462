// src/model/records.rs
//! Per-attempt records appended to an agent's metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Operational urgency of a recorded error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Rate limited, expected and recoverable
    Low,
    /// Bad request / not found, likely a flow or data bug
    Medium,
    /// Authentication or authorization failure
    High,
    /// Server-side fault in the target service
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Classify by status code. Pure function of the code alone.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(code) if code >= 500 => Severity::Critical,
            Some(401) | Some(403) => Severity::High,
            Some(400) | Some(404) => Severity::Medium,
            Some(429) => Severity::Low,
            _ => Severity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind used when the target service does not name the error
pub const UNKNOWN_ERROR_KIND: &str = "UNKNOWN";

/// A classified failure of one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Error kind reported by the target service, or `UNKNOWN`
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub context: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

/// One recorded step outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    pub timestamp: DateTime<Utc>,
    /// Elapsed milliseconds from the first attempt, backoff waits included
    pub duration: u64,
    pub success: bool,
    /// Always carries `attempts`
    pub details: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl Action {
    /// Number of attempts made for this action
    pub fn attempts(&self) -> u32 {
        self.details
            .get("attempts")
            .and_then(Value::as_u64)
            .unwrap_or(1) as u32
    }
}

/// A choice among options made by a flow step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub context: String,
    pub options: Vec<String>,
    pub chosen: String,
    pub reasoning: String,
    /// In `[0, 1]`
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// Made by the random fallback rather than the oracle
    #[serde(default)]
    pub fallback: bool,
}
