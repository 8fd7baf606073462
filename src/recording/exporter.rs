// src/recording/exporter.rs
//! Export run results to various formats
//!
//! Supports:
//! - JSON (the full [`RunResult`] document)
//! - JUnit XML (one test case per agent, for CI dashboards)

use crate::model::{AgentStatus, RunResult};
use crate::utils::errors::{EngineError, Result};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// JSON format
    Json,

    /// JUnit XML format
    JUnit,
}

/// Exporter for run results
pub struct Exporter {
    format: ExportFormat,
}

impl Exporter {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    pub fn export(&self, run: &RunResult) -> Result<String> {
        debug!(
            "Exporting run {} ({} agents) to {:?} format",
            run.run_id,
            run.results.len(),
            self.format
        );

        match self.format {
            ExportFormat::Json => self.export_json(run),
            ExportFormat::JUnit => self.export_junit(run),
        }
    }

    /// Export and write to `path`
    pub async fn write_to(&self, run: &RunResult, path: &Path) -> Result<()> {
        let body = self.export(run)?;
        tokio::fs::write(path, body).await.map_err(|e| {
            EngineError::ExportFailed(format!("Failed to write {}: {}", path.display(), e))
        })?;
        info!("Exported run {} to {}", run.run_id, path.display());
        Ok(())
    }

    fn export_json(&self, run: &RunResult) -> Result<String> {
        serde_json::to_string_pretty(run)
            .map_err(|e| EngineError::ExportFailed(format!("JSON serialization error: {}", e)))
    }

    fn export_junit(&self, run: &RunResult) -> Result<String> {
        let mut xml = String::new();
        let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        let _ = writeln!(
            xml,
            r#"<testsuite name="{} {} run" tests="{}" failures="{}" errors="0" time="{:.3}" timestamp="{}">"#,
            escape(&run.platform),
            run.mode,
            run.total_agents,
            run.failed_agents,
            run.duration as f64 / 1000.0,
            run.started_at.to_rfc3339()
        );

        for agent in &run.results {
            let seconds = agent.metrics.duration.unwrap_or_default() as f64 / 1000.0;
            let _ = write!(
                xml,
                r#"  <testcase name="{}" classname="{}.{}" time="{:.3}""#,
                escape(&agent.agent_name),
                escape(&run.platform),
                agent.persona.persona_type,
                seconds
            );

            if agent.status == AgentStatus::Failed {
                let _ = writeln!(xml, ">");
                let _ = writeln!(
                    xml,
                    r#"    <failure message="{}" type="{}">"#,
                    escape(&agent.summary),
                    agent.status
                );
                for error in &agent.metrics.errors {
                    let _ = writeln!(
                        xml,
                        "[{}] {} {}: {}",
                        error.severity,
                        error.endpoint.as_deref().map(escape).unwrap_or_default(),
                        escape(&error.kind),
                        escape(&error.message)
                    );
                }
                let _ = writeln!(xml, "    </failure>");
                let _ = writeln!(xml, "  </testcase>");
            } else {
                let _ = writeln!(xml, " />");
            }
        }

        let _ = writeln!(xml, "</testsuite>");
        Ok(xml)
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
