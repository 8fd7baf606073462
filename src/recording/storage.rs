// src/recording/storage.rs
//! Run persistence using SQLite
//!
//! One row per run, one per agent and one per recorded error. Rows are
//! written in a single transaction after the run has been aggregated.

use crate::model::{AgentResult, ErrorRecord, RunResult};
use crate::utils::config::RunConfig;
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Persisted summary of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub platform: String,
    pub mode: String,
    pub agent_count: usize,
    pub max_concurrent: usize,
    /// Run configuration snapshot, credentials excluded
    pub configuration: Value,
    pub completed_agents: usize,
    pub failed_agents: usize,
    pub total_duration: u64,
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub p95_response_time: u64,
    pub throughput: f64,
    pub error_count: usize,
    pub started_at: String,
    pub completed_at: String,
}

impl RunRecord {
    pub fn new(result: &RunResult, config: &RunConfig) -> Result<Self> {
        Ok(Self {
            run_id: result.run_id.clone(),
            platform: result.platform.clone(),
            mode: result.mode.as_str().to_string(),
            agent_count: result.total_agents,
            max_concurrent: config.max_concurrent,
            configuration: serde_json::to_value(config)?,
            completed_agents: result.completed_agents,
            failed_agents: result.failed_agents,
            total_duration: result.duration,
            success_rate: result.success_rate,
            avg_response_time: result.avg_response_time,
            p95_response_time: result.p95_response_time,
            throughput: result.throughput,
            error_count: result.error_count,
            started_at: result.started_at.to_rfc3339(),
            completed_at: result.completed_at.to_rfc3339(),
        })
    }
}

/// Persisted outcome of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub agent_name: String,
    pub persona_type: String,
    pub status: String,
    pub duration: u64,
    pub steps_completed: usize,
    pub steps_total: usize,
    pub success_rate: f64,
    pub summary: String,
    /// Full metrics document
    pub metrics: Value,
}

impl AgentRecord {
    pub fn new(result: &AgentResult) -> Result<Self> {
        Ok(Self {
            agent_name: result.agent_name.clone(),
            persona_type: result.persona.persona_type.as_str().to_string(),
            status: result.status.as_str().to_string(),
            duration: result.metrics.duration.unwrap_or_default(),
            steps_completed: result.metrics.steps_completed,
            steps_total: result.metrics.steps_total,
            success_rate: result.metrics.success_rate,
            summary: result.summary.clone(),
            metrics: serde_json::to_value(&result.metrics)?,
        })
    }
}

/// Persisted error, attributed to its agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRow {
    pub agent_name: String,
    pub error_type: String,
    pub severity: String,
    pub message: String,
    pub stack_trace: Option<String>,
    pub endpoint: Option<String>,
    pub status_code: Option<u16>,
    pub context: Value,
    pub timestamp: String,
}

impl ErrorRow {
    pub fn new(agent_name: &str, error: &ErrorRecord) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            error_type: error.kind.clone(),
            severity: error.severity.as_str().to_string(),
            message: error.message.clone(),
            stack_trace: error.stack_trace.clone(),
            endpoint: error.endpoint.clone(),
            status_code: error.status_code,
            context: Value::Object(error.context.clone()),
            timestamp: error.timestamp.to_rfc3339(),
        }
    }
}

/// A run as read back from storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub run: RunRecord,
    pub agents: Vec<AgentRecord>,
    /// Most recent first
    pub errors: Vec<ErrorRow>,
}

impl StoredRun {
    /// Flatten a computed run into its persisted shape
    pub fn from_result(result: &RunResult, config: &RunConfig) -> Result<Self> {
        let agents = result
            .results
            .iter()
            .map(AgentRecord::new)
            .collect::<Result<Vec<_>>>()?;

        let mut errors: Vec<ErrorRow> = result
            .results
            .iter()
            .flat_map(|r| r.metrics.errors.iter().map(move |e| ErrorRow::new(&r.agent_name, e)))
            .collect();
        errors.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(Self {
            run: RunRecord::new(result, config)?,
            agents,
            errors,
        })
    }
}

/// Destination for completed runs
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save_run(&self, result: &RunResult, config: &RunConfig) -> Result<()>;

    async fn load_run(&self, run_id: &str) -> Result<Option<StoredRun>>;

    /// Run summaries, most recent first
    async fn list_runs(&self) -> Result<Vec<RunRecord>>;
}

/// SQLite-backed run store
pub struct SqliteRunStore {
    path: PathBuf,
    db: Arc<Mutex<Connection>>,
}

impl SqliteRunStore {
    /// Open (or create) the database at `path`
    ///
    /// `sqlite://` and `file:` prefixes are accepted so a `DATABASE_URL` can
    /// be passed through unchanged.
    pub async fn open(location: &str) -> Result<Self> {
        let path = PathBuf::from(strip_scheme(location));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                EngineError::StorageFailed(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(&path).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to open database: {}", e))
        })?;

        let store = Self {
            path,
            db: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;

        info!("Run storage initialized at {:?}", store.path);
        Ok(store)
    }

    /// In-memory database, discarded on drop
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            EngineError::StorageFailed(format!("Failed to open database: {}", e))
        })?;
        let store = Self {
            path: PathBuf::from(":memory:"),
            db: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn init_schema(&self) -> Result<()> {
        let db = self.db.lock().await;

        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                run_id TEXT PRIMARY KEY,
                platform TEXT NOT NULL,
                mode TEXT NOT NULL,
                agent_count INTEGER NOT NULL,
                max_concurrent INTEGER NOT NULL,
                configuration TEXT NOT NULL,
                completed_agents INTEGER NOT NULL,
                failed_agents INTEGER NOT NULL,
                total_duration INTEGER NOT NULL,
                success_rate REAL NOT NULL,
                avg_response_time REAL NOT NULL,
                p95_response_time INTEGER NOT NULL,
                throughput REAL NOT NULL,
                error_count INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS agents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL REFERENCES runs(run_id),
                agent_name TEXT NOT NULL,
                persona_type TEXT NOT NULL,
                status TEXT NOT NULL,
                duration INTEGER NOT NULL,
                steps_completed INTEGER NOT NULL,
                steps_total INTEGER NOT NULL,
                success_rate REAL NOT NULL,
                summary TEXT NOT NULL,
                metrics TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS errors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL REFERENCES runs(run_id),
                agent_name TEXT NOT NULL,
                error_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                message TEXT NOT NULL,
                stack_trace TEXT,
                endpoint TEXT,
                status_code INTEGER,
                context TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_agents_run ON agents(run_id);
            CREATE INDEX IF NOT EXISTS idx_errors_run ON errors(run_id);
            CREATE INDEX IF NOT EXISTS idx_errors_severity ON errors(severity);
            "#,
        )
        .map_err(|e| EngineError::StorageFailed(format!("Schema creation failed: {}", e)))?;

        Ok(())
    }
}

fn strip_scheme(location: &str) -> &str {
    location
        .strip_prefix("sqlite://")
        .or_else(|| location.strip_prefix("sqlite:"))
        .or_else(|| location.strip_prefix("file:"))
        .unwrap_or(location)
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Value> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        run_id: row.get(0)?,
        platform: row.get(1)?,
        mode: row.get(2)?,
        agent_count: row.get::<_, i64>(3)? as usize,
        max_concurrent: row.get::<_, i64>(4)? as usize,
        configuration: json_column(row, 5)?,
        completed_agents: row.get::<_, i64>(6)? as usize,
        failed_agents: row.get::<_, i64>(7)? as usize,
        total_duration: row.get::<_, i64>(8)? as u64,
        success_rate: row.get(9)?,
        avg_response_time: row.get(10)?,
        p95_response_time: row.get::<_, i64>(11)? as u64,
        throughput: row.get(12)?,
        error_count: row.get::<_, i64>(13)? as usize,
        started_at: row.get(14)?,
        completed_at: row.get(15)?,
    })
}

const RUN_COLUMNS: &str = "run_id, platform, mode, agent_count, max_concurrent, configuration, \
     completed_agents, failed_agents, total_duration, success_rate, avg_response_time, \
     p95_response_time, throughput, error_count, started_at, completed_at";

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn save_run(&self, result: &RunResult, config: &RunConfig) -> Result<()> {
        let stored = StoredRun::from_result(result, config)?;
        let run = &stored.run;

        let mut db = self.db.lock().await;
        let tx = db.transaction().map_err(|e| {
            EngineError::StorageFailed(format!("Failed to begin transaction: {}", e))
        })?;

        tx.execute(
            &format!(
                "INSERT INTO runs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                RUN_COLUMNS
            ),
            params![
                run.run_id,
                run.platform,
                run.mode,
                run.agent_count as i64,
                run.max_concurrent as i64,
                run.configuration.to_string(),
                run.completed_agents as i64,
                run.failed_agents as i64,
                run.total_duration as i64,
                run.success_rate,
                run.avg_response_time,
                run.p95_response_time as i64,
                run.throughput,
                run.error_count as i64,
                run.started_at,
                run.completed_at,
            ],
        )
        .map_err(|e| EngineError::StorageFailed(format!("Failed to record run: {}", e)))?;

        for agent in &stored.agents {
            tx.execute(
                r#"
                INSERT INTO agents (run_id, agent_name, persona_type, status, duration,
                                    steps_completed, steps_total, success_rate, summary, metrics)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    run.run_id,
                    agent.agent_name,
                    agent.persona_type,
                    agent.status,
                    agent.duration as i64,
                    agent.steps_completed as i64,
                    agent.steps_total as i64,
                    agent.success_rate,
                    agent.summary,
                    agent.metrics.to_string(),
                ],
            )
            .map_err(|e| EngineError::StorageFailed(format!("Failed to record agent: {}", e)))?;
        }

        for error in &stored.errors {
            tx.execute(
                r#"
                INSERT INTO errors (run_id, agent_name, error_type, severity, message,
                                    stack_trace, endpoint, status_code, context, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    run.run_id,
                    error.agent_name,
                    error.error_type,
                    error.severity,
                    error.message,
                    error.stack_trace,
                    error.endpoint,
                    error.status_code,
                    error.context.to_string(),
                    error.timestamp,
                ],
            )
            .map_err(|e| EngineError::StorageFailed(format!("Failed to record error: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| EngineError::StorageFailed(format!("Commit failed: {}", e)))?;

        debug!(
            "Stored run {} ({} agents, {} errors)",
            run.run_id,
            stored.agents.len(),
            stored.errors.len()
        );
        Ok(())
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<StoredRun>> {
        let db = self.db.lock().await;

        let run = db
            .query_row(
                &format!("SELECT {} FROM runs WHERE run_id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()
            .map_err(|e| EngineError::StorageFailed(format!("Run lookup failed: {}", e)))?;

        let run = match run {
            Some(run) => run,
            None => return Ok(None),
        };

        let mut stmt = db
            .prepare(
                "SELECT agent_name, persona_type, status, duration, steps_completed, steps_total, \
                 success_rate, summary, metrics FROM agents WHERE run_id = ?1 ORDER BY id",
            )
            .map_err(|e| EngineError::StorageFailed(format!("Query preparation failed: {}", e)))?;
        let agents = stmt
            .query_map(params![run_id], |row| {
                Ok(AgentRecord {
                    agent_name: row.get(0)?,
                    persona_type: row.get(1)?,
                    status: row.get(2)?,
                    duration: row.get::<_, i64>(3)? as u64,
                    steps_completed: row.get::<_, i64>(4)? as usize,
                    steps_total: row.get::<_, i64>(5)? as usize,
                    success_rate: row.get(6)?,
                    summary: row.get(7)?,
                    metrics: json_column(row, 8)?,
                })
            })
            .map_err(|e| EngineError::StorageFailed(format!("Query execution failed: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EngineError::StorageFailed(format!("Result collection failed: {}", e)))?;

        let mut stmt = db
            .prepare(
                "SELECT agent_name, error_type, severity, message, stack_trace, endpoint, \
                 status_code, context, timestamp FROM errors WHERE run_id = ?1 \
                 ORDER BY timestamp DESC, id DESC",
            )
            .map_err(|e| EngineError::StorageFailed(format!("Query preparation failed: {}", e)))?;
        let errors = stmt
            .query_map(params![run_id], |row| {
                Ok(ErrorRow {
                    agent_name: row.get(0)?,
                    error_type: row.get(1)?,
                    severity: row.get(2)?,
                    message: row.get(3)?,
                    stack_trace: row.get(4)?,
                    endpoint: row.get(5)?,
                    status_code: row.get(6)?,
                    context: json_column(row, 7)?,
                    timestamp: row.get(8)?,
                })
            })
            .map_err(|e| EngineError::StorageFailed(format!("Query execution failed: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EngineError::StorageFailed(format!("Result collection failed: {}", e)))?;

        Ok(Some(StoredRun { run, agents, errors }))
    }

    async fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let db = self.db.lock().await;

        let mut stmt = db
            .prepare(&format!(
                "SELECT {} FROM runs ORDER BY started_at DESC",
                RUN_COLUMNS
            ))
            .map_err(|e| EngineError::StorageFailed(format!("Query preparation failed: {}", e)))?;

        let runs = stmt
            .query_map([], run_from_row)
            .map_err(|e| EngineError::StorageFailed(format!("Query execution failed: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EngineError::StorageFailed(format!("Result collection failed: {}", e)))?;

        Ok(runs)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_run;
    use super::*;
    use tempfile::tempdir;

    fn config() -> RunConfig {
        RunConfig::new("lumina", "http://localhost:3000")
            .with_max_concurrent(5)
            .with_api_key("secret-key")
    }

    #[tokio::test]
    async fn test_storage_creation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("runs.db");

        let store = SqliteRunStore::open(path.to_str().unwrap()).await;
        assert!(store.is_ok());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_save_and_load_run() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("runs.db").display());
        let store = SqliteRunStore::open(&url).await.unwrap();
        let run = sample_run();

        store.save_run(&run, &config()).await.unwrap();
        let stored = store.load_run(&run.run_id).await.unwrap().unwrap();

        assert_eq!(stored.run.platform, "lumina");
        assert_eq!(stored.run.mode, "parallel");
        assert_eq!(stored.run.max_concurrent, 5);
        assert_eq!(stored.run.failed_agents, 1);
        assert_eq!(stored.run.error_count, 2);
        assert!(stored.run.configuration.get("api_key").is_none());
        assert_eq!(stored.agents.len(), 2);
        assert_eq!(stored.agents[1].status, "FAILED");
        assert_eq!(stored.agents[1].persona_type, "INTERMEDIATE");
        assert_eq!(stored.errors.len(), 2);
        assert!(stored.errors.iter().any(|e| e.severity == "CRITICAL" && e.status_code == Some(503)));
    }

    #[tokio::test]
    async fn test_missing_run() {
        let store = SqliteRunStore::in_memory().await.unwrap();
        assert!(store.load_run("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_runs() {
        let store = SqliteRunStore::in_memory().await.unwrap();
        let mut first = sample_run();
        first.run_id = "run-a".to_string();
        let mut second = sample_run();
        second.run_id = "run-b".to_string();

        store.save_run(&first, &config()).await.unwrap();
        store.save_run(&second, &config()).await.unwrap();

        let runs = store.list_runs().await.unwrap();
        assert_eq!(runs.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_run_rejected() {
        let store = SqliteRunStore::in_memory().await.unwrap();
        let run = sample_run();

        store.save_run(&run, &config()).await.unwrap();
        let err = store.save_run(&run, &config()).await.unwrap_err();
        assert!(matches!(err, EngineError::StorageFailed(_)));
    }

    #[test]
    fn test_strip_scheme() {
        assert_eq!(strip_scheme("sqlite://data/runs.db"), "data/runs.db");
        assert_eq!(strip_scheme("file:runs.db"), "runs.db");
        assert_eq!(strip_scheme("/tmp/runs.db"), "/tmp/runs.db");
    }
}
