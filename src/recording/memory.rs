// src/recording/memory.rs
//! In-process run store

use crate::model::RunResult;
use crate::recording::storage::{RunRecord, RunStore, StoredRun};
use crate::utils::config::RunConfig;
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use dashmap::DashMap;

/// Keeps runs in a concurrent map; nothing survives the process
#[derive(Default)]
pub struct MemoryRunStore {
    runs: DashMap<String, StoredRun>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save_run(&self, result: &RunResult, config: &RunConfig) -> Result<()> {
        if self.runs.contains_key(&result.run_id) {
            return Err(EngineError::StorageFailed(format!(
                "Run {} already stored",
                result.run_id
            )));
        }
        let stored = StoredRun::from_result(result, config)?;
        self.runs.insert(result.run_id.clone(), stored);
        Ok(())
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<StoredRun>> {
        Ok(self.runs.get(run_id).map(|entry| entry.value().clone()))
    }

    async fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let mut runs: Vec<RunRecord> = self.runs.iter().map(|e| e.value().run.clone()).collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }
}
