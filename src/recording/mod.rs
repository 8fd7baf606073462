// src/recording/mod.rs
//! Run persistence and export
//!
//! - **Storage**: [`RunStore`] with SQLite and in-memory implementations
//! - **Exporter**: JSON and JUnit XML reports of a finished run
//!
//! ```text
//! RunResult ──► RunStore::save_run ──► runs / agents / errors
//!     │
//!     └──────► Exporter ──► report.json, junit.xml
//! ```

pub mod exporter;
pub mod memory;
pub mod storage;

pub use exporter::{ExportFormat, Exporter};
pub use memory::MemoryRunStore;
pub use storage::{AgentRecord, ErrorRow, RunRecord, RunStore, SqliteRunStore, StoredRun};
