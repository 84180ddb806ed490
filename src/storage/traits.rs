//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::consolidate::{AuditKind, ConsolidationResult};
use crate::crawler::CrawlReport;
use crate::quality::QualityReport;
use crate::ranker::Registry;
use crate::state::FetchState;
use crate::storage::{RunKind, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Writes of one result (a crawl report, a registry, a consolidation) are
/// atomic: either every row lands or none does.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run
    ///
    /// # Arguments
    ///
    /// * `kind` - Which half of the pipeline the run executes
    /// * `config_hash` - Hash of the configuration file
    /// * `mapping_version` - Term dictionary fingerprint, for consolidation runs
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(
        &mut self,
        kind: RunKind,
        config_hash: &str,
        mapping_version: Option<&str>,
    ) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run of a kind, if any
    fn get_latest_run(&self, kind: RunKind) -> StorageResult<Option<RunRecord>>;

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed and stamps its finish time
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Discovery =====

    /// Records the fetch outcome of every URL in a company crawl
    fn record_crawl(&mut self, run_id: i64, report: &CrawlReport) -> StorageResult<()>;

    /// Records every best and secondary registry entry
    fn record_registry(&mut self, run_id: i64, registry: &Registry) -> StorageResult<()>;

    // ===== Consolidation =====

    /// Records consolidated items and the audit trail
    fn record_consolidation(
        &mut self,
        run_id: i64,
        result: &ConsolidationResult,
    ) -> StorageResult<()>;

    fn record_quality(&mut self, run_id: i64, reports: &[QualityReport]) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts fetches of a run by final state
    fn count_fetches_by_state(&self, run_id: i64) -> StorageResult<HashMap<FetchState, u64>>;

    fn count_companies(&self, run_id: i64) -> StorageResult<u64>;

    /// Counts registry entries of a run by tier ("best", "secondary")
    fn count_documents_by_tier(&self, run_id: i64) -> StorageResult<HashMap<String, u64>>;

    fn count_items(&self, run_id: i64) -> StorageResult<u64>;

    fn count_audit_by_kind(&self, run_id: i64) -> StorageResult<HashMap<AuditKind, u64>>;

    /// Mean aggregate quality score of a run; None if nothing was scored
    fn average_quality_score(&self, run_id: i64) -> StorageResult<Option<f64>>;
}
