//! Storage module for persisting run results
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Run tracking (config hash, mapping version, status)
//! - Fetch outcomes and the ranked registry of discovery runs
//! - Consolidated items, audit trail and quality reports

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::FinderError;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(FinderError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, FinderError> {
    SqliteStorage::new(path)
}

/// Represents a run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub kind: RunKind,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub mapping_version: Option<String>,
    pub status: RunStatus,
}

/// Which half of the pipeline a run executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Discovery,
    Consolidation,
}

impl RunKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Consolidation => "consolidation",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "discovery" => Some(Self::Discovery),
            "consolidation" => Some(Self::Consolidation),
            _ => None,
        }
    }
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished with partial results (budget exhausted)
    Partial,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
