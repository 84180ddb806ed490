//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::consolidate::{AuditKind, ConsolidationResult};
use crate::crawler::CrawlReport;
use crate::quality::QualityReport;
use crate::ranker::Registry;
use crate::state::FetchState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunKind, RunRecord, RunStatus};
use crate::FinderError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const RUN_COLUMNS: &str =
    "id, kind, started_at, finished_at, config_hash, mapping_version, status";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(FinderError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, FinderError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, FinderError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        kind: RunKind::from_db_string(&row.get::<_, String>(1)?).unwrap_or(RunKind::Discovery),
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        mapping_version: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?).unwrap_or(RunStatus::Running),
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        kind: RunKind,
        config_hash: &str,
        mapping_version: Option<&str>,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (kind, started_at, config_hash, mapping_version, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                kind.to_db_string(),
                now,
                config_hash,
                mapping_version,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self, kind: RunKind) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM runs WHERE kind = ?1 ORDER BY id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                params![kind.to_db_string()],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let finished = (status != RunStatus::Running).then_some(now);
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = COALESCE(?2, finished_at) WHERE id = ?3",
            params![status.to_db_string(), finished, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        self.update_run_status(run_id, RunStatus::Completed)
    }

    // ===== Discovery =====

    fn record_crawl(&mut self, run_id: i64, report: &CrawlReport) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO fetches (run_id, ticker, url, depth, state, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for fetch in &report.fetches {
                stmt.execute(params![
                    run_id,
                    report.ticker,
                    fetch.url,
                    fetch.depth,
                    fetch.state.to_db_string(),
                    fetch.error
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn record_registry(&mut self, run_id: i64, registry: &Registry) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents
                 (run_id, ticker, company_name, year, tier, position, url, title, score, format, report_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for company in registry.companies.values() {
                for year in &company.reports {
                    for (tier, entries) in [("best", &year.best), ("secondary", &year.secondary)] {
                        for (position, entry) in entries.iter().enumerate() {
                            stmt.execute(params![
                                run_id,
                                company.ticker,
                                company.company_name,
                                year.year,
                                tier,
                                position as i64,
                                entry.url,
                                entry.title,
                                entry.score,
                                entry.format.to_db_string(),
                                entry.report_type.to_db_string()
                            ])?;
                        }
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Consolidation =====

    fn record_consolidation(
        &mut self,
        run_id: i64,
        result: &ConsolidationResult,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut items = tx.prepare(
                "INSERT INTO consolidated_items
                 (run_id, ticker, year, statement, category, canonical_term, merged_value, currency,
                  confidence, provenance, provenance_count, duplicate_count,
                  found_in_document_count, conflict_flag, currency_mismatch, unmapped)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            )?;
            for item in &result.items {
                let provenance = serde_json::to_string(&item.provenance)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                items.execute(params![
                    run_id,
                    item.ticker,
                    item.year,
                    item.statement.to_db_string(),
                    item.category,
                    item.canonical_term,
                    item.merged_value,
                    item.currency,
                    item.confidence,
                    provenance,
                    item.provenance_count() as i64,
                    item.duplicate_count as i64,
                    item.found_in_document_count as i64,
                    item.conflict_flag,
                    item.currency_mismatch,
                    item.unmapped
                ])?;
            }

            let mut audit = tx.prepare(
                "INSERT INTO audit_entries
                 (run_id, kind, ticker, year, statement, category, canonical_term, source_document,
                  original_term, value, currency, reference_value, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for entry in &result.audit {
                audit.execute(params![
                    run_id,
                    entry.kind.to_db_string(),
                    entry.ticker,
                    entry.year,
                    entry.statement.to_db_string(),
                    entry.category,
                    entry.canonical_term,
                    entry.source_document,
                    entry.original_term,
                    entry.value,
                    entry.currency,
                    entry.reference_value,
                    entry.detail
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn record_quality(&mut self, run_id: i64, reports: &[QualityReport]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO quality_reports
                 (run_id, ticker, year, statement, completeness_pct, consistency_violations,
                  identities_passed, identities_total, duplicate_count, conflict_count,
                  unmapped_count, missing_count, aggregate_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for report in reports {
                stmt.execute(params![
                    run_id,
                    report.ticker,
                    report.year,
                    report.statement.to_db_string(),
                    report.completeness_pct,
                    report.violation_count() as i64,
                    report.identities_passed as i64,
                    report.identities_total as i64,
                    report.duplicate_count as i64,
                    report.conflict_count as i64,
                    report.unmapped_count as i64,
                    report.missing_count as i64,
                    report.aggregate_score
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_fetches_by_state(&self, run_id: i64) -> StorageResult<HashMap<FetchState, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM fetches WHERE run_id = ?1 GROUP BY state")?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (state_str, count) = row?;
            if let Some(state) = FetchState::from_db_string(&state_str) {
                counts.insert(state, count as u64);
            }
        }
        Ok(counts)
    }

    fn count_companies(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT ticker) FROM fetches WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_documents_by_tier(&self, run_id: i64) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tier, COUNT(*) FROM documents WHERE run_id = ?1 GROUP BY tier")?;

        let counts = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }

    fn count_items(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM consolidated_items WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_audit_by_kind(&self, run_id: i64) -> StorageResult<HashMap<AuditKind, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM audit_entries WHERE run_id = ?1 GROUP BY kind")?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (kind_str, count) = row?;
            if let Some(kind) = AuditKind::from_db_string(&kind_str) {
                counts.insert(kind, count as u64);
            }
        }
        Ok(counts)
    }

    fn average_quality_score(&self, run_id: i64) -> StorageResult<Option<f64>> {
        let average: Option<f64> = self.conn.query_row(
            "SELECT AVG(aggregate_score) FROM quality_reports WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(average)
    }
}
