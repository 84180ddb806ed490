//! Database schema definitions
//!
//! Every row belongs to a run. Discovery runs fill `fetches` and `documents`;
//! consolidation runs fill `consolidated_items`, `audit_entries` and
//! `quality_reports`.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track runs of either pipeline half
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    mapping_version TEXT,
    status TEXT NOT NULL
);

-- Outcome of every frontier URL
CREATE TABLE IF NOT EXISTS fetches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    ticker TEXT NOT NULL,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    state TEXT NOT NULL,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_fetches_run ON fetches(run_id);
CREATE INDEX IF NOT EXISTS idx_fetches_state ON fetches(state);

-- Ranked registry entries
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    ticker TEXT NOT NULL,
    company_name TEXT NOT NULL,
    year INTEGER NOT NULL,
    tier TEXT NOT NULL,
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    score INTEGER NOT NULL,
    format TEXT NOT NULL,
    report_type TEXT NOT NULL,
    UNIQUE(run_id, ticker, year, tier, position)
);

CREATE INDEX IF NOT EXISTS idx_documents_run ON documents(run_id);

-- Merged line items
CREATE TABLE IF NOT EXISTS consolidated_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    ticker TEXT NOT NULL,
    year INTEGER NOT NULL,
    statement TEXT NOT NULL,
    category TEXT NOT NULL,
    canonical_term TEXT NOT NULL,
    merged_value REAL NOT NULL,
    currency TEXT NOT NULL,
    confidence REAL NOT NULL,
    provenance TEXT NOT NULL,
    provenance_count INTEGER NOT NULL,
    duplicate_count INTEGER NOT NULL,
    found_in_document_count INTEGER NOT NULL,
    conflict_flag INTEGER NOT NULL,
    currency_mismatch INTEGER NOT NULL,
    unmapped INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_run ON consolidated_items(run_id);
CREATE INDEX IF NOT EXISTS idx_items_bucket ON consolidated_items(ticker, year, statement);

-- Consolidation audit trail
CREATE TABLE IF NOT EXISTS audit_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    kind TEXT NOT NULL,
    ticker TEXT NOT NULL,
    year INTEGER NOT NULL,
    statement TEXT NOT NULL,
    category TEXT NOT NULL,
    canonical_term TEXT NOT NULL,
    source_document TEXT NOT NULL,
    original_term TEXT NOT NULL,
    value REAL,
    currency TEXT NOT NULL,
    reference_value REAL,
    detail TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_run ON audit_entries(run_id);
CREATE INDEX IF NOT EXISTS idx_audit_kind ON audit_entries(kind);

-- Quality scores per statement
CREATE TABLE IF NOT EXISTS quality_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    ticker TEXT NOT NULL,
    year INTEGER NOT NULL,
    statement TEXT NOT NULL,
    completeness_pct REAL NOT NULL,
    consistency_violations INTEGER NOT NULL,
    identities_passed INTEGER NOT NULL,
    identities_total INTEGER NOT NULL,
    duplicate_count INTEGER NOT NULL,
    conflict_count INTEGER NOT NULL,
    unmapped_count INTEGER NOT NULL,
    missing_count INTEGER NOT NULL,
    aggregate_score REAL NOT NULL,
    UNIQUE(run_id, ticker, year, statement)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
