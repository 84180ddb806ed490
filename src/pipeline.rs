//! The two halves of a run, stitched together
//!
//! Discovery: crawl reports are ranked into a [`Registry`] and recorded.
//! Consolidation: a directory of extracted line items is merged, scored and
//! recorded. Writing output files is left to the caller.

use crate::config::{ConsolidationConfig, RankingConfig};
use crate::consolidate::{load_line_items, ConsolidationResult, Consolidator, TermMap};
use crate::crawler::{CrawlReport, YearWindow};
use crate::quality::{self, QualityReport, ReferenceSchema};
use crate::ranker::{rank_company, Registry};
use crate::storage::{RunKind, RunStatus, Storage};
use crate::FinderError;
use std::path::{Path, PathBuf};

/// Ranks every company's candidates into a registry
///
/// Companies appear even when nothing was found for them.
pub fn build_registry(reports: &[CrawlReport], ranking: &RankingConfig, window: YearWindow) -> Registry {
    let mut registry = Registry::new(window);

    for report in reports {
        let buckets = rank_company(&report.ticker, &report.candidates, ranking);
        if buckets.is_empty() {
            tracing::warn!("{}: no annual report found", report.ticker);
        }
        registry.add_company(&report.ticker, &report.company_name, &buckets);
    }

    registry
}

/// Records a discovery run
///
/// The run is marked partial when any company crawl was cut short.
pub fn record_discovery(
    storage: &mut dyn Storage,
    config_hash: &str,
    reports: &[CrawlReport],
    registry: &Registry,
) -> Result<i64, FinderError> {
    let run_id = storage.create_run(RunKind::Discovery, config_hash, None)?;

    for report in reports {
        storage.record_crawl(run_id, report)?;
    }
    storage.record_registry(run_id, registry)?;

    let status = if reports.iter().any(|r| r.cancelled) {
        RunStatus::Partial
    } else {
        RunStatus::Completed
    };
    storage.update_run_status(run_id, status)?;

    tracing::info!("Recorded discovery run {} ({})", run_id, status.to_db_string());
    Ok(run_id)
}

/// Everything one consolidation pass produced
#[derive(Debug)]
pub struct ConsolidationOutcome {
    pub mapping_version: String,
    pub result: ConsolidationResult,
    pub quality: Vec<QualityReport>,
    pub files_read: usize,
    pub files_failed: Vec<(PathBuf, String)>,
}

/// Consolidates and scores every CSV file under `dir`
pub fn consolidate_directory(
    dir: &Path,
    config: &ConsolidationConfig,
) -> Result<ConsolidationOutcome, FinderError> {
    let terms = TermMap::embedded()?;
    let schema = ReferenceSchema::embedded(&terms)?;
    tracing::info!(
        "Loaded {} canonical terms (mapping version {})",
        terms.len(),
        &terms.version()[..12]
    );

    let loaded = load_line_items(dir)?;
    let result = Consolidator::new(&terms, config.relative_tolerance).consolidate(&loaded.items);
    let quality = quality::score(&result, &schema);

    Ok(ConsolidationOutcome {
        mapping_version: terms.version().to_string(),
        result,
        quality,
        files_read: loaded.files_read,
        files_failed: loaded.files_failed,
    })
}

/// Records a consolidation run with its mapping version
///
/// Unreadable input files make the run partial.
pub fn record_consolidation(
    storage: &mut dyn Storage,
    config_hash: &str,
    outcome: &ConsolidationOutcome,
) -> Result<i64, FinderError> {
    let run_id = storage.create_run(
        RunKind::Consolidation,
        config_hash,
        Some(&outcome.mapping_version),
    )?;

    storage.record_consolidation(run_id, &outcome.result)?;
    storage.record_quality(run_id, &outcome.quality)?;

    let status = if outcome.files_failed.is_empty() {
        RunStatus::Completed
    } else {
        RunStatus::Partial
    };
    storage.update_run_status(run_id, status)?;

    tracing::info!("Recorded consolidation run {} ({})", run_id, status.to_db_string());
    Ok(run_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentCandidate, DocumentFormat, ReportType, Scope};
    use crate::storage::SqliteStorage;
    use std::fs;
    use tempfile::TempDir;

    fn report(ticker: &str, candidates: Vec<DocumentCandidate>, cancelled: bool) -> CrawlReport {
        CrawlReport {
            ticker: ticker.to_string(),
            company_name: format!("{} N.V.", ticker),
            candidates,
            fetches: vec![],
            cancelled,
        }
    }

    fn candidate(url: &str, year: Option<i32>) -> DocumentCandidate {
        DocumentCandidate {
            url: url.to_string(),
            title: "Annual Report".to_string(),
            inferred_year: year,
            format: DocumentFormat::Pdf,
            report_type: ReportType::Annual,
            scope: Scope::Unknown,
            depth: 1,
            discovery_index: 0,
        }
    }

    #[test]
    fn test_build_registry_lists_every_company() {
        let reports = vec![
            report("ADYEN", vec![candidate("https://ir.example.com/ar-2024.pdf", Some(2024))], false),
            report("NONE", vec![candidate("https://ir.example.com/ar.pdf", None)], false),
        ];

        let registry = build_registry(&reports, &RankingConfig::default(), YearWindow::new(2015, 2025));
        assert_eq!(registry.discovery_info.total_companies, 2);
        assert_eq!(registry.company("ADYEN").unwrap().years_covered, vec![2024]);
        assert!(registry.company("NONE").unwrap().years_covered.is_empty());
    }

    #[test]
    fn test_cancelled_crawl_records_partial_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let reports = vec![report("ADYEN", vec![], true)];
        let registry = build_registry(&reports, &RankingConfig::default(), YearWindow::new(2015, 2025));

        let run_id = record_discovery(&mut storage, "hash", &reports, &registry).unwrap();
        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Partial);
        assert_eq!(run.kind, RunKind::Discovery);
    }

    #[test]
    fn test_consolidate_directory_records_mapping_version() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("ADYEN/2024")).unwrap();
        fs::write(
            dir.path().join("ADYEN/2024/income_statement.csv"),
            "line_item,value,currency,year,category,ticker,found_in_document\n\
             Revenue,1000,EUR,2024,revenue,ADYEN,True\n\
             Sales,1000,EUR,2024,revenue,ADYEN,True\n",
        )
        .unwrap();

        let outcome = consolidate_directory(dir.path(), &ConsolidationConfig::default()).unwrap();
        assert_eq!(outcome.files_read, 1);
        assert_eq!(outcome.result.items.len(), 1);
        assert_eq!(outcome.quality.len(), 1);

        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = record_consolidation(&mut storage, "hash", &outcome).unwrap();
        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.mapping_version.as_deref(), Some(outcome.mapping_version.as_str()));
        assert_eq!(run.status, RunStatus::Completed);
    }
}
