//! CSV exports of consolidated items and quality reports

use crate::consolidate::ConsolidatedLineItem;
use crate::quality::QualityReport;
use crate::FinderError;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Serialize)]
struct ConsolidatedRow<'a> {
    ticker: &'a str,
    year: i32,
    statement: &'static str,
    category: &'a str,
    line_item: &'a str,
    value: f64,
    currency: &'a str,
    confidence: f64,
    provenance_count: usize,
    conflict_flag: bool,
    currency_mismatch: bool,
    unmapped: bool,
    duplicate_count: usize,
    found_in_document_count: usize,
    sources: String,
}

#[derive(Serialize)]
struct QualityRow<'a> {
    ticker: &'a str,
    year: i32,
    statement: &'static str,
    completeness_pct: String,
    consistency_violations: usize,
    identities_passed: usize,
    identities_total: usize,
    duplicate_count: usize,
    conflict_count: usize,
    unmapped_count: usize,
    missing_count: usize,
    aggregate_score: String,
}

fn create_file(path: &Path) -> Result<fs::File, FinderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::File::create(path)?)
}

/// Writes consolidated items as CSV, one row per item
///
/// `sources` lists the agreeing source documents separated by `;`.
pub fn write_consolidated_to<W: Write>(
    writer: W,
    items: &[ConsolidatedLineItem],
) -> Result<(), FinderError> {
    let mut csv = csv::Writer::from_writer(writer);
    for item in items {
        let sources = item
            .provenance
            .iter()
            .map(|p| p.source_document.as_str())
            .collect::<Vec<_>>()
            .join(";");

        csv.serialize(ConsolidatedRow {
            ticker: &item.ticker,
            year: item.year,
            statement: item.statement.to_db_string(),
            category: &item.category,
            line_item: &item.canonical_term,
            value: item.merged_value,
            currency: &item.currency,
            confidence: item.confidence,
            provenance_count: item.provenance_count(),
            conflict_flag: item.conflict_flag,
            currency_mismatch: item.currency_mismatch,
            unmapped: item.unmapped,
            duplicate_count: item.duplicate_count,
            found_in_document_count: item.found_in_document_count,
            sources,
        })?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_consolidated(path: &Path, items: &[ConsolidatedLineItem]) -> Result<(), FinderError> {
    write_consolidated_to(create_file(path)?, items)?;
    tracing::info!("Wrote {} consolidated items to {}", items.len(), path.display());
    Ok(())
}

/// Writes the quality summary as CSV
pub fn write_quality_to<W: Write>(writer: W, reports: &[QualityReport]) -> Result<(), FinderError> {
    let mut csv = csv::Writer::from_writer(writer);
    for report in reports {
        csv.serialize(QualityRow {
            ticker: &report.ticker,
            year: report.year,
            statement: report.statement.to_db_string(),
            completeness_pct: format!("{:.2}", report.completeness_pct),
            consistency_violations: report.violation_count(),
            identities_passed: report.identities_passed,
            identities_total: report.identities_total,
            duplicate_count: report.duplicate_count,
            conflict_count: report.conflict_count,
            unmapped_count: report.unmapped_count,
            missing_count: report.missing_count,
            aggregate_score: format!("{:.2}", report.aggregate_score),
        })?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_quality(path: &Path, reports: &[QualityReport]) -> Result<(), FinderError> {
    write_quality_to(create_file(path)?, reports)?;
    tracing::info!("Wrote {} quality reports to {}", reports.len(), path.display());
    Ok(())
}
