//! Integration tests for line item consolidation and quality scoring
//!
//! Each test lays out a directory of extracted CSV files the way the
//! extraction step writes them (`{ticker}/{year}/{statement}.csv`) and runs
//! the consolidation pass over it.

use filing_finder::config::ConsolidationConfig;
use filing_finder::consolidate::{AuditKind, StatementType};
use filing_finder::output::{load_statistics, write_consolidated, write_quality};
use filing_finder::pipeline::{consolidate_directory, record_consolidation};
use filing_finder::storage::{RunKind, RunStatus, SqliteStorage, Storage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "line_item,value,currency,year,category,ticker,found_in_document,source_document,confidence";

fn write_csv(root: &Path, relative: &str, rows: &[&str]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    fs::write(path, content).unwrap();
}

#[test]
fn test_synonyms_merge_across_documents() {
    let dir = TempDir::new().unwrap();
    write_csv(
        dir.path(),
        "ADYEN/2024/income_statement.csv",
        &[
            "Revenue,\"1,995.8\",EUR,2024,revenue,ADYEN,True,annual-report-2024.pdf,0.9",
            "Net Revenue,1995.8,EUR,2024,revenue,ADYEN,True,annual-report-2024.xlsx,0.95",
        ],
    );

    let outcome = consolidate_directory(dir.path(), &ConsolidationConfig::default()).unwrap();
    assert_eq!(outcome.files_read, 1);
    assert_eq!(outcome.result.items.len(), 1);

    let revenue = &outcome.result.items[0];
    assert_eq!(revenue.canonical_term, "Revenue");
    assert_eq!(revenue.statement, StatementType::IncomeStatement);
    assert_eq!(revenue.merged_value, 1995.8);
    assert_eq!(revenue.provenance_count(), 2);
    assert!(!revenue.conflict_flag);
    assert_eq!(outcome.result.conflict_count(), 0);
}

#[test]
fn test_conflicting_values_are_flagged_and_audited() {
    let dir = TempDir::new().unwrap();
    write_csv(
        dir.path(),
        "ADYEN/2024/balance_sheet.csv",
        &[
            "Total Assets,100,EUR,2024,assets,ADYEN,True,annual-report-2024.xlsx,0.9",
            "\"Assets, Total\",150,EUR,2024,assets,ADYEN,True,annual-report-2024.pdf,0.7",
        ],
    );

    let outcome = consolidate_directory(dir.path(), &ConsolidationConfig::default()).unwrap();
    let items = &outcome.result.items;
    assert_eq!(items.len(), 1);

    // The higher-confidence source wins and the item carries the flag
    assert_eq!(items[0].canonical_term, "Total Assets");
    assert_eq!(items[0].merged_value, 100.0);
    assert!(items[0].conflict_flag);
    assert_eq!(items[0].provenance_count(), 1);

    assert_eq!(outcome.result.audit_count(AuditKind::Conflict), 1);
    let audit = outcome
        .result
        .audit
        .iter()
        .find(|a| a.kind == AuditKind::Conflict)
        .unwrap();
    assert_eq!(audit.value, Some(150.0));
    assert_eq!(audit.reference_value, Some(100.0));
    assert_eq!(audit.source_document, "annual-report-2024.pdf");

    let quality = &outcome.quality[0];
    assert_eq!(quality.conflict_count, 1);
}

#[test]
fn test_quality_rises_as_fields_are_supplied() {
    let partial = TempDir::new().unwrap();
    write_csv(
        partial.path(),
        "ASML/2023/income_statement.csv",
        &["Revenue,27558.5,EUR,2023,revenue,ASML,True,ar-2023.pdf,0.9"],
    );

    let fuller = TempDir::new().unwrap();
    write_csv(
        fuller.path(),
        "ASML/2023/income_statement.csv",
        &[
            "Revenue,27558.5,EUR,2023,revenue,ASML,True,ar-2023.pdf,0.9",
            "Cost of Sales,-13422.3,EUR,2023,cost_of_sales,ASML,True,ar-2023.pdf,0.9",
            "Gross Profit,14136.2,EUR,2023,gross_profit,ASML,True,ar-2023.pdf,0.9",
        ],
    );

    let config = ConsolidationConfig::default();
    let low = consolidate_directory(partial.path(), &config).unwrap();
    let high = consolidate_directory(fuller.path(), &config).unwrap();

    let low = &low.quality[0];
    let high = &high.quality[0];
    assert!(high.completeness_pct > low.completeness_pct);
    assert!(high.aggregate_score > low.aggregate_score);
    assert_eq!(high.identities_passed, 1);
    assert!(high.consistency_violations.is_empty());
}

#[test]
fn test_broken_identity_is_reported() {
    let dir = TempDir::new().unwrap();
    write_csv(
        dir.path(),
        "ASML/2023/balance_sheet.csv",
        &[
            "Total Assets,40000,EUR,2023,total_assets,ASML,True,ar-2023.pdf,0.9",
            "Total Liabilities,25000,EUR,2023,total_liabilities,ASML,True,ar-2023.pdf,0.9",
            "Total Equity,10000,EUR,2023,total_equity,ASML,True,ar-2023.pdf,0.9",
        ],
    );

    let outcome = consolidate_directory(dir.path(), &ConsolidationConfig::default()).unwrap();
    let quality = &outcome.quality[0];
    assert_eq!(quality.statement, StatementType::BalanceSheet);
    assert_eq!(quality.identities_total, 1);
    assert_eq!(quality.identities_passed, 0);
    assert_eq!(quality.violation_count(), 1);
    assert_eq!(quality.consistency_violations[0].expected, 35000.0);
    assert_eq!(quality.consistency_violations[0].actual, 40000.0);
}

#[test]
fn test_unreadable_file_makes_run_partial() {
    let dir = TempDir::new().unwrap();
    write_csv(
        dir.path(),
        "ADYEN/2024/income_statement.csv",
        &["Revenue,1995.8,EUR,2024,revenue,ADYEN,True,ar-2024.pdf,0.9"],
    );
    fs::create_dir_all(dir.path().join("ADYEN/2023")).unwrap();
    fs::write(dir.path().join("ADYEN/2023/balance_sheet.csv"), "value,currency\n1,EUR\n").unwrap();

    let outcome = consolidate_directory(dir.path(), &ConsolidationConfig::default()).unwrap();
    assert_eq!(outcome.files_read, 1);
    assert_eq!(outcome.files_failed.len(), 1);

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let run_id = record_consolidation(&mut storage, "hash", &outcome).unwrap();
    let run = storage.get_run(run_id).unwrap();
    assert_eq!(run.kind, RunKind::Consolidation);
    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(storage.count_items(run_id).unwrap(), 1);
}

#[test]
fn test_outputs_written_and_statistics_loaded() {
    let input = TempDir::new().unwrap();
    write_csv(
        input.path(),
        "ADYEN/2024/income_statement.csv",
        &[
            "Revenue,1995.8,EUR,2024,revenue,ADYEN,True,ar-2024.pdf,0.9",
            "Revenue,1995.8,EUR,2024,revenue,ADYEN,True,ar-2024.pdf,0.9",
            "Widget Royalties,12,EUR,2024,other,ADYEN,True,ar-2024.pdf,0.6",
        ],
    );

    let outcome = consolidate_directory(input.path(), &ConsolidationConfig::default()).unwrap();
    assert_eq!(outcome.result.audit_count(AuditKind::Duplicate), 1);
    assert_eq!(outcome.result.unmapped_count(), 1);
    assert_eq!(outcome.quality[0].duplicate_count, 1);

    let out = TempDir::new().unwrap();
    let items_path = out.path().join("out/consolidated_line_items.csv");
    let quality_path = out.path().join("out/quality_summary.csv");
    write_consolidated(&items_path, &outcome.result.items).unwrap();
    write_quality(&quality_path, &outcome.quality).unwrap();

    let mut reader = csv::Reader::from_path(&items_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "ticker");
    assert_eq!(reader.records().count(), 2);

    let quality_csv = fs::read_to_string(&quality_path).unwrap();
    assert!(quality_csv.starts_with("ticker,year,statement,completeness_pct"));
    assert!(quality_csv.contains("ADYEN,2024,income_statement"));

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    record_consolidation(&mut storage, "hash", &outcome).unwrap();
    let stats = load_statistics(&storage).unwrap();
    let consolidation = stats.consolidation.unwrap();
    assert_eq!(consolidation.items, 2);
}

#[test]
fn test_not_found_rows_reach_audit_and_outputs() {
    let dir = TempDir::new().unwrap();
    write_csv(
        dir.path(),
        "ADYEN/2024/income_statement.csv",
        &[
            "Revenue,100,EUR,2024,revenue,ADYEN,True,a.pdf,0.9",
            "Revenue,,EUR,2024,revenue,ADYEN,False,b.pdf,0.6",
            "Net Income,,EUR,2024,net_income,ADYEN,False,b.pdf,0.6",
        ],
    );

    let outcome = consolidate_directory(dir.path(), &ConsolidationConfig::default()).unwrap();
    assert_eq!(outcome.result.items.len(), 1);
    assert_eq!(outcome.result.items[0].found_in_document_count, 1);
    assert_eq!(outcome.result.audit_count(AuditKind::Missing), 2);
    assert_eq!(outcome.quality[0].missing_count, 2);

    let out = TempDir::new().unwrap();
    let items_path = out.path().join("consolidated_line_items.csv");
    write_consolidated(&items_path, &outcome.result.items).unwrap();

    let mut reader = csv::Reader::from_path(&items_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    let column = headers
        .iter()
        .position(|h| h == "found_in_document_count")
        .unwrap();
    let record = reader.records().next().unwrap().unwrap();
    assert_eq!(&record[column], "1");

    let mut storage = SqliteStorage::new_in_memory().unwrap();
    record_consolidation(&mut storage, "hash", &outcome).unwrap();
    let stats = load_statistics(&storage).unwrap();
    let consolidation = stats.consolidation.unwrap();
    assert_eq!(consolidation.audit_by_kind.get(&AuditKind::Missing), Some(&2));
}
