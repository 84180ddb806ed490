//! Merging raw line items into consolidated items
//!
//! Items are bucketed by (ticker, year, statement, category) and, inside a
//! bucket, by canonical term. Each term group is merged independently:
//!
//! Rows without a usable value never reach a group; each one is audited as
//! missing instead.
//!
//! 1. exact duplicate rows collapse (audited, confidence unchanged)
//! 2. mixed currencies stop the merge; every row is kept and flagged
//! 3. the highest-confidence row is the reference; rows within tolerance
//!    join its provenance, the rest are audited as conflicts

use crate::consolidate::model::{
    AuditEntry, AuditKind, ConsolidatedLineItem, Provenance, RawLineItem, StatementType,
};
use crate::consolidate::terms::{ResolvedTerm, TermMap};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Key of a consolidation bucket
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub ticker: String,
    pub year: i32,
    pub statement: StatementType,
    pub category: String,
}

/// Output of a consolidation pass
#[derive(Debug, Clone, Default)]
pub struct ConsolidationResult {
    /// Items ordered by bucket, then term key
    pub items: Vec<ConsolidatedLineItem>,
    pub audit: Vec<AuditEntry>,
}

impl ConsolidationResult {
    pub fn conflict_count(&self) -> usize {
        self.items.iter().filter(|i| i.conflict_flag).count()
    }

    pub fn unmapped_count(&self) -> usize {
        self.items.iter().filter(|i| i.unmapped).count()
    }

    pub fn audit_count(&self, kind: AuditKind) -> usize {
        self.audit.iter().filter(|a| a.kind == kind).count()
    }
}

/// Returns true if `a` and `b` differ by at most `tolerance` relative to the larger magnitude
pub fn within_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance * a.abs().max(b.abs())
}

/// One distinct row with the number of exact duplicates collapsed into it
struct UniqueRow<'a> {
    item: &'a RawLineItem,
    value: f64,
    duplicates: usize,

    /// Rows, this one included, marked as found in their document
    found: usize,
}

struct TermGroup<'a> {
    resolved: ResolvedTerm,
    rows: Vec<&'a RawLineItem>,
}

/// Consolidates raw line items against a term dictionary
#[derive(Debug, Clone)]
pub struct Consolidator<'a> {
    terms: &'a TermMap,
    tolerance: f64,
}

impl<'a> Consolidator<'a> {
    pub fn new(terms: &'a TermMap, tolerance: f64) -> Self {
        Self { terms, tolerance }
    }

    /// Merges all items; the result does not depend on input order
    pub fn consolidate(&self, items: &[RawLineItem]) -> ConsolidationResult {
        let mut groups: BTreeMap<(BucketKey, String), TermGroup<'_>> = BTreeMap::new();
        let mut missing = Vec::new();

        for item in items {
            let resolved = self.terms.resolve(&item.term);
            let statement = item
                .statement
                .or(resolved.statement)
                .unwrap_or(StatementType::Unclassified);
            let key = BucketKey {
                ticker: item.ticker.clone(),
                year: item.year,
                statement,
                category: item.category.trim().to_lowercase(),
            };

            if !item.value.is_some_and(f64::is_finite) {
                let detail = if item.found_in_document {
                    "no usable value extracted"
                } else {
                    "not found in document"
                };
                let mut entry =
                    audit_entry(AuditKind::Missing, &key, &resolved, item, None, detail.to_string());
                entry.value = None;
                missing.push((key, resolved.key, entry));
                continue;
            }

            groups
                .entry((key, resolved.key.clone()))
                .or_insert_with(|| TermGroup {
                    resolved,
                    rows: Vec::new(),
                })
                .rows
                .push(item);
        }

        let mut result = ConsolidationResult::default();
        for ((bucket, _), group) in groups {
            self.merge_group(&bucket, group, &mut result);
        }

        let skipped = missing.len();
        missing.sort_by(|a, b| {
            (&a.0, &a.1, &a.2.source_document, &a.2.original_term)
                .cmp(&(&b.0, &b.1, &b.2.source_document, &b.2.original_term))
        });
        result.audit.extend(missing.into_iter().map(|(_, _, entry)| entry));

        tracing::info!(
            "Consolidated {} line items into {} ({} conflicts, {} unmapped, {} duplicates, {} missing)",
            items.len() - skipped,
            result.items.len(),
            result.conflict_count(),
            result.unmapped_count(),
            result.audit_count(AuditKind::Duplicate),
            skipped
        );

        result
    }

    fn merge_group(&self, bucket: &BucketKey, group: TermGroup<'_>, result: &mut ConsolidationResult) {
        let TermGroup { resolved, mut rows } = group;
        rows.sort_by(|a, b| source_order(a, b));

        let audit = |kind: AuditKind, row: &RawLineItem, reference: Option<f64>, detail: String| {
            audit_entry(kind, bucket, &resolved, row, reference, detail)
        };

        let mut unique: Vec<UniqueRow<'_>> = Vec::new();
        // Every row here shares the canonical term, year and bucket
        for row in rows {
            let value = row.value.unwrap_or_default();
            let duplicate_of = unique.iter_mut().find(|u| {
                u.item.source_document == row.source_document
                    && u.value.to_bits() == value.to_bits()
                    && u.item.currency.trim().eq_ignore_ascii_case(row.currency.trim())
            });

            match duplicate_of {
                Some(existing) => {
                    existing.duplicates += 1;
                    existing.found += usize::from(row.found_in_document);
                    result.audit.push(audit(
                        AuditKind::Duplicate,
                        row,
                        Some(existing.value),
                        "exact duplicate row collapsed".to_string(),
                    ));
                }
                None => unique.push(UniqueRow {
                    item: row,
                    value,
                    duplicates: 0,
                    found: usize::from(row.found_in_document),
                }),
            }
        }

        let Some(reference) = unique.first() else {
            return;
        };

        let new_item = |row: &UniqueRow<'_>| ConsolidatedLineItem {
            ticker: bucket.ticker.clone(),
            year: bucket.year,
            statement: bucket.statement,
            category: bucket.category.clone(),
            canonical_term: resolved.name.clone(),
            term_key: resolved.key.clone(),
            merged_value: row.value,
            currency: row.item.currency.trim().to_uppercase(),
            confidence: row.item.confidence,
            provenance: vec![provenance(row)],
            duplicate_count: row.duplicates,
            found_in_document_count: row.found,
            conflict_flag: false,
            currency_mismatch: false,
            unmapped: !resolved.is_mapped(),
        };

        let mut emitted = Vec::new();
        let currencies: BTreeSet<String> = unique
            .iter()
            .map(|u| u.item.currency.trim().to_uppercase())
            .collect();

        if currencies.len() > 1 {
            let listed = currencies.into_iter().collect::<Vec<_>>().join(", ");
            tracing::warn!(
                "{} {} {}: currencies differ ({}), not merging",
                bucket.ticker,
                bucket.year,
                resolved.name,
                listed
            );

            for row in &unique {
                let mut item = new_item(row);
                item.currency_mismatch = true;
                result.audit.push(audit(
                    AuditKind::CurrencyMismatch,
                    row.item,
                    None,
                    format!("sources report {}", listed),
                ));
                emitted.push(item);
            }
        } else {
            let mut item = new_item(reference);
            for row in &unique[1..] {
                item.duplicate_count += row.duplicates;

                if within_tolerance(reference.value, row.value, self.tolerance) {
                    item.provenance.push(provenance(row));
                    item.found_in_document_count += row.found;
                    continue;
                }

                item.conflict_flag = true;
                let deviation = if reference.value != 0.0 {
                    (row.value - reference.value) / reference.value.abs() * 100.0
                } else {
                    f64::INFINITY
                };
                tracing::debug!(
                    "{} {} {}: {} reports {} against {} from {}",
                    bucket.ticker,
                    bucket.year,
                    resolved.name,
                    row.item.source_document,
                    row.value,
                    reference.value,
                    reference.item.source_document
                );
                result.audit.push(audit(
                    AuditKind::Conflict,
                    row.item,
                    Some(reference.value),
                    format!(
                        "differs from {} in {} by {:.2}%",
                        reference.value, reference.item.source_document, deviation
                    ),
                ));
            }
            emitted.push(item);
        }

        if !resolved.is_mapped() {
            for item in &emitted {
                result.audit.push(audit(
                    AuditKind::Unmapped,
                    reference.item,
                    Some(item.merged_value),
                    format!("no canonical term for '{}'", item.canonical_term),
                ));
            }
        }

        result.items.extend(emitted);
    }
}

fn audit_entry(
    kind: AuditKind,
    bucket: &BucketKey,
    resolved: &ResolvedTerm,
    row: &RawLineItem,
    reference: Option<f64>,
    detail: String,
) -> AuditEntry {
    AuditEntry {
        kind,
        ticker: bucket.ticker.clone(),
        year: bucket.year,
        statement: bucket.statement,
        category: bucket.category.clone(),
        canonical_term: resolved.name.clone(),
        source_document: row.source_document.clone(),
        original_term: row.term.clone(),
        value: row.value,
        currency: row.currency.clone(),
        reference_value: reference,
        detail,
    }
}

fn provenance(row: &UniqueRow<'_>) -> Provenance {
    Provenance {
        source_document: row.item.source_document.clone(),
        original_term: row.item.term.clone(),
        value: row.value,
        confidence: row.item.confidence,
        source_rank: row.item.source_rank,
    }
}

/// Reference order for rows of one term: highest confidence, then better
/// source rank, then source name; the rest only makes the order total
fn source_order(a: &RawLineItem, b: &RawLineItem) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.source_rank.cmp(&b.source_rank))
        .then_with(|| a.source_document.cmp(&b.source_document))
        .then_with(|| a.term.cmp(&b.term))
        .then_with(|| {
            a.value
                .unwrap_or_default()
                .total_cmp(&b.value.unwrap_or_default())
        })
        .then_with(|| a.currency.cmp(&b.currency))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(term: &str, value: f64, source: &str, confidence: f64) -> RawLineItem {
        RawLineItem {
            term: term.to_string(),
            value: Some(value),
            currency: "EUR".to_string(),
            year: 2024,
            category: "revenue".to_string(),
            ticker: "ADYEN".to_string(),
            found_in_document: true,
            statement: Some(StatementType::IncomeStatement),
            source_document: source.to_string(),
            confidence,
            source_rank: 0,
        }
    }

    fn consolidate(items: &[RawLineItem]) -> ConsolidationResult {
        let terms = TermMap::embedded().unwrap();
        Consolidator::new(&terms, 0.005).consolidate(items)
    }

    #[test]
    fn test_within_tolerance() {
        assert!(within_tolerance(1000.0, 1004.0, 0.005));
        assert!(!within_tolerance(1000.0, 1006.0, 0.005));
        assert!(within_tolerance(0.0, 0.0, 0.005));
        assert!(within_tolerance(-200.0, -200.5, 0.005));
    }

    #[test]
    fn test_synonyms_merge_without_conflict() {
        let result = consolidate(&[
            raw("Revenue", 100.0, "ar_2024.xlsx", 0.9),
            raw("Sales", 100.0, "ar_2024.pdf", 0.6),
        ]);

        assert_eq!(result.items.len(), 1);
        let item = &result.items[0];
        assert_eq!(item.canonical_term, "Revenue");
        assert_eq!(item.merged_value, 100.0);
        assert_eq!(item.provenance_count(), 2);
        assert!(!item.conflict_flag);
        assert!(result.audit.is_empty());
    }

    #[test]
    fn test_conflict_keeps_higher_confidence() {
        let result = consolidate(&[
            raw("Revenue", 150.0, "ar_2024.pdf", 0.6),
            raw("Revenue", 100.0, "ar_2024.xlsx", 0.9),
        ]);

        assert_eq!(result.items.len(), 1);
        let item = &result.items[0];
        assert_eq!(item.merged_value, 100.0);
        assert!(item.conflict_flag);
        assert_eq!(item.provenance_count(), 1);
        assert_eq!(item.confidence, 0.9);

        let conflicts: Vec<_> = result
            .audit
            .iter()
            .filter(|a| a.kind == AuditKind::Conflict)
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].value, Some(150.0));
        assert_eq!(conflicts[0].reference_value, Some(100.0));
        assert_eq!(conflicts[0].source_document, "ar_2024.pdf");
    }

    #[test]
    fn test_confidence_tie_uses_source_rank() {
        let mut better = raw("Revenue", 100.0, "z_doc.pdf", 0.6);
        better.source_rank = 0;
        let mut worse = raw("Revenue", 150.0, "a_doc.pdf", 0.6);
        worse.source_rank = 1;

        let result = consolidate(&[worse, better]);
        assert_eq!(result.items[0].merged_value, 100.0);
    }

    #[test]
    fn test_exact_duplicates_collapse() {
        let row = raw("Revenue", 100.0, "ar_2024.pdf", 0.6);
        let result = consolidate(&[row.clone(), row.clone(), row]);

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].duplicate_count, 2);
        assert_eq!(result.items[0].provenance_count(), 1);
        assert_eq!(result.items[0].confidence, 0.6);
        assert_eq!(result.audit_count(AuditKind::Duplicate), 2);
    }

    #[test]
    fn test_currency_mismatch_not_merged() {
        let mut usd = raw("Revenue", 110.0, "20f_2024.pdf", 0.9);
        usd.currency = "USD".to_string();
        let result = consolidate(&[raw("Revenue", 100.0, "ar_2024.pdf", 0.6), usd]);

        assert_eq!(result.items.len(), 2);
        assert!(result.items.iter().all(|i| i.currency_mismatch));
        assert!(result.items.iter().all(|i| !i.conflict_flag));
        assert_eq!(result.audit_count(AuditKind::CurrencyMismatch), 2);
    }

    #[test]
    fn test_missing_values_skipped() {
        let mut missing = raw("Revenue", 0.0, "ar_2024.pdf", 0.6);
        missing.value = None;
        missing.found_in_document = false;

        let result = consolidate(&[missing, raw("Sales", 90.0, "ar_2024.xlsx", 0.9)]);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].merged_value, 90.0);
        assert_eq!(result.items[0].provenance_count(), 1);
    }

    #[test]
    fn test_not_found_rows_are_audited() {
        let mut revenue = raw("Revenue", 0.0, "b.pdf", 0.6);
        revenue.value = None;
        revenue.found_in_document = false;
        let mut goodwill = raw("Goodwill", 0.0, "b.pdf", 0.6);
        goodwill.value = None;
        goodwill.found_in_document = false;
        goodwill.statement = Some(StatementType::BalanceSheet);

        let result = consolidate(&[raw("Revenue", 100.0, "a.pdf", 0.9), revenue, goodwill]);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.audit_count(AuditKind::Missing), 2);

        let missing: Vec<_> = result
            .audit
            .iter()
            .filter(|a| a.kind == AuditKind::Missing)
            .collect();
        assert!(missing.iter().all(|a| a.value.is_none()));
        assert!(missing.iter().all(|a| a.source_document == "b.pdf"));
        assert!(missing.iter().all(|a| a.detail == "not found in document"));
        assert_eq!(missing[0].canonical_term, "Revenue");
        assert_eq!(missing[1].statement, StatementType::BalanceSheet);
    }

    #[test]
    fn test_found_in_document_count_covers_merged_rows() {
        let mut not_found = raw("Turnover", 100.1, "c.pdf", 0.5);
        not_found.found_in_document = false;
        let duplicate = raw("Revenue", 100.0, "a.pdf", 0.9);

        let result = consolidate(&[
            duplicate.clone(),
            duplicate,
            raw("Sales", 100.0, "b.pdf", 0.6),
            not_found,
            raw("Net Sales", 180.0, "d.pdf", 0.4),
        ]);

        assert_eq!(result.items.len(), 1);
        let item = &result.items[0];
        assert_eq!(item.provenance_count(), 3);
        assert_eq!(item.duplicate_count, 1);
        assert!(item.conflict_flag);
        // Two copies from a.pdf and one from b.pdf; c.pdf merged but unfound, d.pdf conflicts
        assert_eq!(item.found_in_document_count, 3);
    }

    #[test]
    fn test_synonyms_from_one_document_collapse() {
        let result = consolidate(&[
            raw("Revenue", 100.0, "ar.pdf", 0.6),
            raw("Sales", 100.0, "ar.pdf", 0.6),
        ]);

        assert_eq!(result.items.len(), 1);
        let item = &result.items[0];
        assert_eq!(item.duplicate_count, 1);
        assert_eq!(item.provenance_count(), 1);
        assert_eq!(item.provenance[0].source_document, "ar.pdf");
        assert_eq!(result.audit_count(AuditKind::Duplicate), 1);
    }

    #[test]
    fn test_unmapped_term_flagged() {
        let result = consolidate(&[raw("Crypto Mining Rewards", 5.0, "ar_2024.pdf", 0.6)]);
        assert!(result.items[0].unmapped);
        assert_eq!(result.items[0].canonical_term, "Crypto Mining Rewards");
        assert_eq!(result.audit_count(AuditKind::Unmapped), 1);
    }

    #[test]
    fn test_buckets_separate_years_and_categories() {
        let mut other_year = raw("Revenue", 100.0, "ar_2023.pdf", 0.6);
        other_year.year = 2023;
        let mut other_category = raw("Revenue", 100.0, "ar_2024.pdf", 0.6);
        other_category.category = "other".to_string();

        let result = consolidate(&[raw("Revenue", 100.0, "ar_2024.pdf", 0.6), other_year, other_category]);
        assert_eq!(result.items.len(), 3);
    }

    #[test]
    fn test_statement_from_term_map() {
        let mut item = raw("Total Assets", 500.0, "ar_2024.pdf", 0.6);
        item.statement = None;
        let result = consolidate(&[item]);
        assert_eq!(result.items[0].statement, StatementType::BalanceSheet);
    }

    #[test]
    fn test_order_independent() {
        let items = vec![
            raw("Revenue", 100.0, "a.pdf", 0.6),
            raw("Sales", 100.2, "b.pdf", 0.6),
            raw("Turnover", 130.0, "c.pdf", 0.6),
            raw("Net Income", 10.0, "a.pdf", 0.9),
        ];
        let mut reversed = items.clone();
        reversed.reverse();

        let a = consolidate(&items);
        let b = consolidate(&reversed);
        assert_eq!(a.items, b.items);
        assert_eq!(a.audit, b.audit);
    }
}
