//! Quality scoring of consolidated line items
//!
//! Each (ticker, year, statement) group is scored on three measures:
//! completeness against the reference schema, the accounting identities of
//! the statement, and the share of duplicate rows the consolidator collapsed.
//! Scoring only reads the consolidation result.

mod identities;
mod schema;

pub use identities::{identities_for, Identity, IdentityCheck, Operand, IDENTITIES, IDENTITY_TOLERANCE};
pub use schema::ReferenceSchema;

use crate::consolidate::{AuditKind, ConsolidationResult, StatementType};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const COMPLETENESS_WEIGHT: f64 = 60.0;
pub const CONSISTENCY_WEIGHT: f64 = 30.0;
pub const DUPLICATE_WEIGHT: f64 = 10.0;

/// Quality of one consolidated statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub ticker: String,
    pub year: i32,
    pub statement: StatementType,

    /// Share of reference fields present, 0 to 100
    pub completeness_pct: f64,
    pub present_fields: usize,
    pub expected_fields: usize,

    pub identities_total: usize,
    pub identities_passed: usize,

    /// Identities evaluated and failed
    pub consistency_violations: Vec<IdentityCheck>,

    pub duplicate_count: usize,
    pub conflict_count: usize,
    pub unmapped_count: usize,

    /// Rows of the group that carried no value
    pub missing_count: usize,

    /// Weighted score, 0 to 100
    pub aggregate_score: f64,
}

impl QualityReport {
    pub fn violation_count(&self) -> usize {
        self.consistency_violations.len()
    }
}

/// Working totals for one group
#[derive(Default)]
struct GroupTally {
    present: BTreeSet<String>,
    values: HashMap<String, (f64, f64)>,
    items: usize,
    duplicates: usize,
    conflicts: usize,
    unmapped: usize,
    missing: usize,
}

/// Combines the three measures into the aggregate score
///
/// `consistency` and `duplicate_rate` are fractions; `completeness` too.
pub fn aggregate_score(completeness: f64, consistency: f64, duplicate_rate: f64) -> f64 {
    COMPLETENESS_WEIGHT * completeness
        + CONSISTENCY_WEIGHT * consistency
        + DUPLICATE_WEIGHT * (1.0 - duplicate_rate)
}

/// Scores every (ticker, year, statement) group of a consolidation result
///
/// Unclassified items have no reference fields and are not scored.
pub fn score(result: &ConsolidationResult, schema: &ReferenceSchema) -> Vec<QualityReport> {
    let mut groups: BTreeMap<(String, i32, StatementType), GroupTally> = BTreeMap::new();
    let mut unclassified = 0usize;

    for item in &result.items {
        if schema.fields(item.statement).is_none() {
            unclassified += 1;
            continue;
        }

        let tally = groups
            .entry((item.ticker.clone(), item.year, item.statement))
            .or_default();
        tally.items += 1;
        tally.present.insert(item.term_key.clone());
        if item.conflict_flag {
            tally.conflicts += 1;
        }
        if item.unmapped {
            tally.unmapped += 1;
        }

        // Mixed-currency values cannot be combined in an identity
        if !item.currency_mismatch {
            let slot = tally
                .values
                .entry(item.term_key.clone())
                .or_insert((item.merged_value, item.confidence));
            if item.confidence > slot.1 {
                *slot = (item.merged_value, item.confidence);
            }
        }
    }

    for entry in &result.audit {
        let Some(tally) = groups.get_mut(&(entry.ticker.clone(), entry.year, entry.statement)) else {
            continue;
        };
        match entry.kind {
            AuditKind::Duplicate => tally.duplicates += 1,
            AuditKind::Missing => tally.missing += 1,
            _ => {}
        }
    }

    if unclassified > 0 {
        tracing::debug!("{} unclassified items left out of quality scoring", unclassified);
    }

    groups
        .into_iter()
        .filter_map(|((ticker, year, statement), tally)| {
            let expected = schema.fields(statement)?;
            Some(score_group(ticker, year, statement, tally, expected))
        })
        .collect()
}

fn score_group(
    ticker: String,
    year: i32,
    statement: StatementType,
    tally: GroupTally,
    expected: &BTreeSet<String>,
) -> QualityReport {
    let present_fields = tally.present.intersection(expected).count();
    let completeness = if expected.is_empty() {
        0.0
    } else {
        present_fields as f64 / expected.len() as f64
    };

    let values: HashMap<String, f64> = tally.values.into_iter().map(|(k, (v, _))| (k, v)).collect();
    let mut identities_total = 0;
    let mut identities_passed = 0;
    let mut violations = Vec::new();
    for identity in identities_for(statement) {
        identities_total += 1;
        match identity.evaluate(&values) {
            Some(check) if check.passed => identities_passed += 1,
            Some(check) => {
                tracing::warn!(
                    "{} {} {}: {} fails ({} vs {})",
                    ticker,
                    year,
                    statement,
                    check.name,
                    check.actual,
                    check.expected
                );
                violations.push(check);
            }
            None => {}
        }
    }

    // Identities that cannot be evaluated earn no credit
    let consistency = if identities_total == 0 {
        1.0
    } else {
        identities_passed as f64 / identities_total as f64
    };

    let duplicate_rate = if tally.duplicates + tally.items == 0 {
        0.0
    } else {
        tally.duplicates as f64 / (tally.duplicates + tally.items) as f64
    };

    let aggregate = aggregate_score(completeness, consistency, duplicate_rate);
    tracing::info!(
        "{} {} {}: completeness {:.1}%, {}/{} identities, score {:.1}",
        ticker,
        year,
        statement,
        completeness * 100.0,
        identities_passed,
        identities_total,
        aggregate
    );

    QualityReport {
        ticker,
        year,
        statement,
        completeness_pct: completeness * 100.0,
        present_fields,
        expected_fields: expected.len(),
        identities_total,
        identities_passed,
        consistency_violations: violations,
        duplicate_count: tally.duplicates,
        conflict_count: tally.conflicts,
        unmapped_count: tally.unmapped,
        missing_count: tally.missing,
        aggregate_score: aggregate,
    }
}
