//! Line item types for consolidation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Financial statement a line item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementType {
    IncomeStatement,
    BalanceSheet,
    CashFlowStatement,
    /// No statement given and none known for the term
    Unclassified,
}

impl StatementType {
    pub const STATEMENTS: [StatementType; 3] = [
        Self::IncomeStatement,
        Self::BalanceSheet,
        Self::CashFlowStatement,
    ];

    /// Parses a statement name leniently ("Balance Sheet", "cash_flow", ...)
    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();

        match key.as_str() {
            "incomestatement" | "income" | "profitandloss" | "pl" | "pnl" => {
                Some(Self::IncomeStatement)
            }
            "balancesheet" | "balance" | "financialposition" => Some(Self::BalanceSheet),
            "cashflowstatement" | "cashflow" | "cashflows" => Some(Self::CashFlowStatement),
            "unclassified" => Some(Self::Unclassified),
            _ => None,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::IncomeStatement => "income_statement",
            Self::BalanceSheet => "balance_sheet",
            Self::CashFlowStatement => "cash_flow_statement",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Confidence assumed when the extractor gave none
pub const DEFAULT_CONFIDENCE: f64 = 0.6;

/// Parses an extraction confidence: a number in [0, 1], a percentage, or
/// High / Medium / Low
pub fn parse_confidence(s: &str) -> Option<f64> {
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "high" => return Some(0.9),
        "medium" => return Some(0.6),
        "low" => return Some(0.3),
        _ => {}
    }

    let value: f64 = s.trim_end_matches('%').trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(if value > 1.0 { (value / 100.0).min(1.0) } else { value })
}

/// A line item as extracted from one source document
#[derive(Debug, Clone, PartialEq)]
pub struct RawLineItem {
    /// Term exactly as the source names it
    pub term: String,

    /// Extracted value; None when the source did not contain the item
    pub value: Option<f64>,

    pub currency: String,
    pub year: i32,
    pub category: String,
    pub ticker: String,
    pub found_in_document: bool,

    /// Statement given by the source, if any
    pub statement: Option<StatementType>,

    /// Identifies the source document
    pub source_document: String,

    /// Extraction confidence in [0, 1]
    pub confidence: f64,

    /// Position of the source in the discovery ranking (0 = best)
    pub source_rank: u32,
}

/// One source contributing to a consolidated value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub source_document: String,
    pub original_term: String,
    pub value: f64,
    pub confidence: f64,
    pub source_rank: u32,
}

/// A canonical line item merged across sources
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedLineItem {
    pub ticker: String,
    pub year: i32,
    pub statement: StatementType,
    pub category: String,

    /// Display name of the canonical term
    pub canonical_term: String,

    /// Normalized lookup key of the canonical term
    pub term_key: String,

    pub merged_value: f64,
    pub currency: String,

    /// Confidence of the source the value was taken from
    pub confidence: f64,

    /// Sources agreeing with the merged value; never empty
    pub provenance: Vec<Provenance>,

    /// Exact duplicate rows collapsed into this item
    pub duplicate_count: usize,

    /// Merged rows, duplicates included, that were found in their document
    pub found_in_document_count: usize,

    /// A source disagreed beyond tolerance
    pub conflict_flag: bool,

    /// Sources reported different currencies, so nothing was merged
    pub currency_mismatch: bool,

    /// The term matched no canonical term
    pub unmapped: bool,
}

impl ConsolidatedLineItem {
    pub fn provenance_count(&self) -> usize {
        self.provenance.len()
    }
}

/// Kind of audit trail record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// An exact duplicate row was collapsed
    Duplicate,
    /// Sources disagreed on currency
    CurrencyMismatch,
    /// A value outside tolerance of the reference value
    Conflict,
    /// A term kept under an ad-hoc key
    Unmapped,
    /// A row without a usable value, usually not found in its document
    Missing,
}

impl AuditKind {
    pub const ALL: [AuditKind; 5] = [
        Self::Duplicate,
        Self::CurrencyMismatch,
        Self::Conflict,
        Self::Unmapped,
        Self::Missing,
    ];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::CurrencyMismatch => "currency_mismatch",
            Self::Conflict => "conflict",
            Self::Unmapped => "unmapped",
            Self::Missing => "missing",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.to_db_string() == s)
    }
}

/// A consolidation decision worth keeping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub kind: AuditKind,
    pub ticker: String,
    pub year: i32,
    pub statement: StatementType,
    pub category: String,
    pub canonical_term: String,
    pub source_document: String,
    pub original_term: String,
    pub value: Option<f64>,
    pub currency: String,

    /// Value the entry was compared against
    pub reference_value: Option<f64>,

    pub detail: String,
}
