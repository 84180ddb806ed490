//! Accounting identities checked per statement

use crate::consolidate::{normalize_term, within_tolerance, StatementType};
use serde::Serialize;
use std::collections::HashMap;

/// Relative tolerance of an identity check
pub const IDENTITY_TOLERANCE: f64 = 0.01;

/// A term on the right-hand side of an identity
#[derive(Debug, Clone, Copy)]
pub enum Operand {
    Plus(&'static str),
    /// Subtracted by magnitude, whatever sign the source used
    MinusAbs(&'static str),
}

impl Operand {
    fn term(&self) -> &'static str {
        match self {
            Self::Plus(t) | Self::MinusAbs(t) => t,
        }
    }

    fn apply(&self, value: f64) -> f64 {
        match self {
            Self::Plus(_) => value,
            Self::MinusAbs(_) => -value.abs(),
        }
    }
}

/// `total = sum(operands)` on one statement
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub name: &'static str,
    pub statement: StatementType,
    pub total: &'static str,
    pub operands: &'static [Operand],
}

pub const IDENTITIES: &[Identity] = &[
    Identity {
        name: "assets = liabilities + equity",
        statement: StatementType::BalanceSheet,
        total: "Total Assets",
        operands: &[Operand::Plus("Total Liabilities"), Operand::Plus("Total Equity")],
    },
    Identity {
        name: "gross profit = revenue - cost of sales",
        statement: StatementType::IncomeStatement,
        total: "Gross Profit",
        operands: &[Operand::Plus("Revenue"), Operand::MinusAbs("Cost of Sales")],
    },
    Identity {
        name: "net cash flow = operating + investing + financing",
        statement: StatementType::CashFlowStatement,
        total: "Net Cash Flow",
        operands: &[
            Operand::Plus("Operating Cash Flow"),
            Operand::Plus("Investing Cash Flow"),
            Operand::Plus("Financing Cash Flow"),
        ],
    },
];

/// Identities defined for a statement
pub fn identities_for(statement: StatementType) -> impl Iterator<Item = &'static Identity> {
    IDENTITIES.iter().filter(move |i| i.statement == statement)
}

/// Outcome of one evaluated identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityCheck {
    pub name: &'static str,
    pub expected: f64,
    pub actual: f64,
    pub passed: bool,
}

impl Identity {
    /// Evaluates the identity against values keyed by canonical term key
    ///
    /// Returns `None` unless every operand is present.
    pub fn evaluate(&self, values: &HashMap<String, f64>) -> Option<IdentityCheck> {
        let actual = *values.get(&normalize_term(self.total))?;
        let mut expected = 0.0;
        for operand in self.operands {
            let value = *values.get(&normalize_term(operand.term()))?;
            expected += operand.apply(value);
        }

        Some(IdentityCheck {
            name: self.name,
            expected,
            actual,
            passed: within_tolerance(actual, expected, IDENTITY_TOLERANCE),
        })
    }
}
