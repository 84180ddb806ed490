//! Reference schema of fields a complete statement reports

use crate::consolidate::{StatementType, TermMap};
use crate::FinderError;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

const EMBEDDED_SCHEMA: &str = include_str!("../../data/reference_schema.toml");

/// Field names per category, as written in the schema file
type Categories = BTreeMap<String, Vec<String>>;

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    income_statement: Categories,
    #[serde(default)]
    balance_sheet: Categories,
    #[serde(default)]
    cash_flow_statement: Categories,
}

/// Canonical term keys expected per statement
#[derive(Debug, Clone)]
pub struct ReferenceSchema {
    fields: BTreeMap<StatementType, BTreeSet<String>>,
    raw_field_count: usize,
}

impl ReferenceSchema {
    pub fn embedded(terms: &TermMap) -> Result<Self, FinderError> {
        Self::from_toml(EMBEDDED_SCHEMA, terms)
    }

    /// Parses a schema and collapses its field names through the term map
    ///
    /// Synonyms listed as separate fields ("Revenue", "Sales", "Turnover")
    /// count once.
    pub fn from_toml(content: &str, terms: &TermMap) -> Result<Self, FinderError> {
        let file: SchemaFile = toml::from_str(content)
            .map_err(|e| FinderError::Mapping(format!("invalid reference schema: {}", e)))?;

        let mut fields = BTreeMap::new();
        let mut raw_field_count = 0;

        for (statement, categories) in [
            (StatementType::IncomeStatement, file.income_statement),
            (StatementType::BalanceSheet, file.balance_sheet),
            (StatementType::CashFlowStatement, file.cash_flow_statement),
        ] {
            let keys: BTreeSet<String> = categories
                .values()
                .flatten()
                .inspect(|_| raw_field_count += 1)
                .map(|name| terms.resolve(name).key)
                .filter(|key| !key.is_empty())
                .collect();

            tracing::debug!(
                "Reference schema for {}: {} canonical fields",
                statement,
                keys.len()
            );
            fields.insert(statement, keys);
        }

        Ok(Self {
            fields,
            raw_field_count,
        })
    }

    /// Canonical keys for a statement; `None` for unclassified items
    pub fn fields(&self, statement: StatementType) -> Option<&BTreeSet<String>> {
        self.fields.get(&statement)
    }

    /// Number of field names before deduplication
    pub fn raw_field_count(&self) -> usize {
        self.raw_field_count
    }
}
