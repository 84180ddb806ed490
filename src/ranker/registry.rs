//! The ranked report registry written after discovery

use crate::crawler::YearWindow;
use crate::document::{DocumentFormat, ReportType};
use crate::ranker::{RankedBucket, ScoredCandidate};
use serde::Serialize;
use std::collections::BTreeMap;

const DESCRIPTION: &str =
    "Ranked annual report links per company and year with best and secondary options";

/// One selected document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryEntry {
    pub title: String,
    pub url: String,
    pub score: i32,
    pub format: DocumentFormat,
    pub report_type: ReportType,
}

impl From<&ScoredCandidate> for RegistryEntry {
    fn from(scored: &ScoredCandidate) -> Self {
        Self {
            title: scored.candidate.title.clone(),
            url: scored.candidate.url.clone(),
            score: scored.score,
            format: scored.candidate.format,
            report_type: scored.candidate.report_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearReports {
    pub year: i32,
    pub best: Vec<RegistryEntry>,
    pub secondary: Vec<RegistryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyReports {
    pub company_name: String,
    pub ticker: String,
    pub years_covered: Vec<i32>,
    pub total_best_reports: usize,
    pub total_secondary_reports: usize,
    pub reports: Vec<YearReports>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryInfo {
    pub discovery_date: String,
    pub description: String,
    pub year_min: i32,
    pub year_max: i32,
    pub total_companies: usize,
    pub total_best_reports: usize,
    pub total_secondary_reports: usize,
}

/// Registry of ranked reports keyed by ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registry {
    pub discovery_info: DiscoveryInfo,
    pub companies: BTreeMap<String, CompanyReports>,
}

impl Registry {
    pub fn new(window: YearWindow) -> Self {
        Self {
            discovery_info: DiscoveryInfo {
                discovery_date: chrono::Local::now().to_rfc3339(),
                description: DESCRIPTION.to_string(),
                year_min: window.min,
                year_max: window.max,
                total_companies: 0,
                total_best_reports: 0,
                total_secondary_reports: 0,
            },
            companies: BTreeMap::new(),
        }
    }

    /// Adds a company's ranked buckets, replacing any earlier entry for the ticker
    ///
    /// A company with no buckets is still listed, with no years covered.
    pub fn add_company(&mut self, ticker: &str, company_name: &str, buckets: &[RankedBucket]) {
        let mut buckets: Vec<&RankedBucket> = buckets.iter().filter(|b| !b.is_empty()).collect();
        buckets.sort_by_key(|b| b.year);

        let reports: Vec<YearReports> = buckets
            .iter()
            .map(|bucket| YearReports {
                year: bucket.year,
                best: bucket.best.iter().map(RegistryEntry::from).collect(),
                secondary: bucket.secondary.iter().map(RegistryEntry::from).collect(),
            })
            .collect();

        let company = CompanyReports {
            company_name: company_name.to_string(),
            ticker: ticker.to_string(),
            years_covered: reports.iter().map(|r| r.year).collect(),
            total_best_reports: reports.iter().map(|r| r.best.len()).sum(),
            total_secondary_reports: reports.iter().map(|r| r.secondary.len()).sum(),
            reports,
        };

        self.companies.insert(ticker.to_string(), company);
        self.refresh_totals();
    }

    pub fn company(&self, ticker: &str) -> Option<&CompanyReports> {
        self.companies.get(ticker)
    }

    fn refresh_totals(&mut self) {
        let info = &mut self.discovery_info;
        info.total_companies = self.companies.len();
        info.total_best_reports = self.companies.values().map(|c| c.total_best_reports).sum();
        info.total_secondary_reports = self
            .companies
            .values()
            .map(|c| c.total_secondary_reports)
            .sum();
    }
}
