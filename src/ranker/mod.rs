//! Candidate ranking per (ticker, year)
//!
//! Candidates are scored with the constant tables in [`weights`], sorted
//! with a total order and split into `best` and `secondary`. The result is a
//! pure function of the candidate set: input order never matters.

mod registry;
pub mod weights;

pub use registry::{CompanyReports, DiscoveryInfo, Registry, RegistryEntry, YearReports};

use crate::config::RankingConfig;
use crate::document::DocumentCandidate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a candidate was left out of a bucket
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Exclusion {
    #[error("no report year could be inferred")]
    AmbiguousYear,

    #[error("report year {found} does not match bucket year {expected}")]
    ScopeMismatch { expected: i32, found: i32 },
}

/// A candidate with its score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: DocumentCandidate,
    pub score: i32,
}

/// Ranked candidates for one (ticker, year)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedBucket {
    pub ticker: String,
    pub year: i32,

    /// Candidates within the best margin of the top score, highest first
    pub best: Vec<ScoredCandidate>,

    /// Runner-ups above the minimum score, highest first
    pub secondary: Vec<ScoredCandidate>,
}

impl RankedBucket {
    pub fn is_empty(&self) -> bool {
        self.best.is_empty()
    }
}

/// Checks that a candidate belongs in the bucket for `year`
pub fn check_eligible(candidate: &DocumentCandidate, year: i32) -> Result<(), Exclusion> {
    match candidate.inferred_year {
        None => Err(Exclusion::AmbiguousYear),
        Some(found) if found != year => Err(Exclusion::ScopeMismatch {
            expected: year,
            found,
        }),
        Some(_) => Ok(()),
    }
}

/// Total order used for ranking: score descending, then shallower depth,
/// shorter URL path, earlier discovery and finally the URL itself
fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.candidate.depth.cmp(&b.candidate.depth))
        .then_with(|| a.candidate.path_len().cmp(&b.candidate.path_len()))
        .then_with(|| a.candidate.discovery_index.cmp(&b.candidate.discovery_index))
        .then_with(|| a.candidate.url.cmp(&b.candidate.url))
}

/// Ranks the candidates of one (ticker, year) bucket
///
/// Candidates without a year or with a different year are excluded and
/// logged. Candidates scoring within `best_margin` of the top are `best`;
/// up to `max_secondary` of the rest with at least `min_score` are
/// `secondary`. Everything else is dropped.
///
/// # Examples
///
/// ```
/// use filing_finder::config::RankingConfig;
/// use filing_finder::{rank_bucket, DocumentCandidate, DocumentFormat, ReportType, Scope};
///
/// let candidate = |url: &str, format| DocumentCandidate {
///     url: url.to_string(),
///     title: "Annual report 2024".to_string(),
///     inferred_year: Some(2024),
///     format,
///     report_type: ReportType::Annual,
///     scope: Scope::Unknown,
///     depth: 1,
///     discovery_index: 0,
/// };
///
/// let bucket = rank_bucket(
///     "ADYEN",
///     2024,
///     &[
///         candidate("https://ir.example.com/ar.pdf", DocumentFormat::Pdf),
///         candidate("https://ir.example.com/ar.xlsx", DocumentFormat::Xlsx),
///     ],
///     &RankingConfig::default(),
/// );
/// assert_eq!(bucket.best[0].candidate.format, DocumentFormat::Xlsx);
/// assert_eq!(bucket.secondary[0].candidate.format, DocumentFormat::Pdf);
/// ```
pub fn rank_bucket(
    ticker: &str,
    year: i32,
    candidates: &[DocumentCandidate],
    config: &RankingConfig,
) -> RankedBucket {
    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .filter(|candidate| match check_eligible(candidate, year) {
            Ok(()) => true,
            Err(e @ Exclusion::AmbiguousYear) => {
                tracing::warn!("{}: excluding {} ({})", ticker, candidate.url, e);
                false
            }
            Err(e @ Exclusion::ScopeMismatch { .. }) => {
                tracing::debug!("{}: excluding {} ({})", ticker, candidate.url, e);
                false
            }
        })
        .map(|candidate| ScoredCandidate {
            candidate: candidate.clone(),
            score: weights::score(candidate),
        })
        .collect();

    scored.sort_by(compare);

    let mut bucket = RankedBucket {
        ticker: ticker.to_string(),
        year,
        best: Vec::new(),
        secondary: Vec::new(),
    };

    let Some(top) = scored.first().map(|s| s.score) else {
        return bucket;
    };
    let threshold = top.saturating_sub(config.best_margin.max(0));

    for entry in scored {
        if entry.score >= threshold {
            bucket.best.push(entry);
        } else if entry.score >= config.min_score && bucket.secondary.len() < config.max_secondary {
            bucket.secondary.push(entry);
        } else {
            tracing::trace!("{} {}: dropping {} (score {})", ticker, year, entry.candidate.url, entry.score);
        }
    }

    bucket
}

/// Groups a company's candidates by year and ranks every year
///
/// Candidates without a year are excluded here; buckets come back in
/// ascending year order.
pub fn rank_company(
    ticker: &str,
    candidates: &[DocumentCandidate],
    config: &RankingConfig,
) -> Vec<RankedBucket> {
    let mut by_year: BTreeMap<i32, Vec<DocumentCandidate>> = BTreeMap::new();

    for candidate in candidates {
        match candidate.inferred_year {
            Some(year) => by_year.entry(year).or_default().push(candidate.clone()),
            None => {
                tracing::warn!(
                    "{}: excluding {} ({})",
                    ticker,
                    candidate.url,
                    Exclusion::AmbiguousYear
                );
            }
        }
    }

    by_year
        .into_iter()
        .map(|(year, candidates)| rank_bucket(ticker, year, &candidates, config))
        .filter(|bucket| !bucket.is_empty())
        .inspect(|bucket| {
            tracing::info!(
                "{} {}: best {} (score {}), {} secondary",
                ticker,
                bucket.year,
                bucket.best[0].candidate.url,
                bucket.best[0].score,
                bucket.secondary.len()
            );
        })
        .collect()
}
