//! URL handling module for Filing-Finder
//!
//! This module provides URL canonicalization, host matching, and the link
//! policy deciding which URLs a company crawl may enter.

mod canonical;
mod host;

use crate::config::{CompanyEntry, PolicyConfig};
use crate::UrlError;
use url::Url;

pub use canonical::{canonicalize, canonicalize_url};
pub use host::{extract_domain, matches_wildcard};

/// Why a URL was refused by the deny-list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Host matched a denied domain pattern
    Domain(String),
    /// A path segment matched a denied segment
    PathSegment(String),
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Domain(pattern) => write!(f, "denied domain {}", pattern),
            Self::PathSegment(segment) => write!(f, "denied path segment '{}'", segment),
        }
    }
}

/// Policy verdict for a single URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlVerdict {
    /// On the seed host or an allow-listed host; may be crawled
    Eligible,
    /// Outside the company's hosts; may be recorded as a document but not crawled
    OffDomain,
    /// Matched the deny-list; never used
    Denied(DenyReason),
}

impl UrlVerdict {
    /// Returns true if pages behind this URL may be fetched and followed
    pub fn can_follow(&self) -> bool {
        matches!(self, Self::Eligible)
    }

    /// Returns true if a document behind this URL may become a candidate
    pub fn can_collect(&self) -> bool {
        !matches!(self, Self::Denied(_))
    }
}

/// Link policy for one company crawl
///
/// Deny rules are checked first so a denied URL is refused even on the seed
/// host.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    seed_host: String,
    allowed_hosts: Vec<String>,
    deny_domains: Vec<String>,
    deny_segments: Vec<String>,
}

impl UrlPolicy {
    /// Builds the policy for one company from its root URL and the global deny-lists
    ///
    /// # Returns
    ///
    /// * `Ok(UrlPolicy)` - Policy anchored at the root URL's host
    /// * `Err(UrlError)` - The root URL is not a valid HTTP(S) URL
    pub fn for_company(company: &CompanyEntry, policy: &PolicyConfig) -> Result<Self, UrlError> {
        let root = canonicalize_url(&company.root_url)?;
        let seed_host = extract_domain(&root).ok_or(UrlError::MissingDomain)?;

        Ok(Self {
            seed_host,
            allowed_hosts: company
                .allowed_hosts
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            deny_domains: policy.deny_domains.iter().map(|p| p.to_lowercase()).collect(),
            deny_segments: policy
                .deny_path_segments
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        })
    }

    /// The host the crawl is anchored to
    pub fn seed_host(&self) -> &str {
        &self.seed_host
    }

    /// Classifies a canonical URL
    pub fn classify(&self, url: &Url) -> UrlVerdict {
        let Some(host) = extract_domain(url) else {
            return UrlVerdict::Denied(DenyReason::Domain(String::new()));
        };

        if let Some(pattern) = self
            .deny_domains
            .iter()
            .find(|pattern| matches_wildcard(pattern, &host))
        {
            return UrlVerdict::Denied(DenyReason::Domain(pattern.clone()));
        }

        if let Some(segments) = url.path_segments() {
            for segment in segments {
                let segment = segment.to_lowercase();
                if self.deny_segments.contains(&segment) {
                    return UrlVerdict::Denied(DenyReason::PathSegment(segment));
                }
            }
        }

        if host == self.seed_host
            || self
                .allowed_hosts
                .iter()
                .any(|pattern| matches_wildcard(pattern, &host))
        {
            UrlVerdict::Eligible
        } else {
            UrlVerdict::OffDomain
        }
    }
}
