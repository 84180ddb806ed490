//! Canonical term dictionary
//!
//! The dictionary is compiled into the binary from `data/term_mappings.toml`
//! and loaded once per run. Its SHA-256 fingerprint is the mapping version
//! recorded with every run.

use crate::consolidate::model::StatementType;
use crate::FinderError;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};

const EMBEDDED_MAPPINGS: &str = include_str!("../../data/term_mappings.toml");

/// Minimum token-set similarity for a fuzzy match
pub const FUZZY_THRESHOLD: f64 = 0.80;

#[derive(Debug, Deserialize)]
struct MappingFile {
    term: Vec<MappingEntry>,
}

#[derive(Debug, Deserialize)]
struct MappingEntry {
    name: String,
    statement: Option<String>,
    #[serde(default)]
    synonyms: Vec<String>,
}

/// A canonical financial concept
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTerm {
    pub name: String,
    pub key: String,
    pub statement: Option<StatementType>,
    pub synonyms: Vec<String>,
}

/// How a raw term was resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    /// Equal to the canonical name or a synonym after normalization
    Exact,
    /// Token-set similarity at or above the threshold
    Fuzzy(f64),
    /// No match; kept under its own normalized key
    Unmapped,
}

/// A raw term mapped onto the dictionary
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTerm {
    /// Display name: the canonical name, or the raw term when unmapped
    pub name: String,
    pub key: String,
    pub statement: Option<StatementType>,
    pub kind: MatchKind,
}

impl ResolvedTerm {
    pub fn is_mapped(&self) -> bool {
        !matches!(self.kind, MatchKind::Unmapped)
    }
}

/// Normalizes a term for lookup
///
/// Case-folds, spells `&` as `and` and collapses every run of whitespace or
/// punctuation into one space.
///
/// # Examples
///
/// ```
/// use filing_finder::consolidate::normalize_term;
///
/// assert_eq!(normalize_term("  Selling, General & Administrative "), "selling general and administrative");
/// ```
pub fn normalize_term(term: &str) -> String {
    term.replace('&', " and ")
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token set used for fuzzy matching; plural `s` is dropped so "Revenues"
/// and "Revenue" share a token
fn token_set(normalized: &str) -> BTreeSet<String> {
    normalized
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.len() > 3 && t.ends_with('s') && !t.ends_with("ss") {
                t[..t.len() - 1].to_string()
            } else {
                t.to_string()
            }
        })
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Immutable term dictionary
#[derive(Debug, Clone)]
pub struct TermMap {
    version: String,
    terms: Vec<CanonicalTerm>,
    exact: HashMap<String, usize>,
    fuzzy: Vec<(BTreeSet<String>, usize)>,
}

impl TermMap {
    /// Loads the dictionary compiled into the crate
    pub fn embedded() -> Result<Self, FinderError> {
        Self::from_toml(EMBEDDED_MAPPINGS)
    }

    /// Parses a dictionary from TOML text
    ///
    /// # Returns
    ///
    /// * `Ok(TermMap)` - Dictionary with its content fingerprint as version
    /// * `Err(FinderError::Mapping)` - Invalid TOML, unknown statement, or a
    ///   name/synonym that normalizes onto another term's
    pub fn from_toml(content: &str) -> Result<Self, FinderError> {
        let file: MappingFile = toml::from_str(content)
            .map_err(|e| FinderError::Mapping(format!("invalid term mapping: {}", e)))?;

        let version = hex::encode(Sha256::digest(content.as_bytes()));
        let mut terms = Vec::with_capacity(file.term.len());
        let mut exact = HashMap::new();
        let mut fuzzy = Vec::new();

        for entry in file.term {
            let statement = match entry.statement.as_deref() {
                Some(s) => Some(StatementType::parse(s).ok_or_else(|| {
                    FinderError::Mapping(format!("unknown statement '{}' for {}", s, entry.name))
                })?),
                None => None,
            };

            let index = terms.len();
            let key = normalize_term(&entry.name);

            for label in std::iter::once(&entry.name).chain(&entry.synonyms) {
                let normalized = normalize_term(label);
                if normalized.is_empty() {
                    continue;
                }
                if let Some(&other) = exact.get(&normalized) {
                    if other == index {
                        continue;
                    }
                    let other: &CanonicalTerm = &terms[other];
                    return Err(FinderError::Mapping(format!(
                        "'{}' maps to both {} and {}",
                        label, other.name, entry.name
                    )));
                }
                fuzzy.push((token_set(&normalized), index));
                exact.insert(normalized, index);
            }

            terms.push(CanonicalTerm {
                name: entry.name,
                key,
                statement,
                synonyms: entry.synonyms,
            });
        }

        Ok(Self {
            version,
            terms,
            exact,
            fuzzy,
        })
    }

    /// SHA-256 hex digest of the mapping source
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn terms(&self) -> &[CanonicalTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Resolves a raw term
    ///
    /// Exact lookups win; otherwise the most similar known label at or above
    /// [`FUZZY_THRESHOLD`] is taken, ties going to the earlier term.
    pub fn resolve(&self, raw: &str) -> ResolvedTerm {
        let normalized = normalize_term(raw);

        if let Some(&index) = self.exact.get(&normalized) {
            return self.resolved(index, MatchKind::Exact);
        }

        let tokens = token_set(&normalized);
        let mut best: Option<(f64, usize)> = None;
        for (candidate, index) in &self.fuzzy {
            let score = jaccard(&tokens, candidate);
            if score >= FUZZY_THRESHOLD && best.map_or(true, |(s, _)| score > s) {
                best = Some((score, *index));
            }
        }

        if let Some((score, index)) = best {
            tracing::debug!(
                "Fuzzy matched '{}' to {} ({:.2})",
                raw,
                self.terms[index].name,
                score
            );
            return self.resolved(index, MatchKind::Fuzzy(score));
        }

        ResolvedTerm {
            name: raw.trim().to_string(),
            key: normalized,
            statement: None,
            kind: MatchKind::Unmapped,
        }
    }

    fn resolved(&self, index: usize, kind: MatchKind) -> ResolvedTerm {
        let term = &self.terms[index];
        ResolvedTerm {
            name: term.name.clone(),
            key: term.key.clone(),
            statement: term.statement,
            kind,
        }
    }
}
