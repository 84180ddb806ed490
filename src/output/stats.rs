//! Statistics generation from the run database
//!
//! This module provides functionality for extracting and displaying
//! run statistics from the storage layer.

use crate::consolidate::AuditKind;
use crate::state::FetchState;
use crate::storage::{RunKind, RunRecord, Storage};
use crate::FinderError;
use std::collections::HashMap;

/// Summary of the latest discovery run
#[derive(Debug, Clone)]
pub struct DiscoveryStatistics {
    pub run: RunRecord,

    /// Total number of frontier URLs recorded
    pub total_fetches: u64,

    /// Count of fetches by final state
    pub fetches_by_state: HashMap<FetchState, u64>,

    pub companies: u64,
    pub best_documents: u64,
    pub secondary_documents: u64,
}

/// Summary of the latest consolidation run
#[derive(Debug, Clone)]
pub struct ConsolidationStatistics {
    pub run: RunRecord,
    pub items: u64,
    pub audit_by_kind: HashMap<AuditKind, u64>,
    pub average_quality_score: Option<f64>,
}

/// Statistics of the most recent run of each kind
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    pub discovery: Option<DiscoveryStatistics>,
    pub consolidation: Option<ConsolidationStatistics>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(RunStatistics)` - Successfully loaded statistics
/// * `Err(FinderError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<RunStatistics, FinderError> {
    let discovery = match storage.get_latest_run(RunKind::Discovery)? {
        Some(run) => {
            let fetches_by_state = storage.count_fetches_by_state(run.id)?;
            let tiers = storage.count_documents_by_tier(run.id)?;
            Some(DiscoveryStatistics {
                total_fetches: fetches_by_state.values().sum(),
                companies: storage.count_companies(run.id)?,
                best_documents: tiers.get("best").copied().unwrap_or(0),
                secondary_documents: tiers.get("secondary").copied().unwrap_or(0),
                fetches_by_state,
                run,
            })
        }
        None => None,
    };

    let consolidation = match storage.get_latest_run(RunKind::Consolidation)? {
        Some(run) => Some(ConsolidationStatistics {
            items: storage.count_items(run.id)?,
            audit_by_kind: storage.count_audit_by_kind(run.id)?,
            average_quality_score: storage.average_quality_score(run.id)?,
            run,
        }),
        None => None,
    };

    Ok(RunStatistics {
        discovery,
        consolidation,
    })
}

fn print_run_header(run: &RunRecord) {
    println!("  Run ID: {}", run.id);
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Status: {}", run.status.to_db_string());
    println!("  Config hash: {}", run.config_hash);
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Run Statistics ===\n");

    if stats.discovery.is_none() && stats.consolidation.is_none() {
        println!("No runs recorded yet.");
        return;
    }

    if let Some(discovery) = &stats.discovery {
        println!("Latest Discovery:");
        print_run_header(&discovery.run);
        println!("  Companies crawled: {}", discovery.companies);
        println!("  Best documents: {}", discovery.best_documents);
        println!("  Secondary documents: {}", discovery.secondary_documents);
        println!();

        println!("Fetches by State:");
        let mut state_counts: Vec<_> = discovery.fetches_by_state.iter().collect();
        state_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.to_db_string().cmp(b.0.to_db_string())));

        for (state, count) in state_counts {
            let percentage = if discovery.total_fetches > 0 {
                (*count as f64 / discovery.total_fetches as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", state, count, percentage);
        }
        println!();

        let successful: u64 = discovery
            .fetches_by_state
            .iter()
            .filter(|(state, _)| state.is_success())
            .map(|(_, count)| count)
            .sum();
        let success_rate = if discovery.total_fetches > 0 {
            (successful as f64 / discovery.total_fetches as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "Success Rate: {:.1}% ({} / {} URLs fetched)",
            success_rate, successful, discovery.total_fetches
        );
        println!();
    }

    if let Some(consolidation) = &stats.consolidation {
        println!("Latest Consolidation:");
        print_run_header(&consolidation.run);
        if let Some(version) = &consolidation.run.mapping_version {
            println!("  Mapping version: {}", version);
        }
        println!("  Consolidated items: {}", consolidation.items);
        for kind in AuditKind::ALL {
            let count = consolidation.audit_by_kind.get(&kind).copied().unwrap_or(0);
            println!("  {} entries: {}", kind.to_db_string(), count);
        }
        match consolidation.average_quality_score {
            Some(score) => println!("  Average quality score: {:.1}", score),
            None => println!("  Average quality score: n/a"),
        }
    }
}
