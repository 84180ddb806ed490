//! Output module for run results
//!
//! This module handles:
//! - Writing the ranked report registry as JSON
//! - Exporting consolidated items and quality reports as CSV
//! - Loading and printing run statistics

mod registry;
pub mod stats;
mod tables;

pub use registry::{write_registry, write_registry_to};
pub use stats::{load_statistics, print_statistics, RunStatistics};
pub use tables::{write_consolidated, write_consolidated_to, write_quality, write_quality_to};
