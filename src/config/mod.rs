//! Configuration module for Filing-Finder
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, plus the optional JSON list of companies to search.
//!
//! # Example
//!
//! ```no_run
//! use filing_finder::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("finder.toml")).unwrap();
//! println!("Searching {} companies", config.company.len());
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    CompanyEntry, Config, ConsolidationConfig, CrawlerConfig, OutputConfig, PolicyConfig,
    RankingConfig, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_companies, load_config, load_config_with_hash};
