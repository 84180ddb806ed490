//! Crawler module for report discovery
//!
//! This module contains the discovery side of the pipeline:
//! - Fetching with retries and politeness (`fetcher`, `robots`)
//! - The per-company breadth-first frontier (`frontier`)
//! - Link extraction and classification (`classifier`, `inference`)
//! - Overall crawl coordination (`coordinator`)

mod classifier;
mod coordinator;
mod fetcher;
mod frontier;
mod inference;
mod robots;

pub use classifier::{
    classify_link, extract_links, CandidateCollector, CollectOutcome, ExtractedLink, LinkClass,
    ParseError,
};
pub use coordinator::{run_discovery, Coordinator, CrawlReport, FetchRecord};
pub use fetcher::{
    build_http_client, fetch_with_retry, user_agent_string, FetchError, FetchedContent, Fetcher,
    HttpFetcher, RetryPolicy,
};
pub use frontier::{EnqueueOutcome, Frontier, FrontierEntry};
pub use inference::{infer_report_type, infer_scope, infer_year, YearInference, YearWindow};
pub use robots::{RobotsCache, RobotsRules};
