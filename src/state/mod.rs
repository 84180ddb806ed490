//! Crawl state shared between fetch tasks
//!
//! - `FetchState`: how a frontier URL ended (fetched, failed, cancelled, ...)
//! - `DomainState` / `DomainThrottle`: per-domain politeness bookkeeping

mod domain_state;
mod fetch_state;

pub use domain_state::{DomainState, DomainThrottle};
pub use fetch_state::FetchState;
