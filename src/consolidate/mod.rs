//! Consolidation of extracted financial line items
//!
//! Raw items come from CSV files written by the extractor (`input`). Terms
//! are mapped onto a canonical dictionary (`terms`) and items reporting the
//! same concept are merged across source documents (`merge`), leaving an
//! audit trail of every duplicate, conflict and unmapped term.

mod input;
mod merge;
mod model;
mod terms;

pub use input::{find_csv_files, load_line_items, parse_value, read_line_items, LoadedItems};
pub use merge::{within_tolerance, BucketKey, ConsolidationResult, Consolidator};
pub use model::{
    parse_confidence, AuditEntry, AuditKind, ConsolidatedLineItem, Provenance, RawLineItem,
    StatementType, DEFAULT_CONFIDENCE,
};
pub use terms::{
    normalize_term, CanonicalTerm, MatchKind, ResolvedTerm, TermMap, FUZZY_THRESHOLD,
};
