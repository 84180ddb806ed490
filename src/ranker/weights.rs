//! Constant score weights
//!
//! | Factor      | Weights                                                         |
//! |-------------|-----------------------------------------------------------------|
//! | Format      | XLSX 200, PDF 100                                               |
//! | Report type | Form 20-F 150, Annual 100, Integrated 60, Sustainability 20,    |
//! |             | Other 0, Quarterly / Transparency -100                          |
//! | Scope       | Consolidated 40, Individual 0, Unknown 0                        |

use crate::document::{DocumentCandidate, DocumentFormat, ReportType, Scope};

pub const fn format_weight(format: DocumentFormat) -> i32 {
    match format {
        DocumentFormat::Xlsx => 200,
        DocumentFormat::Pdf => 100,
    }
}

pub const fn report_type_weight(report_type: ReportType) -> i32 {
    match report_type {
        ReportType::Form20F => 150,
        ReportType::Annual => 100,
        ReportType::Integrated => 60,
        ReportType::Sustainability => 20,
        ReportType::Other => 0,
        ReportType::Quarterly | ReportType::Transparency => -100,
    }
}

pub const fn scope_weight(scope: Scope) -> i32 {
    match scope {
        Scope::Consolidated => 40,
        Scope::Individual | Scope::Unknown => 0,
    }
}

/// Additive score of a candidate
pub fn score(candidate: &DocumentCandidate) -> i32 {
    format_weight(candidate.format)
        + report_type_weight(candidate.report_type)
        + scope_weight(candidate.scope)
}
