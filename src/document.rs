//! Report document types shared by the crawler, ranker and storage
//!
//! A `DocumentCandidate` is immutable once the crawler produces it; the
//! ranker only reads it.

use serde::Serialize;
use std::fmt;

/// File format of a report document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Xlsx,
}

impl DocumentFormat {
    /// Detects the format from a URL path or filename by its extension
    ///
    /// # Examples
    ///
    /// ```
    /// use filing_finder::DocumentFormat;
    ///
    /// assert_eq!(DocumentFormat::from_path("/ir/AR_2024.XLSX"), Some(DocumentFormat::Xlsx));
    /// assert_eq!(DocumentFormat::from_path("/ir/index.html"), None);
    /// ```
    pub fn from_path(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if lower.ends_with(".xlsx") {
            Some(Self::Xlsx)
        } else {
            None
        }
    }

    /// Detects the format from a `Content-Type` header value
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "application/pdf" | "application/x-pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(Self::Xlsx)
            }
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Xlsx => "xlsx",
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        self.extension()
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Kind of report, in descending order of preference
///
/// `Quarterly` and `Transparency` are penalized by the ranker rather than
/// excluded; a company may publish nothing better for a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    #[serde(rename = "form_20f")]
    Form20F,
    Annual,
    Integrated,
    Sustainability,
    Other,
    Quarterly,
    Transparency,
}

impl ReportType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Form20F => "form_20f",
            Self::Annual => "annual",
            Self::Integrated => "integrated",
            Self::Sustainability => "sustainability",
            Self::Other => "other",
            Self::Quarterly => "quarterly",
            Self::Transparency => "transparency",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Consolidation scope of the financial statements in a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Consolidated,
    Individual,
    Unknown,
}

impl Scope {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Consolidated => "consolidated",
            Self::Individual => "individual",
            Self::Unknown => "unknown",
        }
    }
}

/// A report document discovered during a crawl
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentCandidate {
    /// Canonical URL of the document
    pub url: String,

    /// Link text, or the filename when the link has no text
    pub title: String,

    /// Report year, when one could be inferred inside the year window
    pub inferred_year: Option<i32>,

    pub format: DocumentFormat,

    pub report_type: ReportType,

    pub scope: Scope,

    /// Depth of the page the document was linked from
    pub depth: u32,

    /// Position in deterministic discovery order (depth, frontier order, link order)
    pub discovery_index: usize,
}

impl DocumentCandidate {
    /// Length of the URL path, used as a ranking tie-break
    pub fn path_len(&self) -> usize {
        ::url::Url::parse(&self.url)
            .map(|u| u.path().len())
            .unwrap_or(self.url.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DocumentFormat::from_path("Annual_Report_2024.pdf"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(DocumentFormat::from_path("report.pdf.html"), None);
        assert_eq!(DocumentFormat::from_path("data.xls"), None);
    }

    #[test]
    fn test_format_from_content_type() {
        assert_eq!(
            DocumentFormat::from_content_type("application/pdf; charset=binary"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_content_type(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ),
            Some(DocumentFormat::Xlsx)
        );
        assert_eq!(DocumentFormat::from_content_type("text/html"), None);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&ReportType::Form20F).unwrap(),
            "\"form_20f\""
        );
        assert_eq!(serde_json::to_string(&DocumentFormat::Xlsx).unwrap(), "\"xlsx\"");
    }

    #[test]
    fn test_path_len_ignores_host() {
        let candidate = DocumentCandidate {
            url: "https://a-very-long-host.example.com/ar.pdf".to_string(),
            title: "AR".to_string(),
            inferred_year: Some(2024),
            format: DocumentFormat::Pdf,
            report_type: ReportType::Annual,
            scope: Scope::Unknown,
            depth: 1,
            discovery_index: 0,
        };
        assert_eq!(candidate.path_len(), "/ar.pdf".len());
    }
}
