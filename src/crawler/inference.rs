//! Year, report type and scope inference for document links
//!
//! All inference is keyword based and works on the text the crawler has at
//! hand: the filename, the anchor text, the text surrounding the anchor and
//! the URL path.

use crate::document::{ReportType, Scope};
use chrono::Datelike;
use regex::Regex;
use std::sync::LazyLock;

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("invalid regex"));

/// Inclusive range of acceptable report years
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub min: i32,
    pub max: i32,
}

impl YearWindow {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Window ending at the last completed year
    ///
    /// The current year is excluded since its annual report cannot exist
    /// yet. The lower bound reaches one year past `years_back` so a report
    /// published late in a year is still accepted.
    pub fn trailing(years_back: u32, current_year: i32) -> Self {
        let years_back = i32::try_from(years_back).unwrap_or(i32::MAX / 2);
        Self {
            min: current_year - years_back - 1,
            max: current_year - 1,
        }
    }

    /// Trailing window relative to today's date
    pub fn for_today(years_back: u32) -> Self {
        Self::trailing(years_back, chrono::Utc::now().year())
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.min..=self.max).contains(&year)
    }
}

/// Result of year inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearInference {
    /// A year inside the window
    Found(i32),
    /// Only years outside the window were seen
    OutOfWindow(i32),
    /// No plausible year at all
    Missing,
}

impl YearInference {
    pub fn year(&self) -> Option<i32> {
        match self {
            Self::Found(year) => Some(*year),
            _ => None,
        }
    }
}

/// Infers the report year from text sources in priority order
///
/// The first source containing an in-window year wins; within one source
/// the last occurrence wins (`AR_2023_restated_2024.pdf` is a 2024 file).
/// Only standalone four-digit runs count, so `120245` is never read as a
/// year.
///
/// # Examples
///
/// ```
/// use filing_finder::crawler::{infer_year, YearInference, YearWindow};
///
/// let window = YearWindow::new(2015, 2025);
/// let year = infer_year(&["Annual_Report_2024.pdf", "Annual report 2023"], window);
/// assert_eq!(year, YearInference::Found(2024));
/// ```
pub fn infer_year(sources: &[&str], window: YearWindow) -> YearInference {
    let mut out_of_window = None;

    for source in sources {
        let mut found = None;

        for m in DIGIT_RUN.find_iter(source) {
            if m.as_str().len() != 4 {
                continue;
            }
            let Ok(year) = m.as_str().parse::<i32>() else {
                continue;
            };
            if window.contains(year) {
                found = Some(year);
            } else if (1900..=2099).contains(&year) && out_of_window.is_none() {
                out_of_window = Some(year);
            }
        }

        if let Some(year) = found {
            return YearInference::Found(year);
        }
    }

    match out_of_window {
        Some(year) => YearInference::OutOfWindow(year),
        None => YearInference::Missing,
    }
}

const QUARTERLY_KEYWORDS: &[&str] = &[
    "q1", "q2", "q3", "q4", "h1", "h2", "1q", "2q", "3q", "4q", "quarter", "quarterly",
    "interim", "half year", "halfyear", "semi annual", "semiannual", "nine months", "9m",
    "trading update",
];

const TRANSPARENCY_KEYWORDS: &[&str] = &[
    "transparency", "disclosure", "disclosures", "pillar 3", "pillar3",
];

const FORM_20F_KEYWORDS: &[&str] = &["20 f", "20f", "form 20"];

const ANNUAL_KEYWORDS: &[&str] = &[
    "annual", "annual report", "ar", "yearly", "year end", "full year", "fy",
    "financial statements", "annual accounts", "jaarverslag", "geschaeftsbericht",
    "rapport annuel",
];

const INTEGRATED_KEYWORDS: &[&str] = &["integrated"];

const SUSTAINABILITY_KEYWORDS: &[&str] = &[
    "sustainability", "esg", "csr", "responsibility", "impact report", "non financial",
];

const CONSOLIDATED_KEYWORDS: &[&str] = &["consolidated", "group"];

const INDIVIDUAL_KEYWORDS: &[&str] = &[
    "individual", "parent company", "standalone", "stand alone", "separate", "statutory",
    "company only", "single entity",
];

/// Lowercases, turns every non-alphanumeric run into one space and pads
/// both ends so keywords can be matched as whole words
fn normalize_words(parts: &[&str]) -> String {
    let mut out = String::from(" ");
    for part in parts {
        for c in part.chars() {
            if c.is_alphanumeric() {
                out.extend(c.to_lowercase());
            } else if !out.ends_with(' ') {
                out.push(' ');
            }
        }
        if !out.ends_with(' ') {
            out.push(' ');
        }
    }
    out
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords
        .iter()
        .any(|kw| text.contains(&format!(" {} ", kw)))
}

fn classify_type(text: &str) -> Option<ReportType> {
    if contains_any(text, QUARTERLY_KEYWORDS) {
        Some(ReportType::Quarterly)
    } else if contains_any(text, TRANSPARENCY_KEYWORDS) {
        Some(ReportType::Transparency)
    } else if contains_any(text, FORM_20F_KEYWORDS) {
        Some(ReportType::Form20F)
    } else if contains_any(text, ANNUAL_KEYWORDS) {
        Some(ReportType::Annual)
    } else if contains_any(text, INTEGRATED_KEYWORDS) {
        Some(ReportType::Integrated)
    } else if contains_any(text, SUSTAINABILITY_KEYWORDS) {
        Some(ReportType::Sustainability)
    } else {
        None
    }
}

/// Infers the report type
///
/// `primary` (filename and link text) is consulted first; `secondary`
/// (surrounding context and URL path) only when the primary text names no
/// type. Interim and transparency markers are checked before the regular
/// types, so "Q4 annual results" is Quarterly.
pub fn infer_report_type(primary: &[&str], secondary: &[&str]) -> ReportType {
    classify_type(&normalize_words(primary))
        .or_else(|| classify_type(&normalize_words(secondary)))
        .unwrap_or(ReportType::Other)
}

fn classify_scope(text: &str) -> Option<Scope> {
    if contains_any(text, CONSOLIDATED_KEYWORDS) {
        Some(Scope::Consolidated)
    } else if contains_any(text, INDIVIDUAL_KEYWORDS) {
        Some(Scope::Individual)
    } else {
        None
    }
}

/// Infers the statement scope with the same primary/secondary precedence
pub fn infer_scope(primary: &[&str], secondary: &[&str]) -> Scope {
    classify_scope(&normalize_words(primary))
        .or_else(|| classify_scope(&normalize_words(secondary)))
        .unwrap_or(Scope::Unknown)
}
