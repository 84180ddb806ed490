//! Link extraction and classification for fetched pages
//!
//! Every anchor on a page becomes a [`LinkClass`]: a report document, a page
//! to visit one level deeper, or nothing. Document links are turned into
//! [`DocumentCandidate`]s by the [`CandidateCollector`].

use crate::crawler::inference::{infer_report_type, infer_scope, infer_year, YearInference, YearWindow};
use crate::document::{DocumentCandidate, DocumentFormat};
use crate::url::UrlPolicy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Longest surrounding-context snippet kept per link, in characters
const MAX_CONTEXT_CHARS: usize = 200;

/// Why a fetched page could not be parsed for links
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("page body is not valid UTF-8")]
    Encoding,

    #[error("not an HTML page: {0}")]
    NotHtml(String),
}

/// An anchor found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Absolute URL the anchor points to
    pub url: Url,

    /// Whitespace-normalized anchor text
    pub text: String,

    /// Text of the anchor's parent element, truncated
    pub context: String,
}

/// What a link leads to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClass {
    Document(DocumentFormat),
    Navigable,
    Ignored,
}

/// Extracts all followable anchors from an HTML page, in document order
///
/// `javascript:`, `mailto:`, `tel:`, `data:` and fragment-only links are
/// skipped, as is anything that does not resolve to HTTP(S).
///
/// # Returns
///
/// * `Ok(Vec<ExtractedLink>)` - Links in page order
/// * `Err(ParseError)` - The page is not HTML or not decodable
pub fn extract_links(
    body: &[u8],
    content_type: Option<&str>,
    base_url: &Url,
) -> Result<Vec<ExtractedLink>, ParseError> {
    if let Some(content_type) = content_type {
        let lower = content_type.to_ascii_lowercase();
        if !lower.contains("html") {
            return Err(ParseError::NotHtml(content_type.to_string()));
        }
    }

    let html = std::str::from_utf8(body).map_err(|_| ParseError::Encoding)?;
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse("a[href]") else {
        return Ok(Vec::new());
    };

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(href, base_url) else {
            continue;
        };

        let mut text = collapse_whitespace(element.text());
        if text.is_empty() {
            text = element
                .value()
                .attr("title")
                .or_else(|| element.value().attr("aria-label"))
                .map(|t| collapse_whitespace(std::iter::once(t)))
                .unwrap_or_default();
        }

        let context = element
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| truncate_chars(&collapse_whitespace(parent.text()), MAX_CONTEXT_CHARS))
            .unwrap_or_default();

        links.push(ExtractedLink { url, text, context });
    }

    Ok(links)
}

/// Resolves an href against the page URL
///
/// Returns None for links that never lead to a fetchable resource.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    match base_url.join(href) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Some(url),
        _ => None,
    }
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Classifies a canonical link URL under the company's policy
///
/// Documents may live off the company's hosts (CDNs, filing agents) as long
/// as they are not denied; pages must be eligible to be followed.
pub fn classify_link(url: &Url, policy: &UrlPolicy) -> LinkClass {
    let verdict = policy.classify(url);

    match DocumentFormat::from_path(url.path()) {
        Some(format) if verdict.can_collect() => LinkClass::Document(format),
        Some(_) => LinkClass::Ignored,
        None if verdict.can_follow() => LinkClass::Navigable,
        None => LinkClass::Ignored,
    }
}

/// Extracts the filename from a `Content-Disposition` header value
///
/// `filename*=` (RFC 5987) takes precedence over `filename=`.
pub(crate) fn disposition_filename(header: &str) -> Option<String> {
    let mut plain = None;

    for part in header.split(';') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        if value.is_empty() {
            continue;
        }

        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let name = value.split_once("''").map_or(value, |(_, name)| name);
                return Some(name.replace("%20", " "));
            }
            "filename" => plain = Some(value.to_string()),
            _ => {}
        }
    }

    plain
}

/// Last path segment of a URL, with encoded spaces restored
fn url_filename(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("")
        .replace("%20", " ")
}

/// Outcome of offering a document link to the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    Added,
    /// The canonical URL was already collected
    Duplicate,
    /// Only years outside the window were found
    OutOfWindow(i32),
}

/// Accumulates document candidates for one company crawl
///
/// Candidates are numbered in the order they are offered, which is the
/// crawl's deterministic discovery order.
#[derive(Debug)]
pub struct CandidateCollector {
    window: YearWindow,
    seen: HashSet<String>,
    candidates: Vec<DocumentCandidate>,
}

impl CandidateCollector {
    pub fn new(window: YearWindow) -> Self {
        Self {
            window,
            seen: HashSet::new(),
            candidates: Vec::new(),
        }
    }

    /// Offers a document link found on a page at `depth`
    ///
    /// `filename_hint` overrides the URL's last segment, for responses that
    /// named their file in `Content-Disposition`.
    pub fn offer(
        &mut self,
        url: &Url,
        format: DocumentFormat,
        text: &str,
        context: &str,
        filename_hint: Option<&str>,
        depth: u32,
    ) -> CollectOutcome {
        if self.seen.contains(url.as_str()) {
            return CollectOutcome::Duplicate;
        }

        let filename = filename_hint
            .map(str::to_string)
            .unwrap_or_else(|| url_filename(url));
        let path = url.path();

        let inferred_year = match infer_year(&[&filename, text, context, path], self.window) {
            YearInference::Found(year) => Some(year),
            YearInference::OutOfWindow(year) => {
                tracing::debug!("Dropping {} (year {} outside window)", url, year);
                return CollectOutcome::OutOfWindow(year);
            }
            YearInference::Missing => None,
        };

        let title = if text.is_empty() {
            filename.clone()
        } else {
            text.to_string()
        };

        let candidate = DocumentCandidate {
            url: url.to_string(),
            title,
            inferred_year,
            format,
            report_type: infer_report_type(&[&filename, text], &[context, path]),
            scope: infer_scope(&[&filename, text], &[context, path]),
            depth,
            discovery_index: self.candidates.len(),
        };

        tracing::debug!(
            "Candidate #{}: {} ({}, {}, year {:?})",
            candidate.discovery_index,
            candidate.url,
            candidate.format,
            candidate.report_type,
            candidate.inferred_year
        );

        self.seen.insert(url.to_string());
        self.candidates.push(candidate);
        CollectOutcome::Added
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn into_candidates(self) -> Vec<DocumentCandidate> {
        self.candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompanyEntry, PolicyConfig};
    use crate::document::{ReportType, Scope};

    fn base_url() -> Url {
        Url::parse("https://investors.example.com/reports/").unwrap()
    }

    fn policy() -> UrlPolicy {
        let company = CompanyEntry {
            name: "Example".to_string(),
            ticker: "EXMP".to_string(),
            root_url: "https://investors.example.com/".to_string(),
            allowed_hosts: vec!["*.example.com".to_string()],
        };
        UrlPolicy::for_company(&company, &PolicyConfig::default()).unwrap()
    }

    fn window() -> YearWindow {
        YearWindow::new(2015, 2025)
    }

    #[test]
    fn test_extract_relative_and_absolute() {
        let html = br#"<html><body>
            <a href="ar-2024.pdf">Annual Report 2024</a>
            <a href="https://cdn.example.net/x.xlsx">Data</a>
        </body></html>"#;
        let links = extract_links(html, Some("text/html"), &base_url()).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url.as_str(), "https://investors.example.com/reports/ar-2024.pdf");
        assert_eq!(links[0].text, "Annual Report 2024");
        assert_eq!(links[1].url.as_str(), "https://cdn.example.net/x.xlsx");
    }

    #[test]
    fn test_skip_special_schemes() {
        let html = br##"<html><body>
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:ir@example.com">Mail</a>
            <a href="tel:+31201234567">Call</a>
            <a href="data:text/html,hi">Data</a>
            <a href="#top">Top</a>
            <a href="/ir">IR</a>
        </body></html>"##;
        let links = extract_links(html, None, &base_url()).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url.as_str(), "https://investors.example.com/ir");
    }

    #[test]
    fn test_download_links_kept() {
        let html = br#"<a href="/files/ar.pdf" download>Download</a>"#;
        let links = extract_links(html, None, &base_url()).unwrap();
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_context_from_parent() {
        let html = br#"<ul><li>Financial year 2023 <a href="/d/123">Download</a></li></ul>"#;
        let links = extract_links(html, None, &base_url()).unwrap();
        assert_eq!(links[0].context, "Financial year 2023 Download");
    }

    #[test]
    fn test_empty_text_falls_back_to_title_attribute() {
        let html = br#"<a href="/ar.pdf" title="Annual report 2022"><img src="i.png"></a>"#;
        let links = extract_links(html, None, &base_url()).unwrap();
        assert_eq!(links[0].text, "Annual report 2022");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            extract_links(&[0xff, 0xfe, 0x00], None, &base_url()),
            Err(ParseError::Encoding)
        );
        assert!(matches!(
            extract_links(b"{}", Some("application/json"), &base_url()),
            Err(ParseError::NotHtml(_))
        ));
    }

    #[test]
    fn test_classify_link() {
        let policy = policy();
        let doc = Url::parse("https://cdn.other.net/ar.pdf").unwrap();
        let page = Url::parse("https://investors.example.com/annual-reports").unwrap();
        let off_page = Url::parse("https://other.net/annual-reports").unwrap();
        let denied = Url::parse("https://investors.example.com/login").unwrap();
        let denied_doc = Url::parse("https://www.facebook.com/ar.pdf").unwrap();

        assert_eq!(classify_link(&doc, &policy), LinkClass::Document(DocumentFormat::Pdf));
        assert_eq!(classify_link(&page, &policy), LinkClass::Navigable);
        assert_eq!(classify_link(&off_page, &policy), LinkClass::Ignored);
        assert_eq!(classify_link(&denied, &policy), LinkClass::Ignored);
        assert_eq!(classify_link(&denied_doc, &policy), LinkClass::Ignored);
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename("attachment; filename=\"AR 2024.xlsx\""),
            Some("AR 2024.xlsx".to_string())
        );
        assert_eq!(
            disposition_filename("attachment; filename=a.pdf; filename*=UTF-8''Jaarverslag%202023.pdf"),
            Some("Jaarverslag 2023.pdf".to_string())
        );
        assert_eq!(disposition_filename("inline"), None);
    }

    #[test]
    fn test_collector_builds_candidate() {
        let mut collector = CandidateCollector::new(window());
        let url = Url::parse("https://investors.example.com/files/Consolidated_AR_2024.xlsx").unwrap();

        let outcome = collector.offer(&url, DocumentFormat::Xlsx, "", "", None, 1);
        assert_eq!(outcome, CollectOutcome::Added);

        let candidates = collector.into_candidates();
        let candidate = &candidates[0];
        assert_eq!(candidate.title, "Consolidated_AR_2024.xlsx");
        assert_eq!(candidate.inferred_year, Some(2024));
        assert_eq!(candidate.report_type, ReportType::Annual);
        assert_eq!(candidate.scope, Scope::Consolidated);
        assert_eq!(candidate.depth, 1);
        assert_eq!(candidate.discovery_index, 0);
    }

    #[test]
    fn test_collector_dedupes_and_numbers() {
        let mut collector = CandidateCollector::new(window());
        let a = Url::parse("https://investors.example.com/a-2023.pdf").unwrap();
        let b = Url::parse("https://investors.example.com/b-2023.pdf").unwrap();

        collector.offer(&a, DocumentFormat::Pdf, "Annual report", "", None, 1);
        assert_eq!(
            collector.offer(&a, DocumentFormat::Pdf, "Annual report", "", None, 2),
            CollectOutcome::Duplicate
        );
        collector.offer(&b, DocumentFormat::Pdf, "Annual report", "", None, 2);

        let candidates = collector.into_candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].depth, 1);
        assert_eq!(candidates[1].discovery_index, 1);
    }

    #[test]
    fn test_collector_drops_out_of_window() {
        let mut collector = CandidateCollector::new(window());
        let url = Url::parse("https://investors.example.com/ar-2009.pdf").unwrap();
        assert_eq!(
            collector.offer(&url, DocumentFormat::Pdf, "Annual report 2009", "", None, 1),
            CollectOutcome::OutOfWindow(2009)
        );
        assert!(collector.is_empty());
    }

    #[test]
    fn test_collector_keeps_missing_year() {
        let mut collector = CandidateCollector::new(window());
        let url = Url::parse("https://investors.example.com/annual-report.pdf").unwrap();
        collector.offer(&url, DocumentFormat::Pdf, "Annual report", "", None, 0);
        assert_eq!(collector.into_candidates()[0].inferred_year, None);
    }
}
