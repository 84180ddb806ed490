//! Crawl coordinator - breadth-first discovery for each company
//!
//! One company is crawled at a time. Each depth level is fetched
//! concurrently, bounded by `max-concurrent-fetches` and the per-domain
//! politeness delay, and the results are consumed in frontier order so the
//! discovery order of candidates never depends on network timing.

use crate::config::{CompanyEntry, Config, CrawlerConfig, PolicyConfig};
use crate::crawler::classifier::{
    classify_link, disposition_filename, extract_links, CandidateCollector, CollectOutcome,
    LinkClass,
};
use crate::crawler::fetcher::{fetch_with_retry, FetchError, FetchedContent, Fetcher, RetryPolicy};
use crate::crawler::frontier::{EnqueueOutcome, Frontier, FrontierEntry};
use crate::crawler::inference::YearWindow;
use crate::crawler::robots::RobotsCache;
use crate::document::DocumentCandidate;
use crate::state::{DomainThrottle, FetchState};
use crate::url::{canonicalize, canonicalize_url, extract_domain, UrlPolicy};
use crate::FinderError;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one frontier URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    pub url: String,
    pub depth: u32,
    pub state: FetchState,
    pub error: Option<String>,
}

/// Everything one company crawl produced
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub ticker: String,
    pub company_name: String,

    /// Candidates in discovery order
    pub candidates: Vec<DocumentCandidate>,

    /// One record per URL taken from the frontier, in frontier order
    pub fetches: Vec<FetchRecord>,

    /// True when the page or time budget cut the crawl short
    pub cancelled: bool,
}

impl CrawlReport {
    /// Number of frontier URLs that ended in `state`
    pub fn count(&self, state: FetchState) -> usize {
        self.fetches.iter().filter(|f| f.state == state).count()
    }

    /// Number of frontier URLs a request was issued for
    pub fn pages_fetched(&self) -> usize {
        self.fetches
            .iter()
            .filter(|f| !matches!(f.state, FetchState::Cancelled | FetchState::RobotsDenied))
            .count()
    }
}

/// Drives company crawls over a shared fetcher and politeness throttle
pub struct Coordinator {
    fetcher: Arc<dyn Fetcher>,
    crawler: CrawlerConfig,
    policy: PolicyConfig,
    throttle: DomainThrottle,
    robots: Option<RobotsCache>,
    retry: RetryPolicy,
    window: YearWindow,
}

impl Coordinator {
    /// Creates a coordinator with the year window anchored at today's date
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>) -> Self {
        let robots = config
            .crawler
            .respect_robots
            .then(|| RobotsCache::new(&config.user_agent.crawler_name));

        Self {
            fetcher,
            crawler: config.crawler.clone(),
            policy: config.policy.clone(),
            throttle: DomainThrottle::new(Duration::from_millis(config.crawler.politeness_delay_ms)),
            robots,
            retry: RetryPolicy::from_config(&config.crawler),
            window: YearWindow::for_today(config.crawler.years_back),
        }
    }

    /// Replaces the year window
    pub fn with_window(mut self, window: YearWindow) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> YearWindow {
        self.window
    }

    /// Crawls one company from its root URL
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl ran; individual fetch failures are in the report
    /// * `Err(FinderError)` - The company's root URL is unusable
    pub async fn crawl_company(&self, company: &CompanyEntry) -> Result<CrawlReport, FinderError> {
        let policy = UrlPolicy::for_company(company, &self.policy)?;
        let root = canonicalize_url(&company.root_url)?;

        tracing::info!(
            "Crawling {} ({}) from {}",
            company.name,
            company.ticker,
            root
        );

        let frontier = Frontier::new(self.crawler.max_depth);
        frontier.enqueue(root, 0, None);

        let deadline = Instant::now() + Duration::from_secs(self.crawler.time_budget_secs);
        let max_pages = self.crawler.max_pages as usize;
        let concurrency = self.crawler.max_concurrent_fetches.max(1) as usize;

        let mut collector = CandidateCollector::new(self.window);
        let mut fetches: Vec<FetchRecord> = Vec::new();
        let mut dispatched = 0usize;
        let mut cancelled = false;

        loop {
            let mut level = frontier.next_level();
            if level.is_empty() {
                break;
            }

            let depth = level[0].depth;
            let mut overflow = Vec::new();

            if Instant::now() >= deadline {
                tracing::warn!("Time budget exhausted for {}", company.ticker);
                overflow = std::mem::take(&mut level);
            } else if dispatched + level.len() > max_pages {
                tracing::warn!(
                    "Page budget of {} reached for {}",
                    max_pages,
                    company.ticker
                );
                overflow = level.split_off(max_pages.saturating_sub(dispatched));
            }

            dispatched += level.len();
            tracing::debug!(
                "Fetching {} URLs at depth {} for {}",
                level.len(),
                depth,
                company.ticker
            );

            let results: Vec<_> = stream::iter(level.iter())
                .map(|entry| async move {
                    tokio::time::timeout_at(deadline, self.fetch_entry(entry)).await
                })
                .buffered(concurrency)
                .collect()
                .await;

            for (entry, result) in level.iter().zip(results) {
                let record = match result {
                    Err(_) => {
                        cancelled = true;
                        cancelled_record(entry)
                    }
                    Ok(Err(e)) => {
                        frontier.mark_failed(&entry.url);
                        let state = if e == FetchError::RobotsDenied {
                            tracing::info!("Skipping {} (disallowed by robots.txt)", entry.url);
                            FetchState::RobotsDenied
                        } else {
                            tracing::warn!("Failed to fetch {}: {}", entry.url, e);
                            FetchState::Failed
                        };
                        FetchRecord {
                            url: entry.url.to_string(),
                            depth: entry.depth,
                            state,
                            error: Some(e.to_string()),
                        }
                    }
                    Ok(Ok(content)) => {
                        self.handle_content(entry, content, &policy, &frontier, &mut collector)
                    }
                };
                fetches.push(record);
            }

            if !overflow.is_empty() {
                cancelled = true;
                fetches.extend(overflow.iter().map(cancelled_record));
            }

            if cancelled {
                break;
            }
        }

        // Anything still queued was never dispatched
        while let Some(entry) = frontier.dequeue() {
            cancelled = true;
            fetches.push(cancelled_record(&entry));
        }

        let report = CrawlReport {
            ticker: company.ticker.clone(),
            company_name: company.name.clone(),
            candidates: collector.into_candidates(),
            fetches,
            cancelled,
        };

        tracing::info!(
            "Finished {}: {} pages fetched of {} seen, {} failed, {} candidates{}",
            company.ticker,
            report.pages_fetched(),
            frontier.visited_count(),
            report.count(FetchState::Failed),
            report.candidates.len(),
            if cancelled { " (budget exhausted)" } else { "" }
        );

        Ok(report)
    }

    /// Checks robots.txt and fetches one entry with retries
    async fn fetch_entry(&self, entry: &FrontierEntry) -> Result<FetchedContent, FetchError> {
        if let Some(robots) = &self.robots {
            let (rules, fetched_now) = robots.rules_for(self.fetcher.as_ref(), &entry.url).await;

            if fetched_now {
                if let (Some(delay), Some(domain)) =
                    (rules.crawl_delay(robots.agent()), extract_domain(&entry.url))
                {
                    tracing::debug!("Using Crawl-delay of {:?} for {}", delay, domain);
                    self.throttle.set_crawl_delay(&domain, delay);
                }
            }

            if !rules.is_allowed(entry.url.as_str(), robots.agent()) {
                return Err(FetchError::RobotsDenied);
            }
        }

        fetch_with_retry(self.fetcher.as_ref(), &self.throttle, &entry.url, &self.retry).await
    }

    /// Turns a successful response into candidates and new frontier entries
    fn handle_content(
        &self,
        entry: &FrontierEntry,
        content: FetchedContent,
        policy: &UrlPolicy,
        frontier: &Frontier,
        collector: &mut CandidateCollector,
    ) -> FetchRecord {
        let mut record = FetchRecord {
            url: entry.url.to_string(),
            depth: entry.depth,
            state: FetchState::Fetched,
            error: None,
        };

        if let Some(format) = content.document_format() {
            let filename = content
                .content_disposition
                .as_deref()
                .and_then(disposition_filename);
            let url = canonicalize(content.final_url.clone()).unwrap_or_else(|_| entry.url.clone());

            collector.offer(
                &url,
                format,
                &entry.link_text,
                &entry.link_context,
                filename.as_deref(),
                entry.depth,
            );
            record.state = FetchState::Document;
            return record;
        }

        let links = match extract_links(
            &content.body,
            content.content_type.as_deref(),
            &content.final_url,
        ) {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", entry.url, e);
                record.state = FetchState::ParseFailed;
                record.error = Some(e.to_string());
                return record;
            }
        };

        let mut new_pages = 0;
        for link in links {
            let Ok(url) = canonicalize(link.url) else {
                continue;
            };

            match classify_link(&url, policy) {
                LinkClass::Document(format) => {
                    if let CollectOutcome::OutOfWindow(year) =
                        collector.offer(&url, format, &link.text, &link.context, None, entry.depth)
                    {
                        tracing::trace!("{} is from {}, outside the year window", url, year);
                    }
                }
                LinkClass::Navigable => {
                    if frontier.is_failed(&url) {
                        continue;
                    }
                    let outcome = frontier.enqueue_link(
                        url,
                        entry.depth + 1,
                        entry.url.clone(),
                        &link.text,
                        &link.context,
                    );
                    if outcome == EnqueueOutcome::Accepted {
                        new_pages += 1;
                    }
                }
                LinkClass::Ignored => {
                    tracing::trace!("Ignoring link {}", url);
                }
            }
        }

        tracing::debug!("{}: {} new pages queued", entry.url, new_pages);
        record
    }
}

fn cancelled_record(entry: &FrontierEntry) -> FetchRecord {
    FetchRecord {
        url: entry.url.to_string(),
        depth: entry.depth,
        state: FetchState::Cancelled,
        error: None,
    }
}

/// Crawls every company in turn
///
/// A company whose root URL is unusable is logged and skipped; the others
/// still run.
pub async fn run_discovery(coordinator: &Coordinator, companies: &[CompanyEntry]) -> Vec<CrawlReport> {
    let mut reports = Vec::with_capacity(companies.len());

    for company in companies {
        match coordinator.crawl_company(company).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::error!("Skipping {}: {}", company.ticker, e);
            }
        }
    }

    let mut counts: Vec<_> = coordinator.throttle.request_counts().into_iter().collect();
    counts.sort();
    for (domain, count) in counts {
        tracing::debug!("{}: {} requests", domain, count);
    }

    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputConfig, UserAgentConfig};
    use crate::document::{DocumentFormat, ReportType};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use url::Url;

    /// Serves canned HTML pages and documents, counting requests per URL
    #[derive(Default)]
    struct SiteFetcher {
        pages: HashMap<String, String>,
        documents: Vec<String>,
        slow: Vec<String>,
        requests: Mutex<HashMap<String, usize>>,
    }

    impl SiteFetcher {
        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn document(mut self, url: &str) -> Self {
            self.documents.push(url.to_string());
            self
        }

        /// Answers requests for `url` only after five seconds
        fn slow(mut self, url: &str) -> Self {
            self.slow.push(url.to_string());
            self
        }

        fn requests_for(&self, url: &str) -> usize {
            self.requests.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Fetcher for SiteFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedContent, FetchError> {
            *self
                .requests
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_insert(0) += 1;

            if self.slow.contains(&url.to_string()) {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }

            if self.documents.contains(&url.to_string()) {
                return Ok(FetchedContent {
                    final_url: url.clone(),
                    content_type: Some("application/pdf".to_string()),
                    content_disposition: None,
                    body: Vec::new(),
                });
            }

            match self.pages.get(url.as_str()) {
                Some(html) => Ok(FetchedContent {
                    final_url: url.clone(),
                    content_type: Some("text/html; charset=utf-8".to_string()),
                    content_disposition: None,
                    body: html.as_bytes().to_vec(),
                }),
                None => Err(FetchError::Status(404)),
            }
        }
    }

    fn config(max_depth: u32, max_pages: u32) -> Config {
        Config {
            crawler: CrawlerConfig {
                max_depth,
                max_pages,
                politeness_delay_ms: 1,
                retry_base_delay_ms: 1,
                max_retries: 1,
                respect_robots: false,
                ..CrawlerConfig::default()
            },
            user_agent: UserAgentConfig {
                crawler_name: "FilingFinder".to_string(),
                crawler_version: "0.1".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "ops@example.com".to_string(),
            },
            ranking: Default::default(),
            consolidation: Default::default(),
            output: OutputConfig {
                database_path: "unused.db".to_string(),
                registry_path: "unused.json".to_string(),
                consolidated_path: "unused.csv".to_string(),
                quality_path: "unused_quality.csv".to_string(),
            },
            policy: PolicyConfig::default(),
            company: Vec::new(),
        }
    }

    fn company() -> CompanyEntry {
        CompanyEntry {
            name: "Example NV".to_string(),
            ticker: "EXMP".to_string(),
            root_url: "https://ir.example.com/".to_string(),
            allowed_hosts: Vec::new(),
        }
    }

    fn site() -> SiteFetcher {
        SiteFetcher::default()
            .page(
                "https://ir.example.com/",
                r#"<a href="/reports">Reports</a>
                   <a href="/reports/">Reports again</a>
                   <a href="/login">Log in</a>
                   <a href="/ar-2024.pdf">Annual report 2024</a>"#,
            )
            .page(
                "https://ir.example.com/reports",
                r#"<a href="/">Home</a>
                   <a href="/archive">Archive</a>
                   <a href="/ar-2023.xlsx">Annual report 2023</a>"#,
            )
            .page(
                "https://ir.example.com/archive",
                r#"<a href="/deep">Deeper</a><a href="/ar-2019.pdf">AR 2019</a>"#,
            )
            .page("https://ir.example.com/deep", "<p>deep</p>")
    }

    fn coordinator(fetcher: Arc<dyn Fetcher>, max_depth: u32, max_pages: u32) -> Coordinator {
        Coordinator::new(&config(max_depth, max_pages), fetcher)
            .with_window(YearWindow::new(2015, 2025))
    }

    #[tokio::test]
    async fn test_collects_documents_in_discovery_order() {
        let fetcher = Arc::new(site());
        let report = coordinator(fetcher.clone(), 2, 100)
            .crawl_company(&company())
            .await
            .unwrap();

        let urls: Vec<_> = report.candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://ir.example.com/ar-2024.pdf",
                "https://ir.example.com/ar-2023.xlsx",
                "https://ir.example.com/ar-2019.pdf",
            ]
        );
        assert_eq!(report.candidates[1].format, DocumentFormat::Xlsx);
        assert_eq!(report.candidates[1].depth, 1);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_depth_bound_and_no_double_fetch() {
        let fetcher = Arc::new(site());
        let report = coordinator(fetcher.clone(), 1, 100)
            .crawl_company(&company())
            .await
            .unwrap();

        assert!(report.fetches.iter().all(|f| f.depth <= 1));
        assert_eq!(fetcher.requests_for("https://ir.example.com/"), 1);
        assert_eq!(fetcher.requests_for("https://ir.example.com/reports"), 1);
        assert_eq!(fetcher.requests_for("https://ir.example.com/archive"), 0);
        assert_eq!(fetcher.requests_for("https://ir.example.com/login"), 0);
        // documents are collected from links, not fetched
        assert_eq!(fetcher.requests_for("https://ir.example.com/ar-2024.pdf"), 0);
    }

    #[tokio::test]
    async fn test_page_budget_cancels_rest() {
        let fetcher = Arc::new(site());
        let report = coordinator(fetcher.clone(), 3, 2)
            .crawl_company(&company())
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.pages_fetched(), 2);
        assert!(report.count(FetchState::Cancelled) >= 1);
        // documents found before the budget ran out are kept
        assert_eq!(report.candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_fatal() {
        let fetcher = Arc::new(
            SiteFetcher::default()
                .page(
                    "https://ir.example.com/",
                    r#"<a href="/missing">Gone</a><a href="/ok">Fine</a>"#,
                )
                .page("https://ir.example.com/ok", r#"<a href="/ar-2022.pdf">AR</a>"#),
        );
        let report = coordinator(fetcher, 2, 100)
            .crawl_company(&company())
            .await
            .unwrap();

        assert_eq!(report.count(FetchState::Failed), 1);
        assert_eq!(report.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_document_response_becomes_candidate() {
        let fetcher = Arc::new(
            SiteFetcher::default()
                .page(
                    "https://ir.example.com/",
                    r#"<a href="/download/annual-report-2021">Annual report 2021</a>"#,
                )
                .document("https://ir.example.com/download/annual-report-2021"),
        );
        let report = coordinator(fetcher, 2, 100)
            .crawl_company(&company())
            .await
            .unwrap();

        assert_eq!(report.count(FetchState::Document), 1);
        assert_eq!(report.candidates[0].inferred_year, Some(2021));
        assert_eq!(report.candidates[0].format, DocumentFormat::Pdf);
    }

    #[tokio::test]
    async fn test_extensionless_document_keeps_link_label() {
        let fetcher = Arc::new(
            SiteFetcher::default()
                .page(
                    "https://ir.example.com/",
                    r#"<p>Integrated reporting <a href="/download/123">Annual report 2021</a></p>"#,
                )
                .document("https://ir.example.com/download/123"),
        );
        let report = coordinator(fetcher, 2, 100)
            .crawl_company(&company())
            .await
            .unwrap();

        assert_eq!(report.count(FetchState::Document), 1);
        let candidate = &report.candidates[0];
        assert_eq!(candidate.url, "https://ir.example.com/download/123");
        assert_eq!(candidate.title, "Annual report 2021");
        assert_eq!(candidate.inferred_year, Some(2021));
        assert_eq!(candidate.report_type, ReportType::Annual);
        assert_eq!(candidate.depth, 1);
    }

    #[tokio::test]
    async fn test_time_budget_keeps_collected_candidates() {
        let fetcher = Arc::new(
            SiteFetcher::default()
                .page(
                    "https://ir.example.com/",
                    r#"<a href="/ar-2024.pdf">Annual report 2024</a>
                       <a href="/archive">Archive</a>"#,
                )
                .page(
                    "https://ir.example.com/archive",
                    r#"<a href="/ar-2023.pdf">Annual report 2023</a>"#,
                )
                .slow("https://ir.example.com/archive"),
        );
        let mut config = config(2, 100);
        config.crawler.time_budget_secs = 1;
        let coordinator =
            Coordinator::new(&config, fetcher).with_window(YearWindow::new(2015, 2025));

        let started = std::time::Instant::now();
        let report = coordinator.crawl_company(&company()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(report.cancelled);
        assert_eq!(report.count(FetchState::Fetched), 1);
        assert_eq!(report.count(FetchState::Cancelled), 1);
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].inferred_year, Some(2024));

        let buckets = crate::ranker::rank_company("EXMP", &report.candidates, &config.ranking);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].year, 2024);
    }

    #[tokio::test]
    async fn test_run_discovery_skips_bad_company() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(site());
        let coordinator = coordinator(fetcher, 1, 100);
        let mut bad = company();
        bad.ticker = "BAD".to_string();
        bad.root_url = "ftp://ir.example.com/".to_string();

        let reports = run_discovery(&coordinator, &[bad, company()]).await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].ticker, "EXMP");
    }
}
