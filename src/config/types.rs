use serde::Deserialize;

/// Main configuration structure for Filing-Finder
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub company: Vec<CompanyEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum link depth to follow from a company's root URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of fetches in flight at once
    #[serde(rename = "max-concurrent-fetches", default = "default_max_concurrent")]
    pub max_concurrent_fetches: u32,

    /// Minimum time between requests to the same domain (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,

    /// Maximum number of pages fetched per company before the crawl is cut short
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Wall-clock budget per company crawl (seconds)
    #[serde(rename = "time-budget-secs", default = "default_time_budget")]
    pub time_budget_secs: u64,

    /// Number of attempts for a retryable fetch failure
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential retry backoff (milliseconds)
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How many completed years back a report year may lie
    #[serde(rename = "years-back", default = "default_years_back")]
    pub years_back: u32,

    /// Whether robots.txt rules are honored
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Ranking thresholds
///
/// The factor weights themselves are constants in `ranker::weights`; only the
/// best/secondary split is configurable.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    /// Candidates within this many points of the top score are `best`
    #[serde(rename = "best-margin", default)]
    pub best_margin: i32,

    /// Candidates scoring below this are dropped from the registry
    #[serde(rename = "min-score", default)]
    pub min_score: i32,

    /// Maximum number of `secondary` entries kept per bucket
    #[serde(rename = "max-secondary", default = "default_max_secondary")]
    pub max_secondary: usize,
}

/// Line item merge settings
#[derive(Debug, Clone, Deserialize)]
pub struct ConsolidationConfig {
    /// Relative tolerance under which two values are considered equal
    #[serde(rename = "relative-tolerance", default = "default_relative_tolerance")]
    pub relative_tolerance: f64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path of the ranked report registry (JSON)
    #[serde(rename = "registry-path")]
    pub registry_path: String,

    /// Path of the consolidated line items (CSV)
    #[serde(rename = "consolidated-path", default = "default_consolidated_path")]
    pub consolidated_path: String,

    /// Path of the quality summary (CSV)
    #[serde(rename = "quality-path", default = "default_quality_path")]
    pub quality_path: String,
}

/// Link filtering applied before a URL enters the frontier
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Domain patterns never followed (e.g. "*.facebook.com")
    #[serde(rename = "deny-domains", default = "default_deny_domains")]
    pub deny_domains: Vec<String>,

    /// Path segments that mark a page as irrelevant (e.g. "login")
    #[serde(rename = "deny-path-segments", default = "default_deny_path_segments")]
    pub deny_path_segments: Vec<String>,
}

/// A company whose reports are searched for
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CompanyEntry {
    /// Display name
    pub name: String,

    /// Exchange ticker, used as the registry key
    pub ticker: String,

    /// Investor relations page the crawl starts from
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Additional host patterns the crawl may enter (e.g. "*.example.com")
    #[serde(rename = "allowed-hosts", default)]
    pub allowed_hosts: Vec<String>,
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_concurrent() -> u32 {
    4
}

fn default_politeness_delay() -> u64 {
    1000
}

fn default_max_pages() -> u32 {
    200
}

fn default_time_budget() -> u64 {
    600
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_years_back() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_secondary() -> usize {
    2
}

fn default_relative_tolerance() -> f64 {
    0.005
}

fn default_consolidated_path() -> String {
    "./consolidated_line_items.csv".to_string()
}

fn default_quality_path() -> String {
    "./quality_summary.csv".to_string()
}

fn default_deny_domains() -> Vec<String> {
    [
        "*.facebook.com",
        "*.fb.com",
        "*.instagram.com",
        "*.twitter.com",
        "*.x.com",
        "*.linkedin.com",
        "*.youtube.com",
        "*.youtu.be",
        "*.tiktok.com",
        "*.pinterest.com",
        "*.reddit.com",
        "*.whatsapp.com",
        "*.weibo.com",
        "*.vimeo.com",
        "*.flickr.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_deny_path_segments() -> Vec<String> {
    [
        "login", "logout", "signin", "register", "account", "profile", "search", "cart",
        "checkout", "shop", "store", "careers", "jobs", "contact", "contact-us", "privacy",
        "cookies", "terms", "legal", "sitemap", "rss", "feed", "newsletter", "subscription",
        "webcast", "podcast", "videos", "gallery",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_concurrent_fetches: default_max_concurrent(),
            politeness_delay_ms: default_politeness_delay(),
            max_pages: default_max_pages(),
            time_budget_secs: default_time_budget(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            request_timeout_secs: default_request_timeout(),
            years_back: default_years_back(),
            respect_robots: true,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            best_margin: 0,
            min_score: 0,
            max_secondary: default_max_secondary(),
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            relative_tolerance: default_relative_tolerance(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            deny_domains: default_deny_domains(),
            deny_path_segments: default_deny_path_segments(),
        }
    }
}
