//! Robots.txt compliance
//!
//! Rules are fetched once per origin through the same [`Fetcher`] as pages
//! and kept for the lifetime of the crawl. A missing or unreadable
//! robots.txt allows everything.

use crate::crawler::fetcher::Fetcher;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Parsed robots.txt for one origin
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    content: String,
}

impl RobotsRules {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Rules that allow every URL
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks if a URL is allowed for the given user agent token
    pub fn is_allowed(&self, url: &str, agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent, url)
    }

    /// `Crawl-delay` for the agent, falling back to the `*` group
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        let agent = agent.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut group_open = false;
        let mut for_agent = None;
        let mut for_wildcard = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "user-agent" => {
                    if !group_open {
                        group.clear();
                        group_open = true;
                    }
                    group.push(value.to_lowercase());
                }
                directive => {
                    group_open = false;
                    if directive != "crawl-delay" {
                        continue;
                    }
                    let Ok(seconds) = value.parse::<f64>() else {
                        continue;
                    };
                    if !seconds.is_finite() || seconds < 0.0 {
                        continue;
                    }
                    let delay = Duration::from_secs_f64(seconds);
                    if group.iter().any(|ua| ua != "*" && agent.contains(ua.as_str())) {
                        for_agent = Some(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        for_wildcard = Some(delay);
                    }
                }
            }
        }

        for_agent.or(for_wildcard)
    }
}

/// Per-origin robots.txt cache for one crawl
#[derive(Debug)]
pub struct RobotsCache {
    agent: String,
    rules: Mutex<HashMap<String, Arc<RobotsRules>>>,
}

impl RobotsCache {
    /// Creates a cache matching rules against the given product token
    pub fn new(agent: &str) -> Self {
        Self {
            agent: agent.to_string(),
            rules: Mutex::new(HashMap::new()),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Returns the rules for a URL's origin, fetching them on first use
    ///
    /// The second element is true when the rules were fetched by this call.
    pub async fn rules_for(&self, fetcher: &dyn Fetcher, url: &Url) -> (Arc<RobotsRules>, bool) {
        let origin = url.origin().ascii_serialization();
        let mut rules = self.rules.lock().await;

        if let Some(cached) = rules.get(&origin) {
            return (Arc::clone(cached), false);
        }

        let parsed = match Url::parse(&format!("{}/robots.txt", origin)) {
            Ok(robots_url) => match fetcher.fetch(&robots_url).await {
                Ok(content) => {
                    RobotsRules::from_content(&String::from_utf8_lossy(&content.body))
                }
                Err(e) => {
                    tracing::debug!("No robots.txt for {} ({}), allowing all", origin, e);
                    RobotsRules::allow_all()
                }
            },
            Err(_) => RobotsRules::allow_all(),
        };

        let parsed = Arc::new(parsed);
        rules.insert(origin, Arc::clone(&parsed));
        (parsed, true)
    }
}
