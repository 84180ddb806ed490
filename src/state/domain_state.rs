use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Per-domain request bookkeeping used for politeness
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of requests made to this domain in the current crawl
    pub request_count: u32,

    /// Time of the last request slot handed out for this domain
    pub last_request_time: Option<Instant>,

    /// `Crawl-delay` advertised by the domain's robots.txt
    pub crawl_delay: Option<Duration>,

    /// Whether this domain has answered HTTP 429
    pub rate_limited: bool,
}

impl DomainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum gap between two requests to this domain
    ///
    /// The configured delay is raised to the robots.txt `Crawl-delay` and
    /// doubled once the domain has rate limited us.
    pub fn min_delay(&self, base: Duration) -> Duration {
        let delay = match self.crawl_delay {
            Some(crawl_delay) => base.max(crawl_delay),
            None => base,
        };
        if self.rate_limited {
            delay * 2
        } else {
            delay
        }
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, base: Duration, now: Instant) -> Option<Duration> {
        let next = self.last_request_time? + self.min_delay(base);
        (next > now).then(|| next - now)
    }

    /// Reserves the next request slot and returns when it starts
    ///
    /// Slots are handed out back to back, so concurrent callers for the same
    /// domain are spaced by the minimum delay even before any of them fire.
    pub fn reserve(&mut self, base: Duration, now: Instant) -> Instant {
        let slot = now + self.time_until_next_request(base, now).unwrap_or_default();
        self.request_count += 1;
        self.last_request_time = Some(slot);
        slot
    }
}

/// Shared politeness throttle for one crawl
///
/// The lock is only held while a slot is reserved; waiting happens outside
/// it.
#[derive(Debug)]
pub struct DomainThrottle {
    delay: Duration,
    domains: Mutex<HashMap<String, DomainState>>,
}

impl DomainThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a request to `domain` is allowed
    pub async fn acquire(&self, domain: &str) {
        let slot = {
            let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
            domains
                .entry(domain.to_string())
                .or_default()
                .reserve(self.delay, Instant::now())
        };

        if slot > Instant::now() {
            tracing::trace!("Waiting for politeness slot on {}", domain);
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Records a `Crawl-delay` for a domain
    pub fn set_crawl_delay(&self, domain: &str, delay: Duration) {
        let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        domains.entry(domain.to_string()).or_default().crawl_delay = Some(delay);
    }

    /// Marks a domain as rate limited, doubling its delay for the rest of the crawl
    pub fn mark_rate_limited(&self, domain: &str) {
        let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        let state = domains.entry(domain.to_string()).or_default();
        if !state.rate_limited {
            tracing::warn!("Domain {} is rate limiting requests, slowing down", domain);
            state.rate_limited = true;
        }
    }

    /// Number of requests issued per domain so far
    pub fn request_counts(&self) -> HashMap<String, u32> {
        let domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        domains
            .iter()
            .map(|(domain, state)| (domain.clone(), state.request_count))
            .collect()
    }
}
