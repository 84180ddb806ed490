//! Crawl frontier for one company
//!
//! The queue and the visited set sit behind one mutex, so the
//! test-and-insert in [`Frontier::enqueue`] is atomic: concurrent discovery
//! of the same URL yields exactly one accepted entry.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Canonical URL
    pub url: Url,

    /// Link distance from the company's root URL
    pub depth: u32,

    /// Page the URL was discovered on; None for the root
    pub parent_url: Option<Url>,

    /// Anchor text of the link that queued the URL
    pub link_text: String,

    /// Text surrounding that link
    pub link_context: String,
}

/// Result of an enqueue attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    /// Already accepted earlier in this run
    AlreadySeen,
    /// Beyond the maximum depth
    TooDeep,
}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    failed: HashSet<String>,
}

/// Breadth-first URL queue with run-scoped deduplication
#[derive(Debug)]
pub struct Frontier {
    max_depth: u32,
    inner: Mutex<FrontierInner>,
}

impl Frontier {
    pub fn new(max_depth: u32) -> Self {
        Self {
            max_depth,
            inner: Mutex::new(FrontierInner::default()),
        }
    }

    /// Queues a canonical URL unless it was seen before or is too deep
    ///
    /// Entries are appended, so with children always one level deeper than
    /// their parent the queue stays ordered by depth.
    pub fn enqueue(&self, url: Url, depth: u32, parent_url: Option<Url>) -> EnqueueOutcome {
        self.push(url, depth, parent_url, String::new(), String::new())
    }

    /// Queues a URL found on `parent`, keeping the link's label
    ///
    /// The label is what a document behind an extensionless link is later
    /// classified by.
    pub fn enqueue_link(
        &self,
        url: Url,
        depth: u32,
        parent: Url,
        text: &str,
        context: &str,
    ) -> EnqueueOutcome {
        self.push(url, depth, Some(parent), text.to_string(), context.to_string())
    }

    fn push(
        &self,
        url: Url,
        depth: u32,
        parent_url: Option<Url>,
        link_text: String,
        link_context: String,
    ) -> EnqueueOutcome {
        if depth > self.max_depth {
            return EnqueueOutcome::TooDeep;
        }

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !inner.visited.insert(url.to_string()) {
            return EnqueueOutcome::AlreadySeen;
        }

        inner.queue.push_back(FrontierEntry {
            url,
            depth,
            parent_url,
            link_text,
            link_context,
        });
        EnqueueOutcome::Accepted
    }

    /// Removes the oldest entry
    pub fn dequeue(&self) -> Option<FrontierEntry> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.queue.pop_front()
    }

    /// Removes every queued entry at the shallowest queued depth
    pub fn next_level(&self) -> Vec<FrontierEntry> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(depth) = inner.queue.front().map(|e| e.depth) else {
            return Vec::new();
        };

        let mut level = Vec::new();
        while inner.queue.front().is_some_and(|e| e.depth == depth) {
            if let Some(entry) = inner.queue.pop_front() {
                level.push(entry);
            }
        }
        level
    }

    /// Marks a URL as permanently failed for this run
    pub fn mark_failed(&self, url: &Url) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.failed.insert(url.to_string());
    }

    pub fn is_failed(&self, url: &Url) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.failed.contains(url.as_str())
    }

    /// Number of entries still queued
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct URLs accepted in this run
    pub fn visited_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://investors.example.com{}", path)).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let frontier = Frontier::new(2);
        frontier.enqueue(url("/"), 0, None);
        frontier.enqueue(url("/a"), 1, Some(url("/")));
        frontier.enqueue(url("/b"), 1, Some(url("/")));

        assert_eq!(frontier.dequeue().unwrap().url, url("/"));
        assert_eq!(frontier.dequeue().unwrap().url, url("/a"));
        assert_eq!(frontier.dequeue().unwrap().url, url("/b"));
        assert!(frontier.dequeue().is_none());
    }

    #[test]
    fn test_rejects_duplicates() {
        let frontier = Frontier::new(2);
        assert_eq!(frontier.enqueue(url("/a"), 1, None), EnqueueOutcome::Accepted);
        assert_eq!(frontier.enqueue(url("/a"), 2, None), EnqueueOutcome::AlreadySeen);
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_dequeued_urls_stay_visited() {
        let frontier = Frontier::new(2);
        frontier.enqueue(url("/a"), 0, None);
        frontier.dequeue();
        assert_eq!(frontier.enqueue(url("/a"), 1, None), EnqueueOutcome::AlreadySeen);
        assert_eq!(frontier.visited_count(), 1);
    }

    #[test]
    fn test_depth_bound() {
        let frontier = Frontier::new(1);
        assert_eq!(frontier.enqueue(url("/a"), 1, None), EnqueueOutcome::Accepted);
        assert_eq!(frontier.enqueue(url("/b"), 2, None), EnqueueOutcome::TooDeep);
        // a rejected URL can still be accepted at an allowed depth
        assert_eq!(frontier.enqueue(url("/b"), 1, None), EnqueueOutcome::Accepted);
    }

    #[test]
    fn test_enqueue_link_keeps_label() {
        let frontier = Frontier::new(2);
        frontier.enqueue(url("/"), 0, None);
        frontier.enqueue_link(url("/download/123"), 1, url("/"), "Annual report 2021", "Reports 2021");

        let root = frontier.dequeue().unwrap();
        assert!(root.link_text.is_empty());
        let entry = frontier.dequeue().unwrap();
        assert_eq!(entry.parent_url, Some(url("/")));
        assert_eq!(entry.link_text, "Annual report 2021");
        assert_eq!(entry.link_context, "Reports 2021");
    }

    #[test]
    fn test_next_level_takes_one_depth() {
        let frontier = Frontier::new(3);
        frontier.enqueue(url("/a"), 1, None);
        frontier.enqueue(url("/b"), 1, None);
        frontier.enqueue(url("/c"), 2, None);

        let level = frontier.next_level();
        assert_eq!(level.len(), 2);
        assert!(level.iter().all(|e| e.depth == 1));
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.next_level()[0].url, url("/c"));
        assert!(frontier.next_level().is_empty());
    }

    #[test]
    fn test_mark_failed() {
        let frontier = Frontier::new(1);
        frontier.mark_failed(&url("/broken"));
        assert!(frontier.is_failed(&url("/broken")));
        assert!(!frontier.is_failed(&url("/fine")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enqueue_accepts_once() {
        let frontier = Arc::new(Frontier::new(2));
        let mut handles = Vec::new();

        for _ in 0..16 {
            let frontier = Arc::clone(&frontier);
            handles.push(tokio::spawn(async move {
                frontier.enqueue(url("/annual-reports"), 1, None)
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() == EnqueueOutcome::Accepted {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(frontier.len(), 1);
    }
}
