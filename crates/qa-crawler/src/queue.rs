use std::cmp::Ordering;

use crate::config::UrlPriority;

/// An entry in the crawl's priority queue.
///
/// Ordering is `(priority ASC, enqueue_time ASC)` — lower priority value and
/// earlier enqueue time sort first. [`std::collections::BinaryHeap`] is a
/// max-heap, so `Ord` is implemented inverted (smaller priority compares
/// greater) to make the heap behave as the required min-heap.
#[derive(Debug, Clone)]
pub struct CrawlQueueItem {
    pub url: String,
    pub priority: UrlPriority,
    pub depth: u32,
    pub parent_url: Option<String>,
    pub retry_count: u32,
    pub enqueued_at: u64,
}

impl CrawlQueueItem {
    pub fn new(url: impl Into<String>, priority: UrlPriority, depth: u32, parent_url: Option<String>, enqueued_at: u64) -> Self {
        Self {
            url: url.into(),
            priority,
            depth,
            parent_url,
            retry_count: 0,
            enqueued_at,
        }
    }
}

impl PartialEq for CrawlQueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.enqueued_at == other.enqueued_at
    }
}

impl Eq for CrawlQueueItem {}

impl PartialOrd for CrawlQueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CrawlQueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BinaryHeap;

    use super::*;

    #[test]
    fn heap_pops_lowest_priority_value_first() {
        let mut heap = BinaryHeap::new();
        heap.push(CrawlQueueItem::new("https://a", UrlPriority::Medium, 0, None, 1));
        heap.push(CrawlQueueItem::new("https://b", UrlPriority::Critical, 0, None, 2));
        heap.push(CrawlQueueItem::new("https://c", UrlPriority::High, 0, None, 3));

        let mut order = Vec::new();
        while let Some(item) = heap.pop() {
            order.push(item.url);
        }
        assert_eq!(order, vec!["https://b", "https://c", "https://a"]);
    }

    #[test]
    fn equal_priority_breaks_tie_by_earlier_enqueue_time() {
        let mut heap = BinaryHeap::new();
        heap.push(CrawlQueueItem::new("https://later", UrlPriority::Medium, 0, None, 5));
        heap.push(CrawlQueueItem::new("https://earlier", UrlPriority::Medium, 0, None, 1));

        assert_eq!(heap.pop().unwrap().url, "https://earlier");
    }
}
