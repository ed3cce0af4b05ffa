use std::collections::VecDeque;
use std::sync::Mutex;

/// Bounded in-memory set of recently processed `eventId`s, matching the
/// consumer framework's dedupe cache: at least 500, at most 1000 entries;
/// when the cap is exceeded, truncate to the most-recent half rather than
/// evicting one at a time. This is a per-process cache — it does not
/// survive a restart and is not shared across horizontally scaled workers.
pub struct DedupeCache {
    order: Mutex<VecDeque<String>>,
    max_entries: usize,
}

impl DedupeCache {
    pub fn new(max_entries: usize) -> Self {
        assert!((500..=1000).contains(&max_entries), "dedupe cache bound must be within [500, 1000]");
        Self {
            order: Mutex::new(VecDeque::new()),
            max_entries,
        }
    }

    /// True if `event_id` was already recorded as processed.
    pub fn is_duplicate(&self, event_id: &str) -> bool {
        self.order.lock().expect("dedupe cache lock poisoned").contains(&event_id.to_string())
    }

    /// Records `event_id` as processed, truncating to the most-recent half
    /// of entries if the cache has grown past `max_entries`.
    pub fn mark_processed(&self, event_id: &str) {
        let mut order = self.order.lock().expect("dedupe cache lock poisoned");
        order.push_back(event_id.to_string());
        if order.len() > self.max_entries {
            let keep = self.max_entries / 2;
            let keep_from = order.len() - keep;
            let retained: VecDeque<String> = order.iter().skip(keep_from).cloned().collect();
            *order = retained;
        }
    }

    pub fn len(&self) -> usize {
        self.order.lock().expect("dedupe cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_and_detects_duplicates() {
        let cache = DedupeCache::new(500);
        assert!(!cache.is_duplicate("evt-1"));
        cache.mark_processed("evt-1");
        assert!(cache.is_duplicate("evt-1"));
    }

    #[test]
    fn truncates_to_most_recent_half_when_exceeding_max() {
        let cache = DedupeCache::new(500);
        for i in 0..501 {
            cache.mark_processed(&format!("evt-{i}"));
        }
        assert_eq!(cache.len(), 250);
        // The most-recent half survives; the oldest ids are evicted.
        assert!(!cache.is_duplicate("evt-0"));
        assert!(cache.is_duplicate("evt-500"));
    }
}
