//! Bounded sliding-window event trackers

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Time-ordered timestamps with a fixed capacity; the oldest entry is
/// evicted on overflow.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    capacity: usize,
    events: VecDeque<DateTime<Utc>>,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, at: DateTime<Utc>) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(at);
    }

    /// Events strictly younger than `window` at `now`. Does not evict.
    pub fn count_within(&self, now: DateTime<Utc>, window: Duration) -> usize {
        self.events.iter().filter(|t| now - **t < window).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_evicted_on_overflow() {
        let start = Utc::now();
        let mut window = SlidingWindow::new(3);
        for i in 0..5 {
            window.record(start + Duration::seconds(i));
        }
        assert_eq!(window.len(), 3);
        // Only t+2..t+4 remain
        assert_eq!(window.count_within(start + Duration::seconds(4), Duration::seconds(10)), 3);
    }

    #[test]
    fn test_count_within_excludes_stale() {
        let start = Utc::now();
        let mut window = SlidingWindow::new(10);
        window.record(start);
        window.record(start + Duration::seconds(3));
        window.record(start + Duration::seconds(6));

        let now = start + Duration::seconds(7);
        assert_eq!(window.count_within(now, Duration::seconds(5)), 2);
        // Reading does not evict
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let start = Utc::now();
        let mut window = SlidingWindow::new(10);
        window.record(start);
        assert_eq!(window.count_within(start + Duration::seconds(5), Duration::seconds(5)), 0);
    }
}
