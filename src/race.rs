//! Time-windowed duplicate request detection
//!
//! Keeps the projections of recently completed requests, oldest first, and
//! answers whether a `(url, method)` pair already completed within the last
//! `window_ms`. Memory is bounded by time rather than count: under sustained
//! traffic the window holds whatever completed within one window length.

use crate::record::SessionWindowEntry;
use std::collections::VecDeque;

/// Sliding window of recent request signatures
#[derive(Debug, Clone)]
pub struct RaceCorrelator {
    window_ms: f64,
    entries: VecDeque<SessionWindowEntry>,
}

impl RaceCorrelator {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            entries: VecDeque::new(),
        }
    }

    pub fn window_ms(&self) -> f64 {
        self.window_ms
    }

    /// Evict expired entries, then look for an earlier identical request
    ///
    /// Only entries already in the window are consulted, so a request never
    /// matches itself or anything that completes after it.
    pub fn seen_within_window(&mut self, now: f64, url: &str, method: &str) -> bool {
        self.evict_before(now - self.window_ms);
        self.entries
            .iter()
            .any(|entry| entry.url == url && entry.method == method)
    }

    /// Append the projection of a request that was just classified
    ///
    /// Entries stay sorted by time: one stamped earlier than the newest
    /// entry takes the newest entry's time, so eviction from the front
    /// never strands an expired entry behind a fresh one.
    pub fn observe(&mut self, mut entry: SessionWindowEntry) {
        if let Some(last) = self.entries.back() {
            entry.monotonic_time = entry.monotonic_time.max(last.monotonic_time);
        }
        self.entries.push_back(entry);
    }

    fn evict_before(&mut self, cutoff: f64) {
        while let Some(front) = self.entries.front() {
            if front.monotonic_time < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
