//! # Feature: Rate Limiting
//!
//! Sliding-window request limits per (action, subject) pair, stored in a
//! DashMap for lock-free concurrent access from request handlers. Used to cap
//! how often one email address can trigger a confirmation message.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Keys are (action, subject) so unrelated limits never collide
//! - 1.0.0: Initial release with per-email sliding window

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Composite key for rate limiting: (action, subject)
type RateLimitKey = (&'static str, String);

#[derive(Clone)]
pub struct RateLimiter {
    requests: DashMap<RateLimitKey, Vec<Instant>>,
    max_requests: usize,
    time_window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, time_window: Duration) -> Self {
        RateLimiter {
            requests: DashMap::new(),
            max_requests,
            time_window,
        }
    }

    /// Record an attempt and report whether it is within the limit.
    /// Rejected attempts are not recorded.
    pub fn check_rate_limit(&self, action: &'static str, subject: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .requests
            .entry((action, subject.to_lowercase()))
            .or_default();

        entry.retain(|&time| now.duration_since(time) < self.time_window);

        if entry.len() >= self.max_requests {
            false
        } else {
            entry.push(now);
            true
        }
    }

    /// Drop keys whose attempts have all aged out of the window.
    pub fn prune(&self) {
        let now = Instant::now();
        self.requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < self.time_window);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.requests.len()
    }
}
