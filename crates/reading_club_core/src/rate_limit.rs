//! crates/reading_club_core/src/rate_limit.rs
//!
//! In-memory fixed-window rate limiting for the public write endpoints.
//!
//! Each protected operation owns its own limiter instance. State lives in a
//! single process; there is no cross-instance coordination.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Per-caller counter for the current window.
#[derive(Debug, Clone, Copy)]
struct RateLimitRecord {
    count: u32,
    reset_at: Instant,
}

/// A fixed-window counter keyed by caller identity.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    ceiling: u32,
    window: Duration,
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl FixedWindowLimiter {
    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self {
            ceiling,
            window,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Records an attempt for `key` and reports whether it is allowed.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut records = self.lock();

        match records.get_mut(key) {
            Some(record) if now <= record.reset_at => {
                if record.count >= self.ceiling {
                    return false;
                }
                record.count += 1;
                true
            }
            // First attempt, or the previous window has elapsed.
            _ => {
                if self.ceiling == 0 {
                    return false;
                }
                records.insert(
                    key.to_string(),
                    RateLimitRecord {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                true
            }
        }
    }

    /// Drops every record whose window has elapsed and returns how many were removed.
    pub fn prune_expired(&self, now: Instant) -> usize {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, record| now <= record.reset_at);
        before - records.len()
    }

    /// Number of callers currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitRecord>> {
        self.records.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!("Rate limiter lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn allows_exactly_ceiling_attempts_per_window() {
        let limiter = FixedWindowLimiter::new(3, HOUR);
        let start = Instant::now();

        assert!(limiter.allow_at("10.0.0.1", start));
        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(1)));
        assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(2)));
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(3)));
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(1800)));
    }

    #[test]
    fn window_elapsing_starts_a_fresh_count() {
        let limiter = FixedWindowLimiter::new(3, HOUR);
        let start = Instant::now();
        for _ in 0..3 {
            assert!(limiter.allow_at("10.0.0.1", start));
        }
        assert!(!limiter.allow_at("10.0.0.1", start));

        let later = start + HOUR + Duration::from_millis(1);
        assert!(limiter.allow_at("10.0.0.1", later));
        assert!(limiter.allow_at("10.0.0.1", later));
        assert!(limiter.allow_at("10.0.0.1", later));
        assert!(!limiter.allow_at("10.0.0.1", later));
    }

    #[test]
    fn keys_are_counted_independently() {
        let limiter = FixedWindowLimiter::new(1, HOUR);
        let now = Instant::now();

        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }

    #[test]
    fn rejected_attempts_do_not_extend_the_window() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.allow_at("a", start));
        assert!(!limiter.allow_at("a", start + Duration::from_secs(59)));
        assert!(limiter.allow_at("a", start + Duration::from_secs(61)));
    }

    #[test]
    fn zero_ceiling_never_allows() {
        let limiter = FixedWindowLimiter::new(0, HOUR);
        assert!(!limiter.allow_at("a", Instant::now()));
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn prune_drops_only_expired_records() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();
        limiter.allow_at("old", start);
        limiter.allow_at("fresh", start + Duration::from_secs(50));

        let removed = limiter.prune_expired(start + Duration::from_secs(90));

        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys(), 1);
        // The surviving caller keeps its count.
        for _ in 0..4 {
            assert!(limiter.allow_at("fresh", start + Duration::from_secs(91)));
        }
        assert!(!limiter.allow_at("fresh", start + Duration::from_secs(92)));
    }
}
