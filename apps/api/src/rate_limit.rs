//! Contact-form throttling.
//!
//! `AppState` holds an `Arc<dyn RateLimitStore>`. The in-memory sliding window
//! below is only correct for a single process; a shared backend can be dropped
//! in behind the same trait.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::RateLimitConfig;

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    /// Whole seconds a limited caller should wait, rounded up and never zero.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            RateLimitDecision::Allowed { .. } => None,
            RateLimitDecision::Limited { retry_after } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
        }
    }
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Checks `key` and, when allowed, records a hit for it.
    async fn check_and_record(&self, key: &str) -> RateLimitDecision;
}

/// Composite key: client address plus the normalized submitter email.
pub fn rate_limit_key(client: &str, email: &str) -> String {
    format!("{}|{}", client, email.trim().to_lowercase())
}

pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    ledger: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut ledger = self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Opportunistic sweep so one-off clients do not accumulate forever.
        if ledger.len() > 1024 {
            ledger.retain(|_, history| {
                prune(history, now, self.window);
                !history.is_empty()
            });
        }

        let history = ledger.entry(key.to_string()).or_default();
        prune(history, now, self.window);

        if history.len() >= self.max_requests {
            let oldest = history.front().copied().unwrap_or(now);
            let retry_after = (oldest + self.window).saturating_duration_since(now);
            return RateLimitDecision::Limited { retry_after };
        }

        history.push_back(now);
        RateLimitDecision::Allowed {
            remaining: self.max_requests - history.len(),
        }
    }

    #[cfg(test)]
    pub fn tracked_keys(&self) -> usize {
        self.ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl RateLimitStore for SlidingWindowLimiter {
    async fn check_and_record(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }
}

/// Drops timestamps that have left the trailing window.
fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = history.front() {
        if now.saturating_duration_since(oldest) >= window {
            history.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(RateLimitConfig::default())
    }

    #[test]
    fn test_key_normalizes_email() {
        assert_eq!(
            rate_limit_key("10.0.0.1", "  Ana@Example.COM "),
            "10.0.0.1|ana@example.com"
        );
    }

    #[test]
    fn test_fourth_request_in_window_is_limited() {
        let limiter = limiter();
        let start = Instant::now();

        for i in 0..3 {
            let decision = limiter.check_at("k", start + Duration::from_secs(i * 10));
            assert!(matches!(decision, RateLimitDecision::Allowed { .. }));
        }

        let decision = limiter.check_at("k", start + Duration::from_secs(30));
        let secs = decision.retry_after_seconds().unwrap();
        // Oldest hit at t=0 leaves the window at t=60.
        assert_eq!(secs, 30);
        assert!(secs > 0 && secs <= 60);
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = limiter();
        let now = Instant::now();
        assert_eq!(limiter.check_at("k", now), RateLimitDecision::Allowed { remaining: 2 });
        assert_eq!(limiter.check_at("k", now), RateLimitDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at("k", now), RateLimitDecision::Allowed { remaining: 0 });
    }

    #[test]
    fn test_window_elapses_and_client_recovers() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..3 {
            limiter.check_at("k", start);
        }
        assert!(limiter.check_at("k", start + Duration::from_secs(59)).retry_after_seconds().is_some());

        let later = start + Duration::from_secs(60);
        assert!(matches!(
            limiter.check_at("k", later),
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_limited_attempts_are_not_recorded() {
        let limiter = limiter();
        let start = Instant::now();
        for _ in 0..3 {
            limiter.check_at("k", start);
        }
        for s in 1..10 {
            limiter.check_at("k", start + Duration::from_secs(s));
        }
        // Blocked attempts did not extend the window.
        assert!(matches!(
            limiter.check_at("k", start + Duration::from_secs(60)),
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter();
        let now = Instant::now();
        for _ in 0..3 {
            limiter.check_at("a", now);
        }
        assert!(limiter.check_at("a", now).retry_after_seconds().is_some());
        assert!(limiter.check_at("b", now).retry_after_seconds().is_none());
    }

    #[test]
    fn test_sub_second_wait_rounds_up() {
        let decision = RateLimitDecision::Limited {
            retry_after: Duration::from_millis(200),
        };
        assert_eq!(decision.retry_after_seconds(), Some(1));
    }

    #[test]
    fn test_stale_keys_are_swept() {
        let limiter = limiter();
        let start = Instant::now();
        for i in 0..1100 {
            limiter.check_at(&format!("client-{i}"), start);
        }
        limiter.check_at("fresh", start + Duration::from_secs(120));
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
