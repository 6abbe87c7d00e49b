//! Per-client admission control over a rolling window.
//!
//! Counters live behind the [`CounterStore`] trait so the process-local
//! default can be replaced by a shared store without touching callers.
//! [`InMemoryCounterStore`] is not durable: a restart forgets every client.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::Error;
use crate::config::AppConfig;

/// Clients tracked before idle entries are swept on the next acquire.
const SWEEP_THRESHOLD: usize = 1024;

/// Outcome of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed { .. })
    }
}

/// Storage for per-client request timestamps.
///
/// `try_acquire` must be atomic per client: two concurrent calls for the same
/// client can never both take the last slot.
pub trait CounterStore: Send + Sync + Debug {
    /// Admit `client` at `now` if fewer than `limit` admitted requests fall
    /// inside the trailing `window`. Denied attempts are not recorded.
    fn try_acquire(&self, client: &str, now: Instant, window: Duration, limit: u32) -> Admission;

    /// Forget one client's history. Returns true if the client was tracked.
    fn reset(&self, client: &str) -> bool;
}

/// Sliding-log counters in a mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clients currently tracked.
    #[cfg(test)]
    pub(crate) fn tracked_clients(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn try_acquire(&self, client: &str, now: Instant, window: Duration, limit: u32) -> Admission {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, hits| hits.back().is_some_and(|t| now.duration_since(*t) < window));
        }

        let hits = windows.entry(client.to_string()).or_default();
        while hits.front().is_some_and(|t| now.duration_since(*t) >= window) {
            hits.pop_front();
        }

        if hits.len() < limit as usize {
            hits.push_back(now);
            return Admission::Allowed { remaining: limit - hits.len() as u32 };
        }

        let retry_after = hits
            .front()
            .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(window);
        Admission::Denied { retry_after }
    }

    fn reset(&self, client: &str) -> bool {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(client)
            .is_some()
    }
}

/// Bounds requests per client identity within a rolling window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    /// Limiter backed by a fresh in-memory store.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_store(Arc::new(InMemoryCounterStore::new()), limit, window)
    }

    pub fn with_store(store: Arc<dyn CounterStore>, limit: u32, window: Duration) -> Self {
        Self { store, limit, window }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.rate_limit_max_requests, config.rate_limit_window())
    }

    pub fn admit(&self, client: &str) -> Admission {
        self.admit_at(client, Instant::now())
    }

    pub fn admit_at(&self, client: &str, now: Instant) -> Admission {
        let admission = self.store.try_acquire(client, now, self.window, self.limit);
        if let Admission::Denied { retry_after } = admission {
            tracing::warn!(client, retry_after_ms = retry_after.as_millis() as u64, "rate limit exceeded");
        }
        admission
    }

    /// Admit or fail with [`Error::RateLimited`].
    pub fn check(&self, client: &str) -> Result<(), Error> {
        match self.admit(client) {
            Admission::Allowed { .. } => Ok(()),
            Admission::Denied { retry_after } => Err(Error::RateLimited(format!(
                "too many requests from {client}; retry in {}s",
                retry_after.as_secs().max(1)
            ))),
        }
    }

    /// Clear one client's counter. Only affects this process.
    pub fn reset(&self, client: &str) -> bool {
        self.store.reset(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_exactly_limit_then_denies() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..3 {
            let admission = limiter.admit_at("10.0.0.1", start + Duration::from_millis(i));
            assert!(admission.is_allowed(), "request {i} should be admitted");
        }
        assert!(!limiter.admit_at("10.0.0.1", start + Duration::from_millis(10)).is_allowed());
    }

    #[test]
    fn test_admission_resumes_after_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.admit_at("c", start).is_allowed());
        assert!(limiter.admit_at("c", start).is_allowed());
        assert!(!limiter.admit_at("c", start + Duration::from_secs(30)).is_allowed());
        assert!(limiter.admit_at("c", start + Duration::from_secs(60)).is_allowed());
    }

    #[test]
    fn test_remaining_and_retry_after() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        let start = Instant::now();

        assert_eq!(limiter.admit_at("c", start), Admission::Allowed { remaining: 1 });
        assert_eq!(limiter.admit_at("c", start), Admission::Allowed { remaining: 0 });
        assert_eq!(
            limiter.admit_at("c", start + Duration::from_secs(4)),
            Admission::Denied { retry_after: Duration::from_secs(6) }
        );
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.admit_at("a", now).is_allowed());
        assert!(limiter.admit_at("b", now).is_allowed());
        assert!(!limiter.admit_at("a", now).is_allowed());
    }

    #[test]
    fn test_reset_clears_client() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.admit("a").is_allowed());
        assert!(limiter.check("a").is_err());
        assert!(limiter.reset("a"));
        assert!(limiter.check("a").is_ok());
        assert!(!limiter.reset("never-seen"));
    }

    #[test]
    fn test_check_error_class() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.check("a").unwrap();
        assert!(matches!(limiter.check("a"), Err(Error::RateLimited(_))));
    }

    #[test]
    fn test_concurrent_admits_never_exceed_limit() {
        let store = Arc::new(InMemoryCounterStore::new());
        let limiter = RateLimiter::with_store(store.clone(), 50, Duration::from_secs(60));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..20).filter(|_| limiter.admit("shared").is_allowed()).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(admitted, 50);
        assert_eq!(store.tracked_clients(), 1);
    }
}
