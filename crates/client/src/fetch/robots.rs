//! robots.txt compliance with per-host caching.
//!
//! Only consulted when `respect_robots` is enabled. A missing robots.txt
//! (any 4xx) allows everything.

use robotstxt_rs::RobotsTxt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// TTL for a cached robots.txt (24 hours).
const ROBOTS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Maximum size of robots.txt to fetch (1MB).
const MAX_ROBOTS_SIZE: usize = 1024 * 1024;

/// Error type for robots.txt operations.
#[derive(Debug, thiserror::Error)]
pub enum RobotsError {
    #[error("robots.txt disallowed: {path} (robots_url: {robots_url})")]
    Disallowed { path: String, robots_url: String },

    #[error("failed to fetch robots.txt: {0}")]
    FetchError(String),

    #[error("robots.txt too large")]
    TooLarge,
}

struct CachedRobots {
    robots: RobotsTxt,
    fetched_at: Instant,
}

/// The path-and-query form robots.txt rules are matched against.
fn request_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

impl CachedRobots {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > ROBOTS_TTL
    }
}

/// In-memory robots.txt cache keyed by `scheme://host/robots.txt`.
pub struct RobotsCache {
    cache: RwLock<HashMap<String, CachedRobots>>,
    user_agent: String,
    http: reqwest::Client,
}

impl RobotsCache {
    /// Create a cache that fetches with the given client.
    pub fn new(user_agent: String, http: reqwest::Client) -> Self {
        Self { cache: RwLock::new(HashMap::new()), user_agent, http }
    }

    /// Fail with `Disallowed` unless robots.txt permits fetching `url`.
    pub async fn check(&self, url: &Url) -> Result<(), RobotsError> {
        let robots_url = format!("{}://{}/robots.txt", url.scheme(), url.host_str().unwrap_or(""));
        let target = request_target(url);

        let cached_verdict = {
            let cache = self.cache.read().await;
            cache
                .get(&robots_url)
                .filter(|cached| !cached.is_expired())
                .map(|cached| cached.robots.can_fetch(&self.user_agent, &target))
        };

        let allowed = match cached_verdict {
            Some(allowed) => {
                tracing::debug!(robots_url = %robots_url, allowed, "robots.txt cache hit");
                allowed
            }
            None => {
                let robots = self.fetch_robots(&robots_url).await?;
                let allowed = robots.can_fetch(&self.user_agent, &target);
                self.cleanup_expired().await;
                self.cache
                    .write()
                    .await
                    .insert(robots_url.clone(), CachedRobots { robots, fetched_at: Instant::now() });
                allowed
            }
        };

        if allowed { Ok(()) } else { Err(RobotsError::Disallowed { path: target, robots_url }) }
    }

    async fn fetch_robots(&self, url: &str) -> Result<RobotsTxt, RobotsError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RobotsError::FetchError(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            tracing::debug!("robots.txt not found for {}, allowing all", url);
            return Ok(RobotsTxt::parse(""));
        }
        if !status.is_success() {
            return Err(RobotsError::FetchError(format!("status {}", status)));
        }

        if response.content_length().is_some_and(|len| len as usize > MAX_ROBOTS_SIZE) {
            return Err(RobotsError::TooLarge);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RobotsError::FetchError(e.to_string()))?;
        if bytes.len() > MAX_ROBOTS_SIZE {
            return Err(RobotsError::TooLarge);
        }

        Ok(RobotsTxt::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// Drop expired entries.
    pub async fn cleanup_expired(&self) {
        self.cache.write().await.retain(|_, cached| !cached.is_expired());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_robots_expiry() {
        let robots = RobotsTxt::parse("User-agent: *\nAllow: /");
        let mut cached = CachedRobots { robots, fetched_at: Instant::now() };
        assert!(!cached.is_expired());

        cached.fetched_at = Instant::now() - ROBOTS_TTL - Duration::from_secs(1);
        assert!(cached.is_expired());
    }

    #[tokio::test]
    async fn test_cached_disallow_is_enforced() {
        let cache = RobotsCache::new("itemmeta".to_string(), reqwest::Client::new());
        cache.cache.write().await.insert(
            "https://shop.example.com/robots.txt".to_string(),
            CachedRobots {
                robots: RobotsTxt::parse("User-agent: *\nDisallow: /private/"),
                fetched_at: Instant::now(),
            },
        );

        let blocked = Url::parse("https://shop.example.com/private/item").unwrap();
        assert!(matches!(cache.check(&blocked).await, Err(RobotsError::Disallowed { .. })));

        let open = Url::parse("https://shop.example.com/dp/B000000001").unwrap();
        assert!(cache.check(&open).await.is_ok());
    }

    #[tokio::test]
    async fn test_disallow_reports_path_and_query() {
        let cache = RobotsCache::new("itemmeta".to_string(), reqwest::Client::new());
        cache.cache.write().await.insert(
            "https://shop.example.com/robots.txt".to_string(),
            CachedRobots {
                robots: RobotsTxt::parse("User-agent: *\nDisallow: /search"),
                fetched_at: Instant::now(),
            },
        );

        let blocked = Url::parse("https://shop.example.com/search?q=goggles").unwrap();
        match cache.check(&blocked).await {
            Err(RobotsError::Disallowed { path, .. }) => assert_eq!(path, "/search?q=goggles"),
            other => panic!("expected Disallowed, got {other:?}"),
        }
    }

    #[test]
    fn test_request_target() {
        let url = Url::parse("https://shop.example.com/private/item?id=7#top").unwrap();
        assert_eq!(request_target(&url), "/private/item?id=7");
        assert_eq!(request_target(&Url::parse("https://shop.example.com").unwrap()), "/");
    }

    #[tokio::test]
    async fn test_robots_cache_cleanup() {
        let cache = RobotsCache::new("itemmeta".to_string(), reqwest::Client::new());
        cache.cache.write().await.insert(
            "https://example.com/robots.txt".to_string(),
            CachedRobots {
                robots: RobotsTxt::parse("User-agent: *\nAllow: /"),
                fetched_at: Instant::now() - ROBOTS_TTL - Duration::from_secs(1),
            },
        );

        cache.cleanup_expired().await;

        assert!(cache.cache.read().await.is_empty());
    }
}
