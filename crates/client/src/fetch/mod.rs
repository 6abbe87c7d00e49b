//! HTTP fetch pipeline with SSRF protection and optional robots.txt compliance.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments and tracking parameters
//!
//! ### SSRF & Safety Gates
//! - Resolve DNS and refuse private/reserved answers
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//!
//! ### Probing
//! - `head` issues a short-timeout HEAD used to vet image candidates

pub mod robots;
pub mod ssrf;
pub mod url;

use bytes::Bytes;
use reqwest::Url;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode, header};
use std::error::Error as StdError;
use std::time::{Duration, Instant};

pub use robots::{RobotsCache, RobotsError};
pub use ssrf::{SsrfError, validate_ip, validate_literal_host, validate_url_host};
pub use url::{UrlError, canonicalize};

use itemmeta_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Page request timeout (default: 20s)
    pub timeout: Duration,

    /// HEAD probe timeout (default: 5s)
    pub probe_timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Whether to respect robots.txt (default: false)
    pub respect_robots: bool,

    /// Refuse hosts that resolve to private/reserved addresses (default: true)
    pub block_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; itemmeta/0.1)".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20_000),
            probe_timeout: Duration::from_millis(5_000),
            max_redirects: 5,
            respect_robots: false,
            block_private_hosts: true,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            probe_timeout: config.probe_timeout(),
            respect_robots: config.respect_robots,
            ..Default::default()
        }
    }
}

/// Response from a page fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The canonical URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Result of a HEAD probe.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
}

fn content_type(headers: &header::HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Follow at most `max_redirects` hops and, when `block_private_hosts` is
/// set, refuse any hop to a private IP literal or `localhost`.
fn redirect_policy(max_redirects: usize, block_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            let message = format!("too many redirects (max {max_redirects})");
            return attempt.error(message);
        }
        if block_private_hosts && let Err(e) = validate_literal_host(attempt.url()) {
            tracing::warn!(target_url = %attempt.url(), error = %e, "refusing redirect");
            return attempt.error(e);
        }
        attempt.follow()
    })
}

fn ssrf_cause(e: &reqwest::Error) -> Option<&SsrfError> {
    let mut source = e.source();
    while let Some(err) = source {
        if let Some(ssrf) = err.downcast_ref::<SsrfError>() {
            return Some(ssrf);
        }
        source = err.source();
    }
    None
}

fn map_send_error(e: reqwest::Error) -> Error {
    if let Some(ssrf) = ssrf_cause(&e) {
        Error::SsrfBlocked(format!("redirect refused: {ssrf}"))
    } else if e.is_timeout() {
        Error::FetchTimeout(e.to_string())
    } else {
        Error::Fetch(format!("network error: {}", e))
    }
}

/// HTTP fetch client with safety checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    robots_cache: RobotsCache,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect_policy(config.max_redirects, config.block_private_hosts))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {}", e)))?;

        let robots_cache = RobotsCache::new(config.user_agent.clone(), http.clone());

        Ok(Self { http, config, robots_cache })
    }

    async fn gate(&self, url: &Url) -> Result<(), Error> {
        if self.config.block_private_hosts {
            validate_url_host(url).await.map_err(|e| Error::SsrfBlocked(e.to_string()))?;
        }
        Ok(())
    }

    /// Fetch a page, returning raw bytes and metadata.
    ///
    /// Performs the SSRF check, the robots.txt check when enabled, and
    /// enforces the redirect and byte limits.
    pub async fn fetch(&self, url_str: &str) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        self.gate(&url).await?;

        if self.config.respect_robots {
            self.robots_cache
                .check(&url)
                .await
                .map_err(|e| Error::RobotsDisallowed(e.to_string()))?;
        }

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(format!("status {} for {}", status.as_u16(), url)));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let content_type = content_type(response.headers());

        let bytes = response.bytes().await.map_err(map_send_error)?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            url,
            final_url,
            fetch_ms,
            bytes.len()
        );

        Ok(FetchResponse { url, final_url, status, content_type, bytes, fetch_ms })
    }

    /// HEAD a URL with the short probe timeout.
    pub async fn head(&self, url: &Url) -> Result<HeadResponse, Error> {
        self.gate(url).await?;

        let response = self
            .http
            .head(url.as_str())
            .timeout(self.config.probe_timeout)
            .send()
            .await
            .map_err(map_send_error)?;

        Ok(HeadResponse { status: response.status(), content_type: content_type(response.headers()) })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.probe_timeout, Duration::from_millis(5000));
        assert_eq!(config.max_redirects, 5);
        assert!(!config.respect_robots);
        assert!(config.block_private_hosts);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { timeout_ms: 1_500, respect_robots: true, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.timeout, Duration::from_millis(1_500));
        assert!(config.respect_robots);
        assert_eq!(config.user_agent, app.user_agent);
    }

    #[test]
    fn test_fetch_response_text_is_lossy() {
        let response = FetchResponse {
            url: Url::parse("https://example.com").unwrap(),
            final_url: Url::parse("https://example.com/redirected").unwrap(),
            status: StatusCode::OK,
            content_type: Some("text/html".to_string()),
            bytes: Bytes::from_static(b"<title>caf\xff</title>"),
            fetch_ms: 100,
        };
        assert_eq!(response.text(), "<title>caf\u{fffd}</title>");
    }

    #[tokio::test]
    async fn test_fetch_refuses_private_host() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch("http://127.0.0.1/admin").await;
        assert!(matches!(result, Err(Error::SsrfBlocked(_))));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_scheme() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch("ftp://example.com/file").await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_redirect_to_private_ip_is_refused() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = "HTTP/1.1 302 Found\r\nLocation: http://169.254.169.254/latest/meta-data\r\n\
                            Content-Length: 0\r\nConnection: close\r\n\r\n";
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        // Straight to the HTTP client: the host gate would refuse the loopback origin itself.
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let err = client.http.get(format!("http://{addr}/item")).send().await.unwrap_err();
        assert!(matches!(map_send_error(err), Error::SsrfBlocked(_)));
    }
}
