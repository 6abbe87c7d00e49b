//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ITEMMETA_*)
//! 2. TOML config file (if ITEMMETA_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Marketing words stripped from enhanced text unless overridden.
pub const DEFAULT_MARKETING_BLOCKLIST: &[&str] = &[
    "perfect",
    "amazing",
    "incredible",
    "awesome",
    "fantastic",
    "stunning",
    "ultimate",
    "premium",
    "revolutionary",
    "unbeatable",
    "best-selling",
    "best",
    "superior",
    "high-speed",
    "high speed",
    "ultra-fast",
    "super-fast",
    "lightning-fast",
    "blazing-fast",
    "fastest",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ITEMMETA_*)
/// 2. TOML config file (if ITEMMETA_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via ITEMMETA_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via ITEMMETA_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per page.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Page fetch timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Image probe (HEAD) timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Deadline for a whole resolution in milliseconds.
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,

    /// Whether to respect robots.txt rules.
    ///
    /// Set via ITEMMETA_RESPECT_ROBOTS environment variable.
    #[serde(default)]
    pub respect_robots: bool,

    /// API key for the text rewriting service.
    ///
    /// Set via ITEMMETA_ENHANCER_API_KEY. When absent every enhancement
    /// falls back to the raw text.
    #[serde(default)]
    pub enhancer_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible chat completions API.
    #[serde(default = "default_enhancer_base_url")]
    pub enhancer_base_url: String,

    /// Model name sent to the rewriting service.
    #[serde(default = "default_enhancer_model")]
    pub enhancer_model: String,

    /// Requests admitted per client within one window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    /// Rolling window length in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Deployment environment: "development" or "production".
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Default number of records scanned by one backfill run.
    #[serde(default = "default_backfill_batch_size")]
    pub backfill_batch_size: usize,

    /// Words removed from enhanced names and descriptions.
    ///
    /// Usually set as `marketing_blocklist = [...]` in the TOML file.
    #[serde(default = "default_marketing_blocklist")]
    pub marketing_blocklist: Vec<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./itemmeta-cache.sqlite")
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; itemmeta/0.1)".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_resolve_timeout_ms() -> u64 {
    60_000
}

fn default_enhancer_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_enhancer_model() -> String {
    "gpt-4o-mini".into()
}

fn default_rate_limit_max_requests() -> u32 {
    30
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_environment() -> String {
    "development".into()
}

fn default_backfill_batch_size() -> usize {
    100
}

fn default_marketing_blocklist() -> Vec<String> {
    DEFAULT_MARKETING_BLOCKLIST.iter().map(|w| w.to_string()).collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            respect_robots: false,
            enhancer_api_key: None,
            enhancer_base_url: default_enhancer_base_url(),
            enhancer_model: default_enhancer_model(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            environment: default_environment(),
            backfill_batch_size: default_backfill_batch_size(),
            marketing_blocklist: default_marketing_blocklist(),
        }
    }
}

impl AppConfig {
    /// Page fetch timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ITEMMETA_`
    /// 2. TOML file from `ITEMMETA_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ITEMMETA_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ITEMMETA_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The rewriting service key, if one is configured and non-empty.
    pub fn enhancer_api_key(&self) -> Option<&str> {
        self.enhancer_api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}
