//! Configuration management for fleetcrawl
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. The same file configures both process roles:
//! `[node]` for a crawler node and `[balancer]` for the load balancer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::delegator::FailurePolicy;
use crate::utils::error::ConfigError;

/// Fixed identifying user agent of the direct HTTP crawler
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:47.0) Gecko/20100101 Firefox/47.0";

/// Upper bound on cache time-to-live, ten years
pub const MAX_CACHE_TTL_HOURS: u64 = 24 * 365 * 10;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Crawler node configuration
    pub node: NodeConfig,

    /// Load balancer configuration
    pub balancer: BalancerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Crawler node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Server bind address
    pub bind_address: String,

    /// Worker threads; also the number of fetches in flight per node
    pub threads: usize,

    /// Direct HTTP strategy
    pub direct: DirectConfig,

    /// Headless browser strategy
    pub browser: BrowserConfig,

    /// Page cache shared settings
    pub cache: CacheConfig,
}

/// TLS certificate handling of the direct HTTP crawler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    /// Accept any certificate; crawled sites are arbitrary third parties
    #[default]
    TrustAll,

    /// Validate certificates against the system roots
    Verify,
}

/// Direct HTTP strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectConfig {
    /// Per-fetch timeout in milliseconds
    pub timeout_ms: u64,

    /// Cache time-to-live in hours
    pub cache_ttl_hours: u64,

    /// Certificate validation mode
    pub tls: TlsMode,

    /// User agent sent with every request
    pub user_agent: String,

    /// Maximum redirects followed per fetch
    pub max_redirects: usize,
}

/// Headless browser strategy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Maximum number of live browser sessions
    pub instances: usize,

    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Render-settle delay in milliseconds, also the pause between attempts
    pub settle_ms: u64,

    /// Cache time-to-live in hours
    pub cache_ttl_hours: u64,

    /// Chrome/Chromium executable (searched on PATH when unset)
    pub executable: Option<PathBuf>,

    /// Run without a visible window
    pub headless: bool,

    /// Extra command-line arguments for the browser
    pub args: Vec<String>,
}

/// Page cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one database file per strategy
    pub dir: PathBuf,

    /// Content shorter than this many characters is never cached
    pub min_content_len: usize,
}

/// Load balancer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Server bind address
    pub bind_address: String,

    /// Backend node base addresses; list index is the shard id
    pub endpoints: Vec<String>,

    /// File with one backend base address per line, appended to `endpoints`
    pub endpoints_file: Option<PathBuf>,

    /// What a batch returns when a shard fails
    pub failure_policy: FailurePolicy,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0:8080"),
            threads: 16,
            direct: DirectConfig::default(),
            browser: BrowserConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            cache_ttl_hours: 24,
            tls: TlsMode::TrustAll,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 10,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            instances: 4,
            timeout_ms: 30_000,
            settle_ms: 500,
            cache_ttl_hours: 24,
            executable: None,
            headless: true,
            args: Vec::new(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            min_content_len: 200,
        }
    }
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0:9291"),
            endpoints: Vec::new(),
            endpoints_file: None,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables keep their default value.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("FLEETCRAWL_NODE_BIND") {
            config.node.bind_address = addr;
        }
        if let Some(threads) = env_parse("FLEETCRAWL_THREADS") {
            config.node.threads = threads;
        }

        if let Some(ms) = env_parse("FLEETCRAWL_DIRECT_TIMEOUT_MS") {
            config.node.direct.timeout_ms = ms;
        }
        if let Some(hours) = env_parse("FLEETCRAWL_DIRECT_CACHE_TTL_HOURS") {
            config.node.direct.cache_ttl_hours = hours;
        }
        if let Ok(mode) = std::env::var("FLEETCRAWL_DIRECT_TLS") {
            config.node.direct.tls = match mode.trim() {
                "verify" => TlsMode::Verify,
                _ => TlsMode::TrustAll,
            };
        }
        if let Ok(agent) = std::env::var("FLEETCRAWL_USER_AGENT") {
            config.node.direct.user_agent = agent;
        }

        if let Some(instances) = env_parse("FLEETCRAWL_BROWSER_INSTANCES") {
            config.node.browser.instances = instances;
        }
        if let Some(ms) = env_parse("FLEETCRAWL_BROWSER_TIMEOUT_MS") {
            config.node.browser.timeout_ms = ms;
        }
        if let Some(ms) = env_parse("FLEETCRAWL_BROWSER_SETTLE_MS") {
            config.node.browser.settle_ms = ms;
        }
        if let Some(hours) = env_parse("FLEETCRAWL_BROWSER_CACHE_TTL_HOURS") {
            config.node.browser.cache_ttl_hours = hours;
        }
        if let Ok(path) = std::env::var("FLEETCRAWL_CHROME_PATH") {
            config.node.browser.executable = Some(PathBuf::from(path));
        }

        if let Ok(dir) = std::env::var("FLEETCRAWL_CACHE_DIR") {
            config.node.cache.dir = PathBuf::from(dir);
        }
        if let Some(len) = env_parse("FLEETCRAWL_CACHE_MIN_LEN") {
            config.node.cache.min_content_len = len;
        }

        if let Ok(addr) = std::env::var("FLEETCRAWL_BALANCER_BIND") {
            config.balancer.bind_address = addr;
        }
        if let Ok(endpoints) = std::env::var("FLEETCRAWL_ENDPOINTS") {
            config.balancer.endpoints = endpoints
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(path) = std::env::var("FLEETCRAWL_ENDPOINTS_FILE") {
            config.balancer.endpoints_file = Some(PathBuf::from(path));
        }
        if let Ok(policy) = std::env::var("FLEETCRAWL_FAILURE_POLICY") {
            config.balancer.failure_policy = match policy.trim() {
                "partial" => FailurePolicy::Partial,
                _ => FailurePolicy::FailFast,
            };
        }

        if let Ok(level) = std::env::var("FLEETCRAWL_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("FLEETCRAWL_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate the configuration of both roles
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.validate_node()?;
        self.validate_balancer()
    }

    /// Validate the values the crawler node depends on
    pub fn validate_node(&self) -> std::result::Result<(), ConfigError> {
        let node = &self.node;

        if node.threads == 0 {
            return Err(ConfigError::invalid("node.threads", "must be greater than 0"));
        }
        if node.browser.instances == 0 {
            return Err(ConfigError::invalid(
                "node.browser.instances",
                "must allow at least 1 session",
            ));
        }
        if node.direct.timeout_ms == 0 {
            return Err(ConfigError::invalid("node.direct.timeout_ms", "must be positive"));
        }
        if node.browser.timeout_ms == 0 {
            return Err(ConfigError::invalid("node.browser.timeout_ms", "must be positive"));
        }
        if node.direct.cache_ttl_hours == 0 || node.browser.cache_ttl_hours == 0 {
            return Err(ConfigError::invalid("cache_ttl_hours", "must be at least 1 hour"));
        }
        if node.direct.cache_ttl_hours > MAX_CACHE_TTL_HOURS
            || node.browser.cache_ttl_hours > MAX_CACHE_TTL_HOURS
        {
            return Err(ConfigError::invalid(
                "cache_ttl_hours",
                format!("must not exceed {MAX_CACHE_TTL_HOURS} hours"),
            ));
        }
        if node.direct.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "node.direct.user_agent".to_string(),
            });
        }

        Ok(())
    }

    /// Validate the values the load balancer depends on
    ///
    /// Endpoints from `endpoints_file` are only known after
    /// [`Config::resolve_endpoints`], so emptiness is checked there.
    pub fn validate_balancer(&self) -> std::result::Result<(), ConfigError> {
        for endpoint in &self.balancer.endpoints {
            let parsed = url::Url::parse(endpoint)
                .map_err(|e| ConfigError::invalid("balancer.endpoints", format!("{endpoint}: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::invalid(
                    "balancer.endpoints",
                    format!("{endpoint}: scheme must be http or https"),
                ));
            }
        }

        Ok(())
    }

    /// Full endpoint list: inline endpoints followed by the addresses file
    pub fn resolve_endpoints(&self) -> Result<Vec<String>> {
        let mut endpoints = self.balancer.endpoints.clone();

        if let Some(path) = &self.balancer.endpoints_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read endpoints file: {}", path.display()))?;
            endpoints.extend(parse_endpoints(&content));
        }

        if endpoints.is_empty() {
            return Err(ConfigError::MissingField {
                field: "balancer.endpoints".to_string(),
            }
            .into());
        }

        Ok(endpoints)
    }
}

/// Parse an addresses file: one base URL per line, `#` comments and blanks ignored
pub fn parse_endpoints(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.trim_end_matches('/').to_string())
        .collect()
}

impl DirectConfig {
    /// Per-fetch timeout as Duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Cache time-to-live as Duration
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600))
    }
}

impl BrowserConfig {
    /// Per-attempt timeout as Duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Render-settle delay as Duration
    #[must_use]
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Cache time-to-live as Duration
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600))
    }
}
