use crate::errors::ConfigError;
use crate::tasks::RetryPolicy;
use std::str::FromStr;
use std::time::Duration;

type Result<T> = std::result::Result<T, ConfigError>;

/// Base URL of the remote list and timeline API.
///
/// Validated as an absolute URL; any trailing slash is dropped.
#[derive(Clone, Debug)]
pub struct ListApiBase(String);

/// Bearer token for the remote API. Never printed.
#[derive(Clone)]
pub struct ListApiToken(String);

/// HTTP client timeout configuration.
///
/// Every request to the remote API is bounded by this timeout; the
/// reconciliation workers themselves enforce no deadline.
#[derive(Clone, Debug)]
pub struct HttpClientTimeout(Duration);

/// Interval at which the rule file is re-read.
#[derive(Clone, Debug)]
pub struct RulesReloadSeconds(u32);

impl Default for RulesReloadSeconds {
    fn default() -> Self {
        Self(30)
    }
}

/// Interval between timeline fetches.
#[derive(Clone, Debug)]
pub struct FeedPollSeconds(u32);

impl Default for FeedPollSeconds {
    fn default() -> Self {
        Self(60)
    }
}

/// Configuration for reconciliation retries
#[derive(Clone, Debug)]
pub struct ReconcileConfig {
    /// Total attempts per dispatch, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl ReconcileConfig {
    pub fn from_env() -> Result<Self> {
        let max_attempts: u32 = parse_env("RECONCILE_MAX_ATTEMPTS", "3")?;
        Ok(Self {
            max_attempts: max_attempts.max(1),
            retry_delay_ms: parse_env("RECONCILE_RETRY_DELAY_MS", "3000")?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Configuration for the timeline poller
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Whether to run the poller at all
    pub enabled: bool,
    pub poll_seconds: FeedPollSeconds,
    /// Number of statuses requested per fetch
    pub batch_size: u32,
    /// Capacity of the channel between poller and processor
    pub queue_size: usize,
}

impl FeedConfig {
    pub fn from_env() -> Result<Self> {
        let batch_size: u32 = parse_env("FEED_BATCH_SIZE", "200")?;
        let queue_size: usize = parse_env("FEED_QUEUE_SIZE", "500")?;
        Ok(Self {
            enabled: default_env("FEED_ENABLED", "true").to_lowercase() == "true",
            poll_seconds: default_env("FEED_POLL_SECONDS", "60").try_into()?,
            batch_size: batch_size.max(1),
            queue_size: queue_size.max(10),
        })
    }
}

/// Configuration for the metrics publisher
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// `noop` or `statsd`
    pub adapter: String,
    pub statsd_host: Option<String>,
    pub prefix: String,
    /// Comma-separated `key:value` pairs attached to every metric
    pub tags: Option<String>,
}

impl MetricsConfig {
    pub fn from_env() -> Self {
        Self {
            adapter: default_env("METRICS_ADAPTER", "noop"),
            statsd_host: non_empty_env("METRICS_STATSD_HOST"),
            prefix: default_env("METRICS_PREFIX", "autolists"),
            tags: non_empty_env("METRICS_TAGS"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub version: String,
    pub list_api_base: ListApiBase,
    pub list_owner: String,
    pub list_api_token: Option<ListApiToken>,
    pub user_agent: String,
    pub http_client_timeout: HttpClientTimeout,
    pub rules_path: String,
    pub rules_reload_seconds: RulesReloadSeconds,
    pub reconcile: ReconcileConfig,
    pub feed: FeedConfig,
    pub metrics: MetricsConfig,
}

impl Config {
    /// Creates a new configuration instance by loading values from environment variables.
    ///
    /// # Required Environment Variables
    ///
    /// - `LIST_API_BASE`: Base URL of the remote list API
    /// - `LIST_OWNER`: Screen name owning the managed lists
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value
    /// fails validation.
    pub fn new() -> Result<Self> {
        let version = version()?;
        let list_api_base: ListApiBase =
            require_env("LIST_API_BASE").and_then(|value| value.try_into())?;
        let list_owner = require_env("LIST_OWNER")?;
        let list_api_token = non_empty_env("LIST_API_TOKEN").map(ListApiToken);

        let default_user_agent = format!("autolists/{}", version);
        let user_agent = default_env("USER_AGENT", &default_user_agent);
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "8").try_into()?;

        let rules_path = default_env("RULES_PATH", "rules.json");
        let rules_reload_seconds: RulesReloadSeconds =
            default_env("RULES_RELOAD_SECONDS", "30").try_into()?;

        Ok(Self {
            version,
            list_api_base,
            list_owner,
            list_api_token,
            user_agent,
            http_client_timeout,
            rules_path,
            rules_reload_seconds,
            reconcile: ReconcileConfig::from_env()?,
            feed: FeedConfig::from_env()?,
            metrics: MetricsConfig::from_env(),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired {
        var_name: name.to_string(),
    })
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or(default_value.to_string())
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_env<T: FromStr>(name: &str, default_value: &str) -> Result<T> {
    let value = default_env(name, default_value);
    value.parse::<T>().map_err(|_| ConfigError::InvalidNumber {
        name: name.to_string(),
        value,
    })
}

/// Retrieves the service version from compile-time environment variables.
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotAvailable)
}

impl TryFrom<String> for ListApiBase {
    type Error = ConfigError;
    fn try_from(value: String) -> Result<Self> {
        let url = reqwest::Url::parse(&value).map_err(|e| ConfigError::InvalidUrl {
            url: value.clone(),
            details: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl {
                url: value,
                details: "URL cannot be used as a base".to_string(),
            });
        }
        Ok(Self(value.trim_end_matches('/').to_string()))
    }
}

impl ListApiBase {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ListApiToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ListApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ListApiToken([redacted])")
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = ConfigError;
    fn try_from(value: String) -> Result<Self> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(8)));
        }

        match value.parse::<u64>() {
            Ok(seconds) if seconds > 0 => Ok(Self(Duration::from_secs(seconds))),
            _ => Err(ConfigError::InvalidTimeout {
                value: value.clone(),
            }),
        }
    }
}

fn parse_interval(name: &str, value: String) -> Result<u32> {
    match value.parse::<u32>() {
        Ok(seconds) if seconds > 0 => Ok(seconds),
        _ => Err(ConfigError::InvalidNumber {
            name: name.to_string(),
            value,
        }),
    }
}

impl TryFrom<String> for RulesReloadSeconds {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        parse_interval("RULES_RELOAD_SECONDS", value).map(Self)
    }
}

impl RulesReloadSeconds {
    pub fn to_duration(&self) -> Duration {
        Duration::from_secs(self.0 as u64)
    }
}

impl TryFrom<String> for FeedPollSeconds {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        parse_interval("FEED_POLL_SECONDS", value).map(Self)
    }
}

impl FeedPollSeconds {
    pub fn to_duration(&self) -> Duration {
        Duration::from_secs(self.0 as u64)
    }
}
