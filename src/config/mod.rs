//! Configuration management for feedflow
//!
//! This module handles loading, parsing, and validating controller configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Debounce scheduler defaults (search box)
    #[serde(default)]
    pub debounce: DebounceConfig,

    /// Retry executor policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Infinite scroll controller configuration
    #[serde(default)]
    pub infinite_scroll: InfiniteScrollConfig,

    /// Pull-to-refresh gesture configuration
    #[serde(default)]
    pub pull_to_refresh: PullToRefreshConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables with prefix FEEDFLOW_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(delay) = env_parse("FEEDFLOW_DEBOUNCE_DELAY_MS")? {
            config.debounce.delay_ms = delay;
        }
        if let Some(max_wait) = env_parse("FEEDFLOW_DEBOUNCE_MAX_WAIT_MS")? {
            config.debounce.max_wait_ms = Some(max_wait);
        }

        if let Some(attempts) = env_parse("FEEDFLOW_RETRY_MAX_ATTEMPTS")? {
            config.retry.max_attempts = attempts;
        }
        if let Some(delay) = env_parse("FEEDFLOW_RETRY_INITIAL_DELAY_MS")? {
            config.retry.initial_delay_ms = delay;
        }
        if let Some(delay) = env_parse("FEEDFLOW_RETRY_MAX_DELAY_MS")? {
            config.retry.max_delay_ms = delay;
        }
        if let Some(multiplier) = env_parse("FEEDFLOW_RETRY_BACKOFF_MULTIPLIER")? {
            config.retry.backoff_multiplier = multiplier;
        }

        if let Some(threshold) = env_parse("FEEDFLOW_SCROLL_THRESHOLD_PX")? {
            config.infinite_scroll.threshold_px = threshold;
        }
        if let Some(debounce) = env_parse("FEEDFLOW_SCROLL_DEBOUNCE_MS")? {
            config.infinite_scroll.debounce_ms = debounce;
        }

        if let Some(threshold) = env_parse("FEEDFLOW_PULL_THRESHOLD")? {
            config.pull_to_refresh.threshold = threshold;
        }
        if let Some(resistance) = env_parse("FEEDFLOW_PULL_RESISTANCE")? {
            config.pull_to_refresh.resistance = resistance;
        }

        if let Ok(level) = std::env::var("FEEDFLOW_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("FEEDFLOW_LOG_FORMAT") {
            config.logging.format = format;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.infinite_scroll.validate()?;
        self.pull_to_refresh.validate()?;
        Ok(())
    }
}

/// Debounce configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebounceConfig {
    /// Quiet period in milliseconds
    #[serde(default = "default_debounce_delay")]
    pub delay_ms: u64,

    /// Upper bound on total deferral in milliseconds
    #[serde(default)]
    pub max_wait_ms: Option<u64>,

    /// Emit on the leading edge when the last emission is older than the delay
    #[serde(default)]
    pub leading: bool,

    /// Emit on the trailing edge once input quiesces
    #[serde(default = "default_trailing")]
    pub trailing: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_debounce_delay(),
            max_wait_ms: None,
            leading: false,
            trailing: default_trailing(),
        }
    }
}

impl DebounceConfig {
    /// Trailing-edge debounce with the given delay
    pub fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Default::default()
        }
    }

    /// Quiet period as a duration
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Maximum deferral as a duration
    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }
}

fn default_debounce_delay() -> u64 {
    300
}

fn default_trailing() -> bool {
    true
}

/// Retry policy for async operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Growth factor applied per attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for a single delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Whether to randomize each delay to 50-100% of its value
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Fixed-interval retry
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
            max_delay_ms: delay_ms,
            jitter: false,
        }
    }

    /// Doubling backoff between `initial_delay_ms` and `max_delay_ms`
    pub fn exponential(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            backoff_multiplier: 2.0,
            max_delay_ms,
            jitter: false,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(format!(
                "retry.backoff_multiplier must be >= 1, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> u64 {
    10_000
}

/// Infinite scroll configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfiniteScrollConfig {
    /// Distance in pixels below the viewport at which the sentinel counts as visible
    #[serde(default = "default_threshold_px")]
    pub threshold_px: f64,

    /// Debounce applied to intersection signals in milliseconds
    #[serde(default = "default_scroll_debounce")]
    pub debounce_ms: u64,

    /// Whether observation is active
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for InfiniteScrollConfig {
    fn default() -> Self {
        Self {
            threshold_px: default_threshold_px(),
            debounce_ms: default_scroll_debounce(),
            enabled: default_enabled(),
        }
    }
}

impl InfiniteScrollConfig {
    /// Intersection debounce as a duration
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold_px.is_finite() || self.threshold_px < 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "infinite_scroll.threshold_px must be >= 0, got {}",
                self.threshold_px
            )));
        }
        Ok(())
    }
}

fn default_threshold_px() -> f64 {
    100.0
}

fn default_scroll_debounce() -> u64 {
    100
}

fn default_enabled() -> bool {
    true
}

/// Pull-to-refresh configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullToRefreshConfig {
    /// Pull distance in pixels that commits to a refresh
    #[serde(default = "default_pull_threshold")]
    pub threshold: f64,

    /// Factor applied to finger travel
    #[serde(default = "default_resistance")]
    pub resistance: f64,

    /// Whether the gesture surface reacts to touches
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for PullToRefreshConfig {
    fn default() -> Self {
        Self {
            threshold: default_pull_threshold(),
            resistance: default_resistance(),
            enabled: default_enabled(),
        }
    }
}

impl PullToRefreshConfig {
    /// Shorter, stiffer pull used by lightweight lists
    pub fn simple() -> Self {
        Self {
            threshold: 60.0,
            resistance: 0.6,
            enabled: true,
        }
    }

    /// Upper bound for the displayed pull distance
    pub fn max_pull(&self) -> f64 {
        self.threshold * 1.5
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "pull_to_refresh.threshold must be > 0, got {}",
                self.threshold
            )));
        }
        if !self.resistance.is_finite() || self.resistance <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "pull_to_refresh.resistance must be > 0, got {}",
                self.resistance
            )));
        }
        Ok(())
    }
}

fn default_pull_threshold() -> f64 {
    80.0
}

fn default_resistance() -> f64 {
    0.5
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format ("json", "pretty" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Read and parse an environment variable, `None` when unset
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("Invalid value for {}: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
