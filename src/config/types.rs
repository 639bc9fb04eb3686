//! Configuration types for flow-sniffer
//!
//! All types are deserializable from JSON and every section has defaults,
//! so an empty object `{}` is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use ipnet::{Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LogType;
use crate::net::Network;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Sniffing behaviour and budgets
    #[serde(default)]
    pub sniff: SniffConfig,

    /// Fake-DNS address pool
    #[serde(default)]
    pub fakedns: FakeDnsConfig,
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log.validate()?;
        self.sniff.validate()?;
        self.fakedns.validate()?;
        Ok(())
    }

    /// Create a minimal default configuration
    #[must_use]
    pub fn default_config() -> Self {
        Self::default()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Include target (module path)
    #[serde(default)]
    pub target: bool,

    /// Where log lines go
    #[serde(default)]
    pub output: LogType,

    /// Log file, required when `output` is `file`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl LogConfig {
    /// Validate the logging configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for unknown levels or formats,
    /// or file output without a path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(
            self.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::validation(format!(
                "Unknown log level: {}",
                self.level
            )));
        }

        if !matches!(self.format.as_str(), "text" | "json") {
            return Err(ConfigError::validation(format!(
                "Unknown log format: {}",
                self.format
            )));
        }

        if self.output == LogType::File && self.path.is_none() {
            return Err(ConfigError::validation(
                "log.path is required when log.output is \"file\"",
            ));
        }

        Ok(())
    }

    /// Whether JSON output is selected
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: false,
            output: LogType::Console,
            path: None,
        }
    }
}

/// Sniffing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SniffConfig {
    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Only run the metadata phase, never read payload
    #[serde(default)]
    pub metadata_only: bool,

    /// Networks sniffing applies to
    #[serde(default = "default_networks")]
    pub networks: Vec<Network>,

    /// Payload attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Largest payload prefix that is buffered
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Per-read timeout in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl SniffConfig {
    /// Validate the sniffing configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for zero budgets or a
    /// non-IP network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::validation(
                "sniff.max_attempts must be greater than 0",
            ));
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::validation(
                "sniff.max_bytes must be greater than 0",
            ));
        }

        if self.read_timeout_ms == 0 {
            return Err(ConfigError::validation(
                "sniff.read_timeout_ms must be greater than 0",
            ));
        }

        if let Some(network) = self.networks.iter().find(|n| **n == Network::Unix) {
            return Err(ConfigError::validation(format!(
                "sniff.networks does not support {network}"
            )));
        }

        Ok(())
    }

    /// Get read timeout as Duration
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Whether connections on `network` are sniffed
    #[must_use]
    pub fn applies_to(&self, network: Network) -> bool {
        self.enabled && self.networks.contains(&network)
    }
}

impl Default for SniffConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metadata_only: false,
            networks: default_networks(),
            max_attempts: default_max_attempts(),
            max_bytes: default_max_bytes(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Configuration for the fake-DNS address pool
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FakeDnsConfig {
    /// Whether fake DNS is enabled
    #[serde(default)]
    pub enabled: bool,

    /// IPv4 address pool for fake IPs
    ///
    /// Default: 198.18.0.0/15 (RFC 2544 benchmarking range)
    #[serde(default = "default_ipv4_pool")]
    pub ipv4_pool: Ipv4Net,

    /// Optional IPv6 address pool for fake IPs
    #[serde(default)]
    pub ipv6_pool: Option<Ipv6Net>,

    /// Maximum number of mapped domains
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Mapping lifetime in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl FakeDnsConfig {
    /// Create a new config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the IPv4 address pool
    #[must_use]
    pub fn with_ipv4_pool(mut self, pool: Ipv4Net) -> Self {
        self.ipv4_pool = pool;
        self
    }

    /// Set the IPv6 address pool (enables IPv6 fake DNS)
    #[must_use]
    pub fn with_ipv6_pool(mut self, pool: Ipv6Net) -> Self {
        self.ipv6_pool = Some(pool);
        self
    }

    /// Set the maximum number of mapped domains
    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the mapping lifetime
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    /// Enable or disable fake DNS
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Get TTL as Duration
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Validate the fake-DNS configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for zero capacity or TTL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::validation(
                "fakedns.max_entries must be greater than 0",
            ));
        }

        if self.ttl_secs == 0 {
            return Err(ConfigError::validation(
                "fakedns.ttl_secs must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for FakeDnsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ipv4_pool: default_ipv4_pool(),
            ipv6_pool: None,
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

// Default value functions

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_networks() -> Vec<Network> {
    vec![Network::Tcp, Network::Udp]
}

const fn default_max_attempts() -> usize {
    2
}

const fn default_max_bytes() -> usize {
    2048
}

const fn default_read_timeout_ms() -> u64 {
    100
}

fn default_ipv4_pool() -> Ipv4Net {
    "198.18.0.0/15".parse().expect("valid IPv4 CIDR")
}

const fn default_max_entries() -> usize {
    65536
}

const fn default_ttl_secs() -> u64 {
    600
}
