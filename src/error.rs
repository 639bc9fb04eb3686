//! Error types for flow-sniffer
//!
//! Errors are split by subsystem. The sniffing engine itself only ever
//! reports [`SniffError`]; everything else belongs to the layers around it
//! (configuration, logging, fake DNS, the session driver).

use std::io;

use thiserror::Error;

/// Top-level error type for flow-sniffer
#[derive(Debug, Error)]
pub enum FlowSnifferError {
    /// Configuration errors (file parsing, validation)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sniffing outcome that is not a result
    #[error("Sniff error: {0}")]
    Sniff(#[from] SniffError),

    /// Session driver errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Fake DNS allocation errors
    #[error("FakeDNS error: {0}")]
    FakeDns(#[from] FakeDnsError),

    /// Logging setup errors
    #[error("Logging error: {0}")]
    Log(#[from] LogError),

    /// I/O errors not covered by other categories
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FlowSnifferError {
    /// Check if this error is recoverable (can retry operation)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Log(_) => false,
            Self::Sniff(e) => e.is_recoverable(),
            Self::Session(e) => e.is_recoverable(),
            Self::FakeDns(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
        }
    }
}

/// Outcome of a sniffing attempt that did not produce a result.
///
/// The same two values are used per entry and at the engine boundary.
/// A single entry returning `NeedMoreData` is kept for the next call;
/// `UnknownContent` removes it for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SniffError {
    /// The bytes seen so far are a valid prefix; call again with more data
    #[error("need more data")]
    NeedMoreData,

    /// The content was definitively not recognized
    #[error("unknown content")]
    UnknownContent,
}

impl SniffError {
    /// `NeedMoreData` is the only outcome worth retrying
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NeedMoreData)
    }
}

/// Errors from the dispatcher-side session driver
#[derive(Debug, Error)]
pub enum SessionError {
    /// Sniffing is disabled for this connection
    #[error("sniffing disabled for this connection")]
    Disabled,

    /// The engine gave up
    #[error(transparent)]
    Sniff(#[from] SniffError),

    /// Attempt or byte budget ran out before a decision
    #[error("sniffing budget exhausted after {attempts} attempts ({bytes} bytes)")]
    BudgetExhausted { attempts: usize, bytes: usize },

    /// Reading from the connection failed
    #[error("I/O error while sniffing: {0}")]
    Io(#[from] io::Error),
}

impl SessionError {
    /// Check if this error is recoverable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Disabled | Self::BudgetExhausted { .. } => false,
            Self::Sniff(e) => e.is_recoverable(),
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
        }
    }

    /// Create a budget exhausted error
    pub const fn budget_exhausted(attempts: usize, bytes: usize) -> Self {
        Self::BudgetExhausted { attempts, bytes }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found or inaccessible
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Validation error (invalid values, missing required fields)
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Environment variable error
    #[error("Environment variable error: {name}: {reason}")]
    EnvError { name: String, reason: String },

    /// I/O error while reading config
    #[error("I/O error reading configuration: {0}")]
    IoError(#[from] io::Error),
}

impl ConfigError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create an environment variable error
    pub fn env(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvError {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Error type for FakeDNS operations
#[derive(Debug, Error)]
pub enum FakeDnsError {
    /// IP pool exhausted: no available addresses
    #[error("IP pool exhausted: no available addresses")]
    PoolExhausted,
    /// IPv6 not enabled
    #[error("IPv6 not enabled")]
    Ipv6NotEnabled,
}

/// Logging setup errors
#[derive(Debug, Error)]
pub enum LogError {
    /// No handler creator registered for the requested log type
    #[error("No log handler registered for {0}")]
    UnknownHandler(String),

    /// Log file could not be opened
    #[error("Failed to open log file {path}: {source}")]
    FileOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The file handler was selected without a path
    #[error("Log output 'file' requires a path")]
    MissingPath,

    /// Global subscriber could not be installed
    #[error("Failed to install log subscriber: {0}")]
    Init(String),
}

/// Type alias for Result with FlowSnifferError
pub type Result<T> = std::result::Result<T, FlowSnifferError>;
