//! Logging initialisation
//!
//! Where log lines go is decided by a [`LogHandlerRegistry`]: a map from
//! [`LogType`] to a creator that builds the writer for that output. The
//! registry is an ordinary value handed to [`init_logging`], so embedders
//! can add or replace outputs without any process-wide state besides the
//! subscriber itself.

use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;
use crate::error::LogError;

/// Log output kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    /// Standard error
    #[default]
    Console,
    /// Append to `log.path`
    File,
    /// Discard everything
    None,
}

impl LogType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::File => "file",
            Self::None => "none",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the writer for one output; `None` means install no subscriber
pub type LogHandlerCreator =
    Box<dyn Fn(&LogConfig) -> Result<Option<BoxMakeWriter>, LogError> + Send + Sync>;

/// Map of log outputs to writer creators
pub struct LogHandlerRegistry {
    creators: HashMap<LogType, LogHandlerCreator>,
}

impl LogHandlerRegistry {
    /// Registry with no outputs
    #[must_use]
    pub fn empty() -> Self {
        Self {
            creators: HashMap::new(),
        }
    }

    /// Register (or replace) the creator for `log_type`
    pub fn register<F>(&mut self, log_type: LogType, creator: F)
    where
        F: Fn(&LogConfig) -> Result<Option<BoxMakeWriter>, LogError> + Send + Sync + 'static,
    {
        self.creators.insert(log_type, Box::new(creator));
    }

    #[must_use]
    pub fn contains(&self, log_type: LogType) -> bool {
        self.creators.contains_key(&log_type)
    }

    /// Build the writer for `config.output`
    ///
    /// # Errors
    ///
    /// `LogError::UnknownHandler` if nothing is registered for the output,
    /// otherwise whatever the creator reports.
    pub fn create(&self, config: &LogConfig) -> Result<Option<BoxMakeWriter>, LogError> {
        let creator = self
            .creators
            .get(&config.output)
            .ok_or_else(|| LogError::UnknownHandler(config.output.to_string()))?;
        creator(config)
    }
}

impl Default for LogHandlerRegistry {
    /// Console, file and none outputs
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(LogType::Console, |_| Ok(Some(BoxMakeWriter::new(std::io::stderr))));
        registry.register(LogType::File, file_writer);
        registry.register(LogType::None, |_| Ok(None));
        registry
    }
}

impl fmt::Debug for LogHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut outputs: Vec<&str> = self.creators.keys().map(LogType::as_str).collect();
        outputs.sort_unstable();
        f.debug_struct("LogHandlerRegistry")
            .field("outputs", &outputs)
            .finish()
    }
}

fn file_writer(config: &LogConfig) -> Result<Option<BoxMakeWriter>, LogError> {
    let path = config.path.as_ref().ok_or(LogError::MissingPath)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogError::FileOpen {
            path: path.display().to_string(),
            source,
        })?;
    Ok(Some(BoxMakeWriter::new(Arc::new(file))))
}

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` directives are honoured on top of `config.level`.
///
/// # Errors
///
/// Fails if the level is unknown, the writer cannot be created, or a
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig, registry: &LogHandlerRegistry) -> Result<(), LogError> {
    let level: Level = config
        .level
        .parse()
        .map_err(|_| LogError::Init(format!("unknown log level {}", config.level)))?;

    let Some(writer) = registry.create(config)? else {
        return Ok(());
    };

    let filter = EnvFilter::from_default_env().add_directive(LevelFilter::from_level(level).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.target)
        .with_ansi(config.output == LogType::Console)
        .with_writer(writer);

    let installed = if config.is_json() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| LogError::Init(e.to_string()))
}
