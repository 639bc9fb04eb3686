//! Configuration module for flow-sniffer
//!
//! This module provides configuration types and loading utilities.
//!
//! # Example
//!
//! ```no_run
//! use flow_sniffer::config::{load_config, Config};
//!
//! let config = load_config("/etc/flow-sniffer/config.json").unwrap();
//! println!("Sniff budget: {} bytes", config.sniff.max_bytes);
//! ```

mod loader;
mod types;

pub use loader::{
    apply_env_overrides, create_default_config, load_config, load_config_str,
    load_config_with_env, ENV_FAKEDNS, ENV_LOG_LEVEL, ENV_MAX_BYTES,
};
pub use types::{Config, FakeDnsConfig, LogConfig, SniffConfig};
