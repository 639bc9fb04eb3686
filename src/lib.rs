//! flow-sniffer: progressive protocol and domain sniffing for proxy dispatchers
//!
//! Given the first bytes of a connection (and, for the metadata phase, where
//! the connection is going), the [`Sniffer`] decides which application
//! protocol is being spoken and which host it targets, so a router can pick
//! an outbound by SNI, `Host` header or protocol family.
//!
//! # Features
//!
//! - **Progressive**: sniffers that need more bytes are retried, sniffers
//!   that rejected the content are dropped for the rest of the connection
//! - **Two phases**: metadata sniffers (DNS, fake DNS) run at connection
//!   establishment, payload sniffers (HTTP, TLS, BitTorrent) as bytes arrive
//! - **Composite results**: a domain from one source, a protocol from another
//! - **Fake DNS**: in-memory synthetic address pool (`fakedns` feature)
//!
//! # Architecture
//!
//! ```text
//! Connection → SniffSession ─ metadata phase ─→ Sniffer → [dns, fakedns]
//!                   │                              │
//!                   └──── payload phase ──────→ [fakedns+others, http, tls, bittorrent]
//!                                                   ↓
//!                                              SniffResult
//! ```
//!
//! # Quick Start
//!
//! ```
//! use flow_sniffer::config::SniffConfig;
//! use flow_sniffer::net::SniffContext;
//! use flow_sniffer::sniff::{SniffSession, SnifferRegistry};
//!
//! let ctx = SniffContext::tcp("93.184.216.34:80".parse().unwrap());
//! let mut session =
//!     SniffSession::new(&SnifferRegistry::new(), ctx, &SniffConfig::default()).unwrap();
//!
//! let result = session.feed(b"GET / HTTP/1.1\r\nHost: a.com\r\n\r\n").unwrap();
//! assert_eq!(result.domain(), "a.com");
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration types and loading
//! - [`error`]: Error types
//! - [`fakedns`]: In-memory fake-DNS engine
//! - [`logging`]: Subscriber setup and log handler registry
//! - [`net`]: Connection metadata
//! - [`sniff`]: The sniffing engine and protocol sniffers

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
#[cfg(feature = "fakedns")]
pub mod fakedns;
pub mod logging;
pub mod net;
pub mod sniff;

// Re-export commonly used types at the crate root
pub use config::{Config, FakeDnsConfig, LogConfig, SniffConfig};
pub use error::{
    ConfigError, FakeDnsError, FlowSnifferError, LogError, Result, SessionError, SniffError,
};
#[cfg(feature = "fakedns")]
pub use fakedns::FakeDnsManager;
pub use logging::{init_logging, LogHandlerRegistry, LogType};
pub use net::{Network, SniffContext};
pub use sniff::{
    CompositeResult, FakeDnsEngine, ProtocolSniffer, SniffEntry, SniffResult, SniffSession,
    Sniffer, SnifferRegistry,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
