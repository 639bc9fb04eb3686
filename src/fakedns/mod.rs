//! In-memory fake-DNS engine
//!
//! Maps domain names to synthetic addresses drawn from a configured pool
//! and keeps the reverse mapping, so that a connection to a synthetic
//! address can be attributed to the domain the client resolved.
//!
//! ## Features
//!
//! - **Bidirectional mapping**: Domain -> IP and IP -> Domain lookups
//! - **Thread-safe**: `DashMap` for the mappings, `parking_lot` for the pool cursor
//! - **TTL-based expiration**: expired addresses stay "fake" but lose their domain
//! - **IPv4 and IPv6 support**: Optional IPv6 pool configuration
//!
//! ## Example
//!
//! ```
//! use std::net::IpAddr;
//! use flow_sniffer::config::FakeDnsConfig;
//! use flow_sniffer::fakedns::FakeDnsManager;
//!
//! let manager = FakeDnsManager::new(&FakeDnsConfig::new());
//! let ip = manager.map_domain_ipv4("example.com").unwrap();
//! assert_eq!(manager.map_ip_domain(IpAddr::V4(ip)).as_deref(), Some("example.com"));
//! ```

pub mod cache;
pub mod manager;
pub mod pool;

pub use cache::{FakeDnsCache, FakeDnsCacheStats, FakeDnsCacheStatsSnapshot};
pub use manager::{FakeDnsManager, FakeDnsResult};
pub use pool::FakeIpPool;
