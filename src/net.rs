//! Connection metadata handed to sniffers
//!
//! Metadata-phase sniffers look at where a connection is going rather than
//! at its bytes, so every call into the engine carries a [`SniffContext`].

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Transport network of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Stream transport
    #[default]
    Tcp,
    /// Datagram transport
    Udp,
    /// Unix domain socket
    Unix,
}

impl Network {
    /// Name as used by the system socket APIs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Unix => "unix",
        }
    }

    /// Whether this transport is connectionless
    #[must_use]
    pub const fn is_datagram(&self) -> bool {
        matches!(self, Self::Udp)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    /// Only `tcp` and `udp` are accepted from configuration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(ConfigError::validation(format!(
                "unsupported network {other}"
            ))),
        }
    }
}

/// Per-call connection metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SniffContext {
    /// Transport of the connection being sniffed
    pub network: Network,
    /// Original destination, if known
    pub destination: Option<SocketAddr>,
}

impl SniffContext {
    /// Create a context for a stream connection
    #[must_use]
    pub const fn tcp(destination: SocketAddr) -> Self {
        Self {
            network: Network::Tcp,
            destination: Some(destination),
        }
    }

    /// Create a context for a datagram flow
    #[must_use]
    pub const fn udp(destination: SocketAddr) -> Self {
        Self {
            network: Network::Udp,
            destination: Some(destination),
        }
    }

    /// Create a context with no destination
    #[must_use]
    pub const fn without_destination(network: Network) -> Self {
        Self {
            network,
            destination: None,
        }
    }

    /// Destination IP address, if any
    #[must_use]
    pub fn destination_ip(&self) -> Option<IpAddr> {
        self.destination.map(|addr| addr.ip())
    }
}
