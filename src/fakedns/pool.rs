//! Fake IP pool management
//!
//! Addresses are handed out by a cycling iterator over the pool's host
//! range, so allocation is spread evenly and wraps around. Whether an
//! address is still in use is the cache's business, not the pool's.

use std::iter::Cycle;
use std::net::IpAddr;

use ipnet::{IpAddrRange, IpNet};
use parking_lot::Mutex;

/// Address pool with cycling allocation
#[derive(Debug)]
pub struct FakeIpPool {
    cycle: Mutex<Cycle<IpAddrRange>>,
    network: IpNet,
    size: u64,
}

impl FakeIpPool {
    /// Create a pool over the host addresses of `network`
    #[must_use]
    pub fn new(network: impl Into<IpNet>) -> Self {
        let network = network.into();
        Self {
            cycle: Mutex::new(network.hosts().cycle()),
            size: host_count(&network),
            network,
        }
    }

    /// Next candidate address, `None` only for an empty pool
    #[must_use]
    pub fn next(&self) -> Option<IpAddr> {
        self.cycle.lock().next()
    }

    /// Check if an address is within this pool's range
    #[must_use]
    pub fn contains(&self, addr: IpAddr) -> bool {
        self.network.contains(&addr)
    }

    /// Number of allocatable addresses, capped at `u64::MAX`
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn network(&self) -> IpNet {
        self.network
    }
}

/// Matches what `IpNet::hosts` yields: IPv4 networks wider than /31 lose
/// their network and broadcast addresses, IPv6 networks keep everything.
fn host_count(network: &IpNet) -> u64 {
    let host_bits = u32::from(network.max_prefix_len() - network.prefix_len());
    if host_bits >= 64 {
        return u64::MAX;
    }
    let total = 1u64 << host_bits;
    match network {
        IpNet::V4(_) if host_bits >= 2 => total - 2,
        _ => total,
    }
}
