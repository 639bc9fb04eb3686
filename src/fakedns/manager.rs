//! FakeDNS manager - DashMap-based in-memory implementation
//!
//! Hands out synthetic addresses for domains and answers the reverse
//! lookup the sniffing pipeline performs on connection destinations.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use tracing::{trace, warn};

use super::cache::{FakeDnsCache, FakeDnsCacheStatsSnapshot};
use super::pool::FakeIpPool;
use crate::config::FakeDnsConfig;
use crate::error::FakeDnsError;
use crate::sniff::FakeDnsEngine;

/// Result type for FakeDNS operations
pub type FakeDnsResult<T> = Result<T, FakeDnsError>;

/// Upper bound on pool probes per allocation
const MAX_PROBES: u64 = 65536;

/// FakeDNS manager for domain-to-IP mapping
#[derive(Debug)]
pub struct FakeDnsManager {
    cache: FakeDnsCache,
    ipv4_pool: FakeIpPool,
    ipv6_pool: Option<FakeIpPool>,
    ttl: Duration,
}

impl FakeDnsManager {
    /// Create a new FakeDNS manager with the given configuration
    #[must_use]
    pub fn new(config: &FakeDnsConfig) -> Self {
        Self::with_ttl(config, config.ttl())
    }

    /// Like [`new`](Self::new), with an explicit mapping lifetime
    #[must_use]
    pub fn with_ttl(config: &FakeDnsConfig, ttl: Duration) -> Self {
        Self {
            cache: FakeDnsCache::new(config.max_entries),
            ipv4_pool: FakeIpPool::new(config.ipv4_pool),
            ipv6_pool: config.ipv6_pool.map(FakeIpPool::new),
            ttl,
        }
    }

    /// Map a domain name to an IPv4 address
    ///
    /// An existing live mapping is refreshed and returned.
    ///
    /// # Errors
    ///
    /// Returns `FakeDnsError::PoolExhausted` if every probed address is held
    /// by another domain.
    pub fn map_domain_ipv4(&self, domain: &str) -> FakeDnsResult<Ipv4Addr> {
        match self.map_domain(domain, &self.ipv4_pool)? {
            IpAddr::V4(ip) => Ok(ip),
            IpAddr::V6(_) => Err(FakeDnsError::PoolExhausted),
        }
    }

    /// Map a domain name to an IPv6 address
    ///
    /// # Errors
    ///
    /// Returns `FakeDnsError::Ipv6NotEnabled` if no IPv6 pool is configured.
    pub fn map_domain_ipv6(&self, domain: &str) -> FakeDnsResult<Ipv6Addr> {
        let pool = self.ipv6_pool.as_ref().ok_or(FakeDnsError::Ipv6NotEnabled)?;
        match self.map_domain(domain, pool)? {
            IpAddr::V6(ip) => Ok(ip),
            IpAddr::V4(_) => Err(FakeDnsError::PoolExhausted),
        }
    }

    /// Look up the domain name for a given IP address
    #[must_use]
    pub fn map_ip_domain(&self, ip: IpAddr) -> Option<String> {
        self.cache.get_domain_by_ip(ip)
    }

    /// Check if an IP address belongs to a fake-DNS pool
    #[must_use]
    pub fn is_fake_ip(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(_) => self.ipv4_pool.contains(ip),
            IpAddr::V6(_) => self.ipv6_pool.as_ref().is_some_and(|p| p.contains(ip)),
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of mapped domains
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> FakeDnsCacheStatsSnapshot {
        self.cache.stats().snapshot()
    }

    /// Remove expired entries; returns how many domains were dropped
    pub fn cleanup(&self) -> usize {
        self.cache.cleanup_expired()
    }

    fn map_domain(&self, domain: &str, pool: &FakeIpPool) -> FakeDnsResult<IpAddr> {
        let ipv6 = pool.network().network().is_ipv6();

        if let Some(ip) = self.cache.get_domain(domain).and_then(|e| e.addr(ipv6)) {
            self.cache.refresh(domain, self.ttl);
            trace!("fakedns cache hit: {} -> {}", domain, ip);
            return Ok(ip);
        }

        for _ in 0..pool.size().min(MAX_PROBES) {
            let Some(ip) = pool.next() else { break };
            if !self.cache.is_in_use(ip) {
                self.cache.insert(domain, ip, self.ttl);
                trace!("fakedns allocated: {} -> {}", domain, ip);
                return Ok(ip);
            }
        }

        warn!("FakeDNS pool {} exhausted for domain: {}", pool.network(), domain);
        Err(FakeDnsError::PoolExhausted)
    }
}

impl FakeDnsEngine for FakeDnsManager {
    fn domain_for_ip(&self, ip: IpAddr) -> Option<String> {
        self.map_ip_domain(ip)
    }

    fn is_fake_ip(&self, ip: IpAddr) -> bool {
        Self::is_fake_ip(self, ip)
    }
}
