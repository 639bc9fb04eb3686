//! Bidirectional cache for fake-DNS mappings
//!
//! Two `DashMap`s kept in step: domain to addresses for allocation, and
//! address to domain for the reverse lookup sniffing depends on.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Addresses held by one domain
#[derive(Debug, Clone)]
pub struct DomainEntry {
    pub addrs: Vec<IpAddr>,
    pub expires_at: Instant,
}

impl DomainEntry {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }

    /// Remaining TTL, or zero if expired
    #[must_use]
    pub fn remaining_ttl(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// First address of the requested family
    #[must_use]
    pub fn addr(&self, ipv6: bool) -> Option<IpAddr> {
        self.addrs.iter().copied().find(|a| a.is_ipv6() == ipv6)
    }
}

#[derive(Debug, Clone)]
struct IpEntry {
    domain: String,
    expires_at: Instant,
}

impl IpEntry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Counters for the fake-DNS cache
#[derive(Debug, Default)]
pub struct FakeDnsCacheStats {
    /// Total number of allocations
    pub allocations: AtomicU64,
    /// Reverse lookups (IP -> domain)
    pub lookups: AtomicU64,
    /// Reverse lookups that found a live mapping
    pub lookup_hits: AtomicU64,
    /// Entries removed by expiry or capacity
    pub evictions: AtomicU64,
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeDnsCacheStatsSnapshot {
    pub allocations: u64,
    pub lookups: u64,
    pub lookup_hits: u64,
    pub evictions: u64,
}

impl FakeDnsCacheStats {
    #[must_use]
    pub fn snapshot(&self) -> FakeDnsCacheStatsSnapshot {
        FakeDnsCacheStatsSnapshot {
            allocations: self.allocations.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            lookup_hits: self.lookup_hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct FakeDnsCache {
    domains: DashMap<String, DomainEntry>,
    addrs: DashMap<IpAddr, IpEntry>,
    max_entries: usize,
    stats: FakeDnsCacheStats,
}

impl FakeDnsCache {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            domains: DashMap::new(),
            addrs: DashMap::new(),
            max_entries,
            stats: FakeDnsCacheStats::default(),
        }
    }

    /// Live entry for a domain
    #[must_use]
    pub fn get_domain(&self, domain: &str) -> Option<DomainEntry> {
        self.domains
            .get(domain)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.clone())
    }

    /// Domain a live mapping points at
    #[must_use]
    pub fn get_domain_by_ip(&self, ip: IpAddr) -> Option<String> {
        self.stats.lookups.fetch_add(1, Ordering::Relaxed);
        let domain = self
            .addrs
            .get(&ip)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.domain.clone());
        if domain.is_some() {
            self.stats.lookup_hits.fetch_add(1, Ordering::Relaxed);
        }
        domain
    }

    /// Whether `ip` is held by a live mapping
    #[must_use]
    pub fn is_in_use(&self, ip: IpAddr) -> bool {
        self.addrs.get(&ip).is_some_and(|entry| !entry.is_expired())
    }

    /// Bind `ip` to `domain`, keeping the domain's other addresses
    ///
    /// A stale mapping that previously held `ip` is dropped. At capacity the
    /// entry closest to expiry makes room.
    pub fn insert(&self, domain: &str, ip: IpAddr, ttl: Duration) {
        self.stats.allocations.fetch_add(1, Ordering::Relaxed);
        let expires_at = Instant::now() + ttl;

        if let Some((_, previous)) = self.addrs.remove(&ip) {
            if previous.domain != domain {
                self.remove_domain(&previous.domain);
            }
        }

        if !self.domains.contains_key(domain) && self.domains.len() >= self.max_entries {
            self.evict_one();
        }

        self.addrs.insert(
            ip,
            IpEntry {
                domain: domain.to_string(),
                expires_at,
            },
        );

        let mut entry = self
            .domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainEntry {
                addrs: Vec::new(),
                expires_at,
            });
        entry.addrs.retain(|a| a.is_ipv6() != ip.is_ipv6());
        entry.addrs.push(ip);
        entry.expires_at = expires_at;
    }

    /// Extend the lifetime of a domain and all of its addresses
    pub fn refresh(&self, domain: &str, ttl: Duration) -> bool {
        let Some(mut entry) = self.domains.get_mut(domain) else {
            return false;
        };
        let expires_at = Instant::now() + ttl;
        entry.expires_at = expires_at;
        for addr in &entry.addrs {
            if let Some(mut ip_entry) = self.addrs.get_mut(addr) {
                ip_entry.expires_at = expires_at;
            }
        }
        true
    }

    /// Remove expired entries from both maps
    ///
    /// Returns the number of domains removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.domains.retain(|_, entry| {
            let keep = !entry.is_expired();
            if !keep {
                removed += 1;
            }
            keep
        });
        self.addrs.retain(|_, entry| !entry.is_expired());

        if removed > 0 {
            self.stats
                .evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Number of mapped domains
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    #[must_use]
    pub const fn max_entries(&self) -> usize {
        self.max_entries
    }

    #[must_use]
    pub const fn stats(&self) -> &FakeDnsCacheStats {
        &self.stats
    }

    fn remove_domain(&self, domain: &str) {
        if let Some((_, entry)) = self.domains.remove(domain) {
            for addr in entry.addrs {
                self.addrs.remove_if(&addr, |_, ip_entry| ip_entry.domain == domain);
            }
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn evict_one(&self) {
        if self.cleanup_expired() > 0 {
            return;
        }
        let oldest = self
            .domains
            .iter()
            .min_by_key(|entry| entry.expires_at)
            .map(|entry| entry.key().clone());
        if let Some(domain) = oldest {
            self.remove_domain(&domain);
        }
    }
}
