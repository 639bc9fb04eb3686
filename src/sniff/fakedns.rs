//! Fake-DNS sniffers
//!
//! When the proxy answers DNS queries with synthetic addresses, the
//! destination address of a later connection identifies the domain the
//! client asked for. Two entries use that:
//!
//! - [`FakeDnsSniffer`] runs in the metadata phase and reports the domain
//!   behind a synthetic destination.
//! - [`FakeDnsThenOthers`] runs in the payload phase and pairs that domain
//!   with whatever protocol the payload sniffers detect.

use std::net::IpAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SniffError;
use crate::net::SniffContext;

use super::engine::{ProtocolSniffer, Sniffer};
use super::result::SniffResult;

/// Reverse lookup into the fake-DNS address pool
///
/// Shared between all connections, so implementations synchronize
/// internally.
pub trait FakeDnsEngine: Send + Sync {
    /// Domain a synthetic address was handed out for, if still mapped
    fn domain_for_ip(&self, ip: IpAddr) -> Option<String>;

    /// Whether `ip` lies inside a synthetic address pool
    fn is_fake_ip(&self, ip: IpAddr) -> bool;
}

/// Fake-DNS sniffing result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeDnsSniffResult {
    pub domain: String,
}

/// Classification of a destination address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeDnsLookup {
    /// Synthetic address with a live mapping
    Resolved(String),
    /// Synthetic address whose mapping is gone
    Unmapped,
    /// Not a synthetic address, or no destination at all
    NotFake,
}

/// Metadata-phase sniffer reporting the domain behind a synthetic address
#[derive(Clone)]
pub struct FakeDnsSniffer {
    engine: Arc<dyn FakeDnsEngine>,
}

impl FakeDnsSniffer {
    pub fn new(engine: Arc<dyn FakeDnsEngine>) -> Self {
        Self { engine }
    }

    /// Look up the destination of a connection
    #[must_use]
    pub fn lookup(&self, ctx: &SniffContext) -> FakeDnsLookup {
        let Some(ip) = ctx.destination_ip() else {
            return FakeDnsLookup::NotFake;
        };
        if !self.engine.is_fake_ip(ip) {
            return FakeDnsLookup::NotFake;
        }
        match self.engine.domain_for_ip(ip) {
            Some(domain) => FakeDnsLookup::Resolved(domain),
            None => FakeDnsLookup::Unmapped,
        }
    }
}

impl std::fmt::Debug for FakeDnsSniffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeDnsSniffer").finish_non_exhaustive()
    }
}

impl ProtocolSniffer for FakeDnsSniffer {
    fn name(&self) -> &'static str {
        "fakedns"
    }

    fn sniff(&mut self, ctx: &SniffContext, _payload: &[u8]) -> Result<SniffResult, SniffError> {
        match self.lookup(ctx) {
            FakeDnsLookup::Resolved(domain) => {
                trace!("Fake IP {:?} maps to {}", ctx.destination, domain);
                Ok(SniffResult::fake_dns(domain))
            }
            FakeDnsLookup::Unmapped | FakeDnsLookup::NotFake => Err(SniffError::UnknownContent),
        }
    }
}

/// Payload-phase combinator: fake-DNS domain first, then the other sniffers
///
/// Owns a private engine over the payload sniffers, which narrows on its own
/// across calls.
#[derive(Debug)]
pub struct FakeDnsThenOthers {
    fake_dns: FakeDnsSniffer,
    others: Sniffer,
}

impl FakeDnsThenOthers {
    pub fn new(fake_dns: FakeDnsSniffer, others: Sniffer) -> Self {
        Self { fake_dns, others }
    }
}

impl ProtocolSniffer for FakeDnsThenOthers {
    fn name(&self) -> &'static str {
        "fakedns+others"
    }

    fn sniff(&mut self, ctx: &SniffContext, payload: &[u8]) -> Result<SniffResult, SniffError> {
        match self.fake_dns.lookup(ctx) {
            // Leave the connection to the individual entries
            FakeDnsLookup::NotFake => Err(SniffError::UnknownContent),
            FakeDnsLookup::Resolved(domain) => match self.others.sniff(ctx, payload, false) {
                Ok(result) => Ok(SniffResult::composite(SniffResult::fake_dns(domain), result)),
                Err(SniffError::NeedMoreData) => Err(SniffError::NeedMoreData),
                Err(SniffError::UnknownContent) => Ok(SniffResult::fake_dns(domain)),
            },
            FakeDnsLookup::Unmapped => {
                trace!("Fake IP {:?} has no mapping", ctx.destination);
                self.others
                    .sniff(ctx, payload, false)
                    .map(|result| SniffResult::FakeDnsOthers(Box::new(result)))
            }
        }
    }
}
