//! Progressive classification engine
//!
//! A [`Sniffer`] owns an ordered list of [`SniffEntry`] values and is fed the
//! same connection over several calls. Each call runs the entries eligible
//! for the phase (metadata or payload). Entries that answer `NeedMoreData`
//! are kept for the next call; entries that answer `UnknownContent` are
//! dropped once any other entry is still pending.
//!
//! One instance serves exactly one connection.

use tracing::{debug, trace};

use crate::error::SniffError;
use crate::net::SniffContext;

use super::bittorrent::BitTorrentSniffer;
use super::dns::DnsSniffer;
use super::fakedns::{FakeDnsSniffer, FakeDnsThenOthers};
use super::http::HttpSniffer;
use super::registry::SnifferRegistry;
use super::result::SniffResult;
use super::tls::TlsSniffer;

/// A single classifier
///
/// `sniff` may be called repeatedly with a growing payload. Implementations
/// answer `NeedMoreData` while the bytes are a valid prefix and
/// `UnknownContent` once they are not.
pub trait ProtocolSniffer: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Classify the payload seen so far
    ///
    /// # Errors
    ///
    /// `NeedMoreData` or `UnknownContent`, see the trait documentation.
    fn sniff(&mut self, ctx: &SniffContext, payload: &[u8]) -> Result<SniffResult, SniffError>;
}

/// A classifier tagged with the phase it runs in
pub struct SniffEntry {
    sniffer: Box<dyn ProtocolSniffer>,
    metadata_only: bool,
}

impl SniffEntry {
    pub fn new(sniffer: impl ProtocolSniffer + 'static, metadata_only: bool) -> Self {
        Self::from_boxed(Box::new(sniffer), metadata_only)
    }

    #[must_use]
    pub fn from_boxed(sniffer: Box<dyn ProtocolSniffer>, metadata_only: bool) -> Self {
        Self {
            sniffer,
            metadata_only,
        }
    }

    /// Entry that runs on connection bytes
    pub fn payload(sniffer: impl ProtocolSniffer + 'static) -> Self {
        Self::new(sniffer, false)
    }

    /// Entry that runs once at connection establishment
    pub fn metadata(sniffer: impl ProtocolSniffer + 'static) -> Self {
        Self::new(sniffer, true)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.sniffer.name()
    }

    #[must_use]
    pub const fn is_metadata_only(&self) -> bool {
        self.metadata_only
    }
}

impl std::fmt::Debug for SniffEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SniffEntry")
            .field("sniffer", &self.name())
            .field("metadata_only", &self.metadata_only)
            .finish()
    }
}

/// The built-in pipeline without fake DNS
///
/// HTTP, TLS and BitTorrent on the payload; DNS queries on metadata.
#[must_use]
pub fn builtin_entries() -> Vec<SniffEntry> {
    vec![
        SniffEntry::payload(HttpSniffer),
        SniffEntry::payload(TlsSniffer),
        SniffEntry::payload(BitTorrentSniffer),
        SniffEntry::metadata(DnsSniffer),
    ]
}

/// Per-connection progressive sniffer
#[derive(Debug)]
pub struct Sniffer {
    entries: Vec<SniffEntry>,
}

impl Sniffer {
    /// Assemble the pipeline for a new connection
    ///
    /// An alternative sniffer in the registry replaces everything else. With
    /// a fake-DNS engine, a metadata fake-DNS entry is appended and the
    /// fake-DNS-then-others combinator is placed first.
    #[must_use]
    pub fn new(registry: &SnifferRegistry) -> Self {
        if let Some(alternative) = registry.alternative() {
            let sniffer = Self::from_entries(vec![alternative.build()]);
            debug!(entries = ?sniffer.entry_names(), "Using alternative sniffer");
            return sniffer;
        }

        let mut entries = builtin_entries();
        if let Some(engine) = registry.fake_dns() {
            let others = Self::from_entries(builtin_entries());
            entries.push(SniffEntry::metadata(FakeDnsSniffer::new(engine.clone())));
            entries.insert(
                0,
                SniffEntry::payload(FakeDnsThenOthers::new(
                    FakeDnsSniffer::new(engine.clone()),
                    others,
                )),
            );
        }

        let sniffer = Self::from_entries(entries);
        trace!(entries = ?sniffer.entry_names(), "Sniffer pipeline assembled");
        sniffer
    }

    #[must_use]
    pub fn from_entries(entries: Vec<SniffEntry>) -> Self {
        Self { entries }
    }

    /// Run one phase over the payload seen so far
    ///
    /// With `metadata` set only metadata entries run, otherwise only payload
    /// entries. A DNS query result is held back so that a later metadata
    /// entry can pair its domain with it.
    ///
    /// # Errors
    ///
    /// `NeedMoreData` if no entry decided and at least one asked for more
    /// bytes; the entry list is narrowed in that case. `UnknownContent` if
    /// every eligible entry rejected.
    pub fn sniff(
        &mut self,
        ctx: &SniffContext,
        payload: &[u8],
        metadata: bool,
    ) -> Result<SniffResult, SniffError> {
        let mut pending = vec![false; self.entries.len()];
        let mut dns_query: Option<SniffResult> = None;

        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.metadata_only != metadata {
                continue;
            }

            match entry.sniffer.sniff(ctx, payload) {
                Ok(result) if result.is_dns_query() => {
                    trace!(sniffer = entry.name(), domain = result.domain(), "DNS query held back");
                    dns_query.get_or_insert(result);
                }
                Ok(result) => {
                    trace!(sniffer = entry.name(), %result, "Sniffed");
                    if metadata {
                        if let Some(query) = dns_query.take() {
                            return Ok(SniffResult::composite(result, query));
                        }
                    }
                    return Ok(result);
                }
                Err(SniffError::NeedMoreData) => {
                    trace!(sniffer = entry.name(), "Needs more data");
                    pending[index] = true;
                }
                Err(SniffError::UnknownContent) => {
                    trace!(sniffer = entry.name(), "Rejected");
                }
            }
        }

        if let Some(query) = dns_query {
            return Ok(query);
        }

        if pending.iter().any(|&p| p) {
            let mut index = 0;
            self.entries.retain(|entry| {
                let keep = entry.metadata_only != metadata || pending[index];
                index += 1;
                keep
            });
            debug!(remaining = ?self.entry_names(), "Sniffer narrowed");
            return Err(SniffError::NeedMoreData);
        }

        Err(SniffError::UnknownContent)
    }

    /// Number of entries still in the pipeline
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the remaining entries, in order
    #[must_use]
    pub fn entry_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(SniffEntry::name).collect()
    }
}

impl Default for Sniffer {
    fn default() -> Self {
        Self::new(&SnifferRegistry::default())
    }
}
