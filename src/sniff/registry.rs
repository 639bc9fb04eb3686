//! Pipeline configuration shared by all connections
//!
//! A [`SnifferRegistry`] is built once at startup and handed to
//! [`Sniffer::new`](super::engine::Sniffer::new) for every connection. It
//! carries the two things that change how a pipeline is assembled: an
//! optional alternative sniffer that replaces the built-in list, and an
//! optional fake-DNS engine.

use std::sync::Arc;

use super::engine::{ProtocolSniffer, SniffEntry};
use super::fakedns::FakeDnsEngine;

/// Builds a fresh classifier for each connection
pub type SnifferFactory = Arc<dyn Fn() -> Box<dyn ProtocolSniffer> + Send + Sync>;

/// Replacement for the built-in pipeline
#[derive(Clone)]
pub struct AlternativeSniffer {
    factory: SnifferFactory,
    metadata_only: bool,
}

impl AlternativeSniffer {
    /// Instantiate the entry for one connection
    #[must_use]
    pub fn build(&self) -> SniffEntry {
        SniffEntry::from_boxed((self.factory)(), self.metadata_only)
    }

    #[must_use]
    pub const fn is_metadata_only(&self) -> bool {
        self.metadata_only
    }
}

#[derive(Clone, Default)]
pub struct SnifferRegistry {
    alternative: Option<AlternativeSniffer>,
    fake_dns: Option<Arc<dyn FakeDnsEngine>>,
}

impl SnifferRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the built-in pipeline with a single externally supplied entry
    #[must_use]
    pub fn with_alternative<F>(mut self, factory: F, metadata_only: bool) -> Self
    where
        F: Fn() -> Box<dyn ProtocolSniffer> + Send + Sync + 'static,
    {
        self.alternative = Some(AlternativeSniffer {
            factory: Arc::new(factory),
            metadata_only,
        });
        self
    }

    /// Enable the fake-DNS entries
    #[must_use]
    pub fn with_fake_dns(mut self, engine: Arc<dyn FakeDnsEngine>) -> Self {
        self.fake_dns = Some(engine);
        self
    }

    #[must_use]
    pub fn alternative(&self) -> Option<&AlternativeSniffer> {
        self.alternative.as_ref()
    }

    #[must_use]
    pub fn fake_dns(&self) -> Option<&Arc<dyn FakeDnsEngine>> {
        self.fake_dns.as_ref()
    }
}

impl std::fmt::Debug for SnifferRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnifferRegistry")
            .field(
                "alternative",
                &self.alternative.as_ref().map(|a| a.metadata_only),
            )
            .field("fake_dns", &self.fake_dns.is_some())
            .finish()
    }
}
