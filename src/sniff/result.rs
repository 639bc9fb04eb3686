//! Sniff result types
//!
//! A [`SniffResult`] is a closed set of variants, one per producer. Every
//! variant answers `protocol()` and `domain()`; an absent domain is the empty
//! string. Cross-facet data of a composite is reached through
//! [`SniffResult::as_composite`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::bittorrent::BitTorrentSniffResult;
use super::dns::DnsSniffResult;
use super::fakedns::FakeDnsSniffResult;
use super::http::HttpSniffResult;
use super::tls::TlsSniffResult;

/// Protocol name reported by DNS query results
pub const PROTOCOL_DNS: &str = "dns";
/// Protocol name reported by fake-DNS results
pub const PROTOCOL_FAKEDNS: &str = "fakedns";
/// Protocol name reported when fake DNS knew the address but not the domain
pub const PROTOCOL_FAKEDNS_OTHERS: &str = "fakedns+others";

/// Result of protocol sniffing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SniffResult {
    /// HTTP/1.x request
    Http(HttpSniffResult),
    /// TLS ClientHello
    Tls(TlsSniffResult),
    /// BitTorrent handshake (TCP) or uTP packet (UDP)
    BitTorrent(BitTorrentSniffResult),
    /// DNS A/AAAA query
    Dns(DnsSniffResult),
    /// Destination was a fake-DNS address with a known domain
    FakeDns(FakeDnsSniffResult),
    /// Destination was a fake-DNS address without a mapping; the wrapped
    /// result came from the payload sniffers
    FakeDnsOthers(Box<SniffResult>),
    /// A domain-bearing and a protocol-bearing result combined
    Composite(CompositeResult),
    /// Result produced by an externally supplied sniffer
    Other(OtherSniffResult),
}

impl SniffResult {
    /// Combine a domain-bearing result with a protocol-bearing one
    #[must_use]
    pub fn composite(domain_result: SniffResult, protocol_result: SniffResult) -> Self {
        Self::Composite(CompositeResult::new(domain_result, protocol_result))
    }

    /// Create a fake-DNS result
    pub fn fake_dns(domain: impl Into<String>) -> Self {
        Self::FakeDns(FakeDnsSniffResult {
            domain: domain.into(),
        })
    }

    /// Create a result for an external sniffer
    pub fn other(protocol: impl Into<String>, domain: impl Into<String>) -> Self {
        Self::Other(OtherSniffResult {
            protocol: protocol.into(),
            domain: domain.into(),
        })
    }

    /// Detected protocol name
    #[must_use]
    pub fn protocol(&self) -> &str {
        match self {
            Self::Http(_) => "http",
            Self::Tls(_) => "tls",
            Self::BitTorrent(_) => "bittorrent",
            Self::Dns(_) => PROTOCOL_DNS,
            Self::FakeDns(_) => PROTOCOL_FAKEDNS,
            Self::FakeDnsOthers(_) => PROTOCOL_FAKEDNS_OTHERS,
            Self::Composite(c) => c.protocol(),
            Self::Other(o) => &o.protocol,
        }
    }

    /// Detected domain, or the empty string
    #[must_use]
    pub fn domain(&self) -> &str {
        match self {
            Self::Http(r) => r.host.as_deref().unwrap_or(""),
            Self::Tls(r) => r.sni.as_deref().unwrap_or(""),
            Self::BitTorrent(_) => "",
            Self::Dns(r) => &r.domain,
            Self::FakeDns(r) => &r.domain,
            Self::FakeDnsOthers(inner) => inner.domain(),
            Self::Composite(c) => c.domain(),
            Self::Other(o) => &o.domain,
        }
    }

    /// Whether the detected protocol belongs to the family `name`
    ///
    /// A TLS 1.3 ClientHello answers `true` for both `"tls"` and `"tls1.3"`.
    #[must_use]
    pub fn protocol_is_subset_of(&self, name: &str) -> bool {
        if self.protocol() == name {
            return true;
        }
        match self {
            Self::Tls(r) => r.version_name() == Some(name),
            Self::FakeDnsOthers(inner) => {
                name.starts_with(inner.protocol()) || inner.protocol_is_subset_of(name)
            }
            Self::Composite(c) => c.protocol_result().protocol_is_subset_of(name),
            _ => false,
        }
    }

    /// The composite view of this result, if it is one
    #[must_use]
    pub fn as_composite(&self) -> Option<&CompositeResult> {
        match self {
            Self::Composite(c) => Some(c),
            _ => None,
        }
    }

    /// Whether this is a DNS query result
    #[must_use]
    pub const fn is_dns_query(&self) -> bool {
        matches!(self, Self::Dns(_))
    }
}

impl fmt::Display for SniffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let domain = self.domain();
        if domain.is_empty() {
            f.write_str(self.protocol())
        } else {
            write!(f, "{} ({})", self.protocol(), domain)
        }
    }
}

/// Domain-bearing and protocol-bearing results paired together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeResult {
    domain_result: Box<SniffResult>,
    protocol_result: Box<SniffResult>,
}

impl CompositeResult {
    /// Pair two results; the caller is responsible for pairing compatible halves
    #[must_use]
    pub fn new(domain_result: SniffResult, protocol_result: SniffResult) -> Self {
        Self {
            domain_result: Box::new(domain_result),
            protocol_result: Box::new(protocol_result),
        }
    }

    /// Protocol of the protocol-bearing half
    #[must_use]
    pub fn protocol(&self) -> &str {
        self.protocol_result.protocol()
    }

    /// Domain of the domain-bearing half
    #[must_use]
    pub fn domain(&self) -> &str {
        self.domain_result.domain()
    }

    /// Protocol reported by the domain-bearing half
    #[must_use]
    pub fn protocol_of_domain_result(&self) -> &str {
        self.domain_result.protocol()
    }

    /// Domain reported by the protocol-bearing half
    #[must_use]
    pub fn domain_of_protocol_result(&self) -> &str {
        self.protocol_result.domain()
    }

    /// The domain-bearing half
    #[must_use]
    pub fn domain_result(&self) -> &SniffResult {
        &self.domain_result
    }

    /// The protocol-bearing half
    #[must_use]
    pub fn protocol_result(&self) -> &SniffResult {
        &self.protocol_result
    }

    /// Split back into `(domain_result, protocol_result)`
    #[must_use]
    pub fn into_parts(self) -> (SniffResult, SniffResult) {
        (*self.domain_result, *self.protocol_result)
    }
}

/// Result of an externally supplied sniffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherSniffResult {
    /// Protocol name chosen by the external sniffer
    pub protocol: String,
    /// Domain, or empty
    #[serde(default)]
    pub domain: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sniff::bittorrent::BitTorrentTransport;
    use crate::sniff::dns::QueryType;

    fn http(host: &str) -> SniffResult {
        SniffResult::Http(HttpSniffResult {
            host: Some(host.to_string()),
            method: Some("GET".to_string()),
            path: Some("/".to_string()),
            version: Some(1),
        })
    }

    fn dns(domain: &str) -> SniffResult {
        SniffResult::Dns(DnsSniffResult {
            domain: domain.to_string(),
            id: 7,
            query_type: QueryType::A,
        })
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(http("a.com").protocol(), "http");
        assert_eq!(SniffResult::Tls(TlsSniffResult::default()).protocol(), "tls");
        assert_eq!(
            SniffResult::BitTorrent(BitTorrentSniffResult {
                transport: BitTorrentTransport::Tcp
            })
            .protocol(),
            "bittorrent"
        );
        assert_eq!(dns("a.com").protocol(), "dns");
        assert_eq!(SniffResult::fake_dns("a.com").protocol(), "fakedns");
        assert_eq!(
            SniffResult::FakeDnsOthers(Box::new(http("a.com"))).protocol(),
            "fakedns+others"
        );
        assert_eq!(SniffResult::other("quic", "").protocol(), "quic");
    }

    #[test]
    fn test_missing_domain_is_empty() {
        let result = SniffResult::Http(HttpSniffResult::default());
        assert_eq!(result.domain(), "");

        let result = SniffResult::BitTorrent(BitTorrentSniffResult {
            transport: BitTorrentTransport::Utp,
        });
        assert_eq!(result.domain(), "");
    }

    #[test]
    fn test_composite_accessors() {
        let result = SniffResult::composite(SniffResult::fake_dns("example.com"), dns("other.org"));
        assert_eq!(result.protocol(), "dns");
        assert_eq!(result.domain(), "example.com");

        let composite = result.as_composite().expect("composite");
        assert_eq!(composite.protocol_of_domain_result(), "fakedns");
        assert_eq!(composite.domain_of_protocol_result(), "other.org");

        let (domain_half, protocol_half) = composite.clone().into_parts();
        assert_eq!(domain_half, SniffResult::fake_dns("example.com"));
        assert!(protocol_half.is_dns_query());
    }

    #[test]
    fn test_non_composite_has_no_composite_view() {
        assert!(http("a.com").as_composite().is_none());
        assert!(SniffResult::fake_dns("a.com").as_composite().is_none());
    }

    #[test]
    fn test_protocol_is_subset_of() {
        let tls13 = SniffResult::Tls(TlsSniffResult {
            sni: Some("example.com".into()),
            version: Some(0x0301),
            supported_versions: vec![0x0304, 0x0303],
            ..Default::default()
        });
        assert!(tls13.protocol_is_subset_of("tls"));
        assert!(tls13.protocol_is_subset_of("tls1.3"));
        assert!(!tls13.protocol_is_subset_of("tls1.2"));
        assert!(!tls13.protocol_is_subset_of("http"));

        let others = SniffResult::FakeDnsOthers(Box::new(tls13.clone()));
        assert!(others.protocol_is_subset_of("fakedns+others"));
        assert!(others.protocol_is_subset_of("tls"));
        assert!(others.protocol_is_subset_of("tls1.3"));
        assert!(!others.protocol_is_subset_of("http"));

        let composite = SniffResult::composite(SniffResult::fake_dns("a.com"), tls13);
        assert!(composite.protocol_is_subset_of("tls1.3"));
        assert!(!composite.protocol_is_subset_of("fakedns"));

        assert!(http("a.com").protocol_is_subset_of("http"));
        assert!(!http("a.com").protocol_is_subset_of("tls"));
    }

    #[test]
    fn test_fake_dns_others_matches_families_of_inner_protocol() {
        let others = SniffResult::FakeDnsOthers(Box::new(http("a.com")));
        assert!(others.protocol_is_subset_of("http"));
        assert!(others.protocol_is_subset_of("http/1.1"));
        assert!(!others.protocol_is_subset_of(""));
        assert!(!others.protocol_is_subset_of("h"));
        assert!(!others.protocol_is_subset_of("ht"));

        // No version seen, so only the family prefix can match
        let bare_tls = SniffResult::FakeDnsOthers(Box::new(SniffResult::Tls(TlsSniffResult {
            sni: Some("example.com".into()),
            ..Default::default()
        })));
        assert!(bare_tls.protocol_is_subset_of("tls1.3"));
        assert!(!bare_tls.protocol_is_subset_of("t"));
    }

    #[test]
    fn test_display() {
        assert_eq!(http("a.com").to_string(), "http (a.com)");
        assert_eq!(SniffResult::Http(HttpSniffResult::default()).to_string(), "http");
    }

    #[test]
    fn test_serialization() {
        let result = SniffResult::composite(SniffResult::fake_dns("example.com"), dns("example.com"));
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""kind":"composite""#));
        let parsed: SniffResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, parsed);
    }
}
