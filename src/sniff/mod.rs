//! Protocol sniffing module
//!
//! Identifies the application protocol and target host of a connection from
//! its first bytes, without terminating the protocol.
//!
//! # Supported Protocols
//!
//! - HTTP/1.x: request line and `Host` header
//! - TLS: SNI, ALPN, ECH and version from the ClientHello
//! - BitTorrent: TCP handshake and uTP datagrams
//! - DNS: A/AAAA queries (metadata phase)
//! - Fake DNS: reverse lookup of synthetic destinations (metadata phase)
//!
//! # Example
//!
//! ```
//! use flow_sniffer::net::SniffContext;
//! use flow_sniffer::sniff::{Sniffer, SnifferRegistry};
//!
//! let mut sniffer = Sniffer::new(&SnifferRegistry::new());
//! let ctx = SniffContext::tcp("93.184.216.34:80".parse().unwrap());
//!
//! let result = sniffer
//!     .sniff(&ctx, b"GET / HTTP/1.1\r\nHost: a.com\r\n\r\n", false)
//!     .unwrap();
//! assert_eq!(result.protocol(), "http");
//! assert_eq!(result.domain(), "a.com");
//! ```

mod bittorrent;
mod dns;
mod engine;
mod fakedns;
mod http;
mod registry;
mod result;
mod session;
mod tls;

pub use bittorrent::{
    check_block, sniff_bittorrent, sniff_utp, BitTorrentSniffResult, BitTorrentSniffer,
    BitTorrentTransport,
};
pub use dns::{parse_ip_query, DnsQuery, DnsSniffResult, DnsSniffer, QueryType};
pub use engine::{builtin_entries, ProtocolSniffer, SniffEntry, Sniffer};
pub use fakedns::{
    FakeDnsEngine, FakeDnsLookup, FakeDnsSniffResult, FakeDnsSniffer, FakeDnsThenOthers,
};
pub use http::{
    check_method, looks_like_http, sniff_http, sniff_http_host, HttpSniffResult, HttpSniffer,
};
pub use registry::{AlternativeSniffer, SnifferFactory, SnifferRegistry};
pub use result::{
    CompositeResult, OtherSniffResult, SniffResult, PROTOCOL_DNS, PROTOCOL_FAKEDNS,
    PROTOCOL_FAKEDNS_OTHERS,
};
pub use session::SniffSession;
pub use tls::{looks_like_tls, sniff_tls, sniff_tls_sni, TlsSniffResult, TlsSniffer, MAX_HANDSHAKE_SIZE};
