//! TLS `ClientHello` sniffing
//!
//! Extracts the Server Name Indication and a few other fields from the
//! first flight of a TLS connection. The parser works on whatever prefix
//! of the stream has been buffered so far:
//!
//! - a prefix that could still become a `ClientHello` yields `NeedMoreData`
//! - anything that cannot (wrong content type, wrong handshake type,
//!   malformed lengths) yields `UnknownContent`
//!
//! A `ClientHello` may span several handshake records; fragments are
//! reassembled up to [`MAX_HANDSHAKE_SIZE`].
//!
//! ## TLS Record Format
//!
//! ```text
//! ContentType (1 byte)
//! ProtocolVersion (2 bytes)
//! Length (2 bytes)
//! Fragment (variable)
//! ```
//!
//! ## `ClientHello` Format (simplified)
//!
//! ```text
//! HandshakeType (1 byte) = 0x01
//! Length (3 bytes)
//! ProtocolVersion (2 bytes)
//! Random (32 bytes)
//! SessionID (1 byte length + variable)
//! CipherSuites (2 bytes length + variable)
//! CompressionMethods (1 byte length + variable)
//! Extensions (2 bytes length + variable)
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SniffError;
use crate::net::SniffContext;

use super::engine::ProtocolSniffer;
use super::result::SniffResult;

/// TLS `ContentType` for Handshake
const TLS_CONTENT_TYPE_HANDSHAKE: u8 = 0x16;

/// TLS `HandshakeType` for `ClientHello`
const TLS_HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 0x01;

/// Minimum TLS record header size
const TLS_RECORD_HEADER_SIZE: usize = 5;

/// Handshake message header: type (1) + length (3)
const TLS_HANDSHAKE_HEADER_SIZE: usize = 4;

/// RFC 5246 limit on a plaintext record fragment
const MAX_RECORD_SIZE: usize = 16384;

/// Largest `ClientHello` we are willing to reassemble
pub const MAX_HANDSHAKE_SIZE: usize = 64 * 1024;

/// version (2) + random (32) + session id length (1)
const MIN_CLIENT_HELLO_BODY: usize = 35;

const TLS_EXTENSION_TYPE_SNI: u16 = 0x0000;
const TLS_EXTENSION_TYPE_ALPN: u16 = 0x0010;
const TLS_EXTENSION_TYPE_SUPPORTED_VERSIONS: u16 = 0x002b;
/// ECH extension type (draft-ietf-tls-esni-18)
const TLS_EXTENSION_TYPE_ECH: u16 = 0xfe0d;
/// ECH extension type (older draft-ietf-tls-esni-13)
const TLS_EXTENSION_TYPE_ECH_DRAFT: u16 = 0xfe0a;

/// SNI name type for hostname
const TLS_SNI_NAME_TYPE_HOSTNAME: u8 = 0x00;

/// TLS `ClientHello` sniffing result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSniffResult {
    /// Extracted SNI domain name
    pub sni: Option<String>,
    /// Whether Encrypted Client Hello (ECH) was detected
    ///
    /// Note: When ECH is present, the SNI field may contain a public/cover
    /// domain rather than the actual destination.
    pub has_ech: bool,
    /// TLS version from record layer (e.g., 0x0301 = TLS 1.0, 0x0303 = TLS 1.2)
    pub version: Option<u16>,
    /// `legacy_version` field of the `ClientHello` body
    #[serde(default)]
    pub client_version: Option<u16>,
    /// Versions offered in the `supported_versions` extension, GREASE removed
    #[serde(default)]
    pub supported_versions: Vec<u16>,
    /// ALPN (Application-Layer Protocol Negotiation) protocol list
    ///
    /// Common values: "h2", "http/1.1", "h3"
    pub alpn: Vec<String>,
}

impl TlsSniffResult {
    /// Highest version the client offered, as a protocol name such as `tls1.3`
    #[must_use]
    pub fn version_name(&self) -> Option<&'static str> {
        let offered = self
            .supported_versions
            .iter()
            .copied()
            .max()
            .or(self.client_version)
            .or(self.version)?;
        match offered {
            0x0300 => Some("ssl3.0"),
            0x0301 => Some("tls1.0"),
            0x0302 => Some("tls1.1"),
            0x0303 => Some("tls1.2"),
            0x0304 => Some("tls1.3"),
            _ => None,
        }
    }
}

/// Extract TLS information from the buffered prefix of a stream
///
/// # Errors
///
/// `NeedMoreData` while the data is a valid but incomplete `ClientHello`,
/// `UnknownContent` when it cannot be one.
///
/// # Example
///
/// ```
/// use flow_sniffer::sniff::sniff_tls;
/// use flow_sniffer::SniffError;
///
/// assert_eq!(sniff_tls(&[0x16, 0x03, 0x01]), Err(SniffError::NeedMoreData));
/// assert_eq!(sniff_tls(b"GET / HTTP/1.1\r\n"), Err(SniffError::UnknownContent));
/// ```
pub fn sniff_tls(data: &[u8]) -> Result<TlsSniffResult, SniffError> {
    let version = check_record_header(data)?;
    let message = reassemble_handshake(data)?;

    let mut result = parse_client_hello(&message[TLS_HANDSHAKE_HEADER_SIZE..]).ok_or_else(|| {
        trace!("Malformed ClientHello body");
        SniffError::UnknownContent
    })?;
    result.version = Some(version);
    Ok(result)
}

/// Parse TLS `ClientHello` and extract SNI hostname
#[must_use]
pub fn sniff_tls_sni(data: &[u8]) -> Option<String> {
    sniff_tls(data).ok().and_then(|r| r.sni)
}

/// Check if data looks like TLS `ClientHello`
///
/// This is a quick heuristic check that does not fully parse the data.
/// Use `sniff_tls()` for complete parsing.
#[must_use]
pub fn looks_like_tls(data: &[u8]) -> bool {
    if data.len() < TLS_RECORD_HEADER_SIZE {
        return false;
    }

    if data[0] != TLS_CONTENT_TYPE_HANDSHAKE {
        return false;
    }

    // 0x0300 = SSL 3.0 through 0x0304 = TLS 1.3
    let version = u16::from_be_bytes([data[1], data[2]]);
    if !(0x0300..=0x0304).contains(&version) {
        return false;
    }

    if data.len() > TLS_RECORD_HEADER_SIZE {
        data[TLS_RECORD_HEADER_SIZE] == TLS_HANDSHAKE_TYPE_CLIENT_HELLO
    } else {
        true
    }
}

/// Validate the first record header as far as the data reaches
fn check_record_header(data: &[u8]) -> Result<u16, SniffError> {
    match data {
        [] => return Err(SniffError::NeedMoreData),
        [content_type, ..] if *content_type != TLS_CONTENT_TYPE_HANDSHAKE => {
            trace!("Not a TLS Handshake record (got 0x{:02x})", content_type);
            return Err(SniffError::UnknownContent);
        }
        [_, major, ..] if *major != 0x03 => return Err(SniffError::UnknownContent),
        _ => {}
    }

    if data.len() < TLS_RECORD_HEADER_SIZE {
        return Err(SniffError::NeedMoreData);
    }

    let version = u16::from_be_bytes([data[1], data[2]]);
    if !(0x0300..=0x0304).contains(&version) {
        trace!("Invalid TLS version: 0x{:04x}", version);
        return Err(SniffError::UnknownContent);
    }
    Ok(version)
}

/// Collect handshake record fragments until the whole `ClientHello` is present
///
/// Returns the handshake message including its 4-byte header.
fn reassemble_handshake(data: &[u8]) -> Result<Vec<u8>, SniffError> {
    let mut message = Vec::new();
    let mut expected: Option<usize> = None;
    let mut pos = 0;

    loop {
        if data.len() < pos + TLS_RECORD_HEADER_SIZE {
            if data.get(pos).is_some_and(|&b| b != TLS_CONTENT_TYPE_HANDSHAKE) {
                return Err(SniffError::UnknownContent);
            }
            return Err(SniffError::NeedMoreData);
        }
        if data[pos] != TLS_CONTENT_TYPE_HANDSHAKE || data[pos + 1] != 0x03 {
            trace!("Non-handshake record inside ClientHello");
            return Err(SniffError::UnknownContent);
        }

        let record_len = usize::from(u16::from_be_bytes([data[pos + 3], data[pos + 4]]));
        if record_len == 0 || record_len > MAX_RECORD_SIZE {
            trace!("Invalid TLS record length: {}", record_len);
            return Err(SniffError::UnknownContent);
        }
        pos += TLS_RECORD_HEADER_SIZE;

        let available = (data.len() - pos).min(record_len);
        message.extend_from_slice(&data[pos..pos + available]);

        if message.first().is_some_and(|&t| t != TLS_HANDSHAKE_TYPE_CLIENT_HELLO) {
            trace!("Not a ClientHello (got 0x{:02x})", message[0]);
            return Err(SniffError::UnknownContent);
        }

        if expected.is_none() && message.len() >= TLS_HANDSHAKE_HEADER_SIZE {
            let body_len = u32::from_be_bytes([0, message[1], message[2], message[3]]) as usize;
            if !(MIN_CLIENT_HELLO_BODY..=MAX_HANDSHAKE_SIZE).contains(&body_len) {
                trace!("Invalid ClientHello length: {}", body_len);
                return Err(SniffError::UnknownContent);
            }
            expected = Some(body_len + TLS_HANDSHAKE_HEADER_SIZE);
        }

        if let Some(total) = expected {
            if message.len() >= total {
                message.truncate(total);
                return Ok(message);
            }
        }

        if available < record_len {
            return Err(SniffError::NeedMoreData);
        }
        pos += record_len;
    }
}

/// Bounds-checked big-endian cursor
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if n > self.data.len() {
            return None;
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Some(head)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }
}

fn parse_client_hello(body: &[u8]) -> Option<TlsSniffResult> {
    let mut r = Reader::new(body);

    let client_version = r.u16()?;
    r.take(32)?;

    let session_id_len = usize::from(r.u8()?);
    if session_id_len > 32 {
        return None;
    }
    r.take(session_id_len)?;

    let cipher_suites_len = usize::from(r.u16()?);
    if cipher_suites_len < 2 || cipher_suites_len % 2 != 0 {
        return None;
    }
    r.take(cipher_suites_len)?;

    let compression_len = usize::from(r.u8()?);
    if compression_len == 0 {
        return None;
    }
    r.take(compression_len)?;

    let mut result = TlsSniffResult {
        client_version: Some(client_version),
        ..Default::default()
    };

    if r.is_empty() {
        trace!("No extensions present");
        return Some(result);
    }

    let extensions_len = usize::from(r.u16()?);
    let mut extensions = Reader::new(r.take(extensions_len)?);

    while !extensions.is_empty() {
        let ext_type = extensions.u16()?;
        let ext_len = usize::from(extensions.u16()?);
        let ext_data = extensions.take(ext_len)?;

        match ext_type {
            TLS_EXTENSION_TYPE_SNI => {
                result.sni = parse_sni_extension(ext_data);
                if let Some(sni) = &result.sni {
                    trace!("Found SNI: {}", sni);
                }
            }
            TLS_EXTENSION_TYPE_ALPN => {
                result.alpn = parse_alpn_extension(ext_data);
            }
            TLS_EXTENSION_TYPE_SUPPORTED_VERSIONS => {
                result.supported_versions = parse_supported_versions(ext_data);
            }
            TLS_EXTENSION_TYPE_ECH | TLS_EXTENSION_TYPE_ECH_DRAFT => {
                result.has_ech = true;
                trace!("Detected ECH/ESNI extension (type 0x{:04x})", ext_type);
            }
            _ => {}
        }
    }

    Some(result)
}

/// Parse SNI extension data to extract hostname
fn parse_sni_extension(data: &[u8]) -> Option<String> {
    let mut r = Reader::new(data);
    let list_len = usize::from(r.u16()?);
    let mut list = Reader::new(r.take(list_len)?);

    while !list.is_empty() {
        let name_type = list.u8()?;
        let name_len = usize::from(list.u16()?);
        let name = list.take(name_len)?;

        if name_type == TLS_SNI_NAME_TYPE_HOSTNAME {
            let hostname = std::str::from_utf8(name).ok()?;
            let hostname = hostname.strip_suffix('.').unwrap_or(hostname);
            return is_valid_hostname(hostname).then(|| hostname.to_ascii_lowercase());
        }
    }

    None
}

/// Parse ALPN extension data to extract protocol list
fn parse_alpn_extension(data: &[u8]) -> Vec<String> {
    let mut protocols = Vec::new();
    let mut r = Reader::new(data);
    let Some(list) = r.u16().and_then(|len| r.take(usize::from(len))) else {
        return protocols;
    };

    let mut list = Reader::new(list);
    while let Some(len) = list.u8() {
        let Some(proto) = list.take(usize::from(len)) else {
            break;
        };
        if let Ok(proto) = std::str::from_utf8(proto) {
            protocols.push(proto.to_string());
        }
    }

    protocols
}

fn parse_supported_versions(data: &[u8]) -> Vec<u16> {
    let mut r = Reader::new(data);
    let Some(list) = r.u8().and_then(|len| r.take(usize::from(len))) else {
        return Vec::new();
    };

    list.chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .filter(|v| !is_grease(*v))
        .collect()
}

/// RFC 8701 reserved values: 0x0a0a, 0x1a1a, ... 0xfafa
const fn is_grease(value: u16) -> bool {
    value & 0x0f0f == 0x0a0a && (value >> 8) == (value & 0xff)
}

/// Validate hostname according to RFC 1123
fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }

    hostname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Payload-phase sniffer for TLS `ClientHello`
#[derive(Debug, Default, Clone, Copy)]
pub struct TlsSniffer;

impl ProtocolSniffer for TlsSniffer {
    fn name(&self) -> &'static str {
        "tls"
    }

    fn sniff(&mut self, _ctx: &SniffContext, payload: &[u8]) -> Result<SniffResult, SniffError> {
        sniff_tls(payload).map(SniffResult::Tls)
    }
}
