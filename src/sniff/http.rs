//! HTTP Host header sniffing
//!
//! This module extracts the `Host` header from HTTP/1.x requests so that
//! plain-text connections can be routed by domain.
//!
//! ## Outcomes
//!
//! - The bytes do not start with a known request method: `UnknownContent`.
//! - The bytes are a prefix of a method, or the headers are still arriving
//!   and no `Host` line has been seen yet: `NeedMoreData`.
//! - A complete header block, or any complete `Host` line: a result.
//!   A complete request without `Host` still yields a result with an empty
//!   domain.
//!
//! ## HTTP Request Format
//!
//! ```text
//! Method SP Request-URI SP HTTP-Version CRLF
//! Header-Field CRLF
//! ...
//! CRLF
//! [ Message-Body ]
//! ```
//!
//! ## Example
//!
//! ```
//! use flow_sniffer::sniff::sniff_http;
//!
//! let data = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
//! let result = sniff_http(data).unwrap();
//! assert_eq!(result.host.as_deref(), Some("example.com"));
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SniffError;
use crate::net::SniffContext;

use super::engine::ProtocolSniffer;
use super::result::SniffResult;

/// Maximum number of headers to parse
const MAX_HEADERS: usize = 64;

/// Request methods recognized at the start of a stream
const HTTP_METHODS: &[&[u8]] = &[
    b"GET", b"POST", b"PUT", b"HEAD", b"DELETE", b"OPTIONS", b"PATCH", b"CONNECT", b"TRACE",
];

/// HTTP sniffing result
///
/// Contains extracted information from an HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSniffResult {
    /// Host header value (without port, lowercased)
    pub host: Option<String>,
    /// Request method (GET, POST, etc.)
    pub method: Option<String>,
    /// Request path
    pub path: Option<String>,
    /// HTTP version (1 for HTTP/1.1, 0 for HTTP/1.0)
    pub version: Option<u8>,
}

impl HttpSniffResult {
    fn from_request(req: &httparse::Request<'_, '_>) -> Self {
        Self {
            host: None,
            method: req.method.map(str::to_string),
            path: req.path.map(str::to_string),
            version: req.version,
        }
    }
}

/// Check that the data starts with a known method followed by a space
///
/// # Errors
///
/// `NeedMoreData` while the data is still a prefix of some method,
/// `UnknownContent` once it cannot be one.
pub fn check_method(data: &[u8]) -> Result<(), SniffError> {
    let mut is_prefix = false;
    for method in HTTP_METHODS {
        if data.len() > method.len() {
            if data.starts_with(method) && data[method.len()] == b' ' {
                return Ok(());
            }
        } else if method.starts_with(data) {
            is_prefix = true;
        }
    }

    if is_prefix {
        Err(SniffError::NeedMoreData)
    } else {
        Err(SniffError::UnknownContent)
    }
}

/// Quick check if data looks like an HTTP request
///
/// Returns `true` only once a full method token and the following space
/// are present. Use [`sniff_http`] for complete parsing.
#[must_use]
pub fn looks_like_http(data: &[u8]) -> bool {
    check_method(data).is_ok()
}

/// Extract HTTP information from a (possibly partial) request
///
/// # Errors
///
/// See the module documentation for when `NeedMoreData` and
/// `UnknownContent` are returned.
pub fn sniff_http(data: &[u8]) -> Result<HttpSniffResult, SniffError> {
    check_method(data)?;

    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(data) {
        Ok(httparse::Status::Complete(_)) => {
            let mut result = HttpSniffResult::from_request(&req);
            result.host = req
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case("host"))
                .and_then(|h| parse_host_value(h.value));
            trace!("HTTP request complete, host={:?}", result.host);
            Ok(result)
        }
        Ok(httparse::Status::Partial) => {
            let mut result = HttpSniffResult::from_request(&req);
            match find_host_in_partial(data) {
                Some(host) => {
                    trace!("HTTP Host found in partial request: {}", host);
                    result.host = Some(host);
                    Ok(result)
                }
                None => Err(SniffError::NeedMoreData),
            }
        }
        Err(httparse::Error::TooManyHeaders) => {
            // The request line was parsed before the header table overflowed
            let mut result = HttpSniffResult::from_request(&req);
            result.host = find_host_in_partial(data);
            Ok(result)
        }
        Err(e) => {
            trace!("Failed to parse HTTP request: {:?}", e);
            Err(SniffError::UnknownContent)
        }
    }
}

/// Extract HTTP Host header from data (simplified API)
///
/// ```
/// use flow_sniffer::sniff::sniff_http_host;
///
/// let data = b"GET / HTTP/1.1\r\nHost: example.com:8080\r\n\r\n";
/// assert_eq!(sniff_http_host(data), Some("example.com".to_string()));
/// ```
#[must_use]
pub fn sniff_http_host(data: &[u8]) -> Option<String> {
    sniff_http(data).ok().and_then(|r| r.host)
}

/// Scan the complete header lines of a partial request for `Host`
fn find_host_in_partial(data: &[u8]) -> Option<String> {
    let complete = match data.iter().rposition(|&b| b == b'\n') {
        Some(end) => &data[..end],
        None => return None,
    };

    for line in complete.split(|&b| b == b'\n').skip(1) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            break;
        }
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        if line[..colon].eq_ignore_ascii_case(b"host") {
            return parse_host_value(&line[colon + 1..]);
        }
    }

    None
}

fn parse_host_value(value: &[u8]) -> Option<String> {
    let value = std::str::from_utf8(value).ok()?;
    let host = strip_port(value.trim());
    if !host.is_empty() && is_valid_hostname(host) {
        Some(host.to_ascii_lowercase())
    } else {
        None
    }
}

/// Strip port number from host value
///
/// Handles both `example.com:8080` and `[::1]:8080` (IPv6) formats.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        if let Some(bracket_end) = host.find(']') {
            return &host[1..bracket_end];
        }
    }

    if let Some(colon_pos) = host.rfind(':') {
        let potential_port = &host[colon_pos + 1..];
        if !potential_port.is_empty() && potential_port.chars().all(|c| c.is_ascii_digit()) {
            return &host[..colon_pos];
        }
    }

    host
}

/// Validate hostname according to RFC 1123
fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }

    if !hostname.is_ascii() || hostname.contains('\0') {
        return false;
    }

    // IP literals keep their dots and colons
    hostname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == ':')
}

/// Payload-phase sniffer for HTTP/1.x
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpSniffer;

impl ProtocolSniffer for HttpSniffer {
    fn name(&self) -> &'static str {
        "http"
    }

    fn sniff(&mut self, _ctx: &SniffContext, payload: &[u8]) -> Result<SniffResult, SniffError> {
        sniff_http(payload).map(SniffResult::Http)
    }
}
