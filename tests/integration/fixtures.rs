//! Builders for captured first packets

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::{Name, RecordType};

use flow_sniffer::net::SniffContext;
use flow_sniffer::sniff::{ProtocolSniffer, SniffResult};
use flow_sniffer::SniffError;

pub const HTTP_REQUEST: &[u8] = b"GET / HTTP/1.1\r\nHost: a.com\r\n\r\n";

pub const UNKNOWN_PAYLOAD: &[u8] = &[0xde, 0xad, 0xbe, 0xef];

fn extension(ext_type: u16, body: &[u8]) -> Vec<u8> {
    let mut ext = ext_type.to_be_bytes().to_vec();
    ext.extend_from_slice(&(body.len() as u16).to_be_bytes());
    ext.extend_from_slice(body);
    ext
}

/// A TLS 1.3 `ClientHello` in a single record
pub fn client_hello(sni: &str) -> Vec<u8> {
    let name = sni.as_bytes();
    let mut server_name = ((name.len() + 3) as u16).to_be_bytes().to_vec();
    server_name.push(0x00);
    server_name.extend_from_slice(&(name.len() as u16).to_be_bytes());
    server_name.extend_from_slice(name);

    let mut extensions = extension(0x0000, &server_name);
    // h2, http/1.1
    extensions.extend(extension(
        0x0010,
        &[0, 12, 2, b'h', b'2', 8, b'h', b't', b't', b'p', b'/', b'1', b'.', b'1'],
    ));
    // GREASE, TLS 1.3, TLS 1.2
    extensions.extend(extension(0x002b, &[6, 0x0a, 0x0a, 0x03, 0x04, 0x03, 0x03]));

    let mut body = vec![0x03, 0x03];
    body.extend_from_slice(&[0x5a; 32]);
    body.push(0x00);
    body.extend_from_slice(&[0x00, 0x04, 0x13, 0x01, 0x13, 0x02]);
    body.extend_from_slice(&[0x01, 0x00]);
    body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    body.extend(extensions);

    let mut handshake = vec![0x01];
    handshake.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    handshake.extend(body);

    let mut record = vec![0x16, 0x03, 0x01];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend(handshake);
    record
}

/// A DNS query message
///
/// Keep the high byte of `id` away from uTP's `type << 4 | 1` so the payload
/// sniffers reject the datagram.
pub fn dns_query(domain: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut message = Message::new();
    message.set_id(id);
    message.set_message_type(MessageType::Query);
    message.set_recursion_desired(true);
    let name = Name::from_ascii(domain).unwrap();
    message.add_query(Query::query(name, record_type));
    message.to_vec().unwrap()
}

pub fn tcp_ctx(dest: &str) -> SniffContext {
    SniffContext::tcp(dest.parse().unwrap())
}

pub fn udp_ctx(dest: &str) -> SniffContext {
    SniffContext::udp(dest.parse().unwrap())
}

/// Sniffer replaying a fixed outcome and counting its calls
pub struct Scripted {
    pub name: &'static str,
    pub outcome: Result<SniffResult, SniffError>,
    pub calls: Arc<AtomicUsize>,
}

impl Scripted {
    pub fn new(name: &'static str, outcome: Result<SniffResult, SniffError>) -> Self {
        Self {
            name,
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ProtocolSniffer for Scripted {
    fn name(&self) -> &'static str {
        self.name
    }

    fn sniff(&mut self, _ctx: &SniffContext, _payload: &[u8]) -> Result<SniffResult, SniffError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

pub fn calls(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
