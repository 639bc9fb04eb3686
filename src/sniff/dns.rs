//! DNS query sniffing
//!
//! A UDP flow whose first datagram is an A or AAAA query is classified as
//! `dns`, with the queried name as its domain. Other query types are left
//! for the remaining sniffers.

use hickory_proto::op::{Header, Query};
use hickory_proto::rr::RecordType;
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SniffError;
use crate::net::SniffContext;

use super::engine::ProtocolSniffer;
use super::result::SniffResult;

/// Address query types recognized by the sniffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    /// IPv4 address query
    A,
    /// IPv6 address query
    Aaaa,
}

impl QueryType {
    fn from_record_type(record_type: RecordType) -> Option<Self> {
        match record_type {
            RecordType::A => Some(Self::A),
            RecordType::AAAA => Some(Self::Aaaa),
            _ => None,
        }
    }
}

/// First question of an address query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    /// Queried name in fully-qualified form, e.g. `google.com.`
    pub domain: String,
    /// Message ID from the header
    pub id: u16,
    pub query_type: QueryType,
}

/// Parse the header and first question of a DNS message
///
/// The answer, authority and additional sections are never read, so a
/// damaged tail does not hide the question. Returns `None` for a malformed
/// header or question, messages without a question and questions that are
/// not A/AAAA.
#[must_use]
pub fn parse_ip_query(data: &[u8]) -> Option<DnsQuery> {
    let mut decoder = BinDecoder::new(data);
    let header = match Header::read(&mut decoder) {
        Ok(header) => header,
        Err(e) => {
            debug!("Failed to parse DNS header: {}", e);
            return None;
        }
    };

    if header.query_count() == 0 {
        debug!("DNS message id={} has no question", header.id());
        return None;
    }

    let query = match Query::read(&mut decoder) {
        Ok(query) => query,
        Err(e) => {
            debug!("Failed to parse DNS question id={}: {}", header.id(), e);
            return None;
        }
    };

    let query_type = QueryType::from_record_type(query.query_type())?;

    Some(DnsQuery {
        domain: query.name().to_ascii(),
        id: header.id(),
        query_type,
    })
}

/// DNS sniffing result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsSniffResult {
    /// Queried name without the trailing dot
    pub domain: String,
    pub id: u16,
    pub query_type: QueryType,
}

impl From<DnsQuery> for DnsSniffResult {
    fn from(query: DnsQuery) -> Self {
        let domain = match query.domain.strip_suffix('.') {
            Some(stripped) => stripped.to_string(),
            None => query.domain,
        };
        Self {
            domain,
            id: query.id,
            query_type: query.query_type,
        }
    }
}

/// Metadata-phase sniffer for DNS address queries
///
/// Only sees a payload when the metadata phase is run over a datagram; an
/// empty payload is a rejection.
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsSniffer;

impl ProtocolSniffer for DnsSniffer {
    fn name(&self) -> &'static str {
        "dns"
    }

    fn sniff(&mut self, _ctx: &SniffContext, payload: &[u8]) -> Result<SniffResult, SniffError> {
        if payload.is_empty() {
            return Err(SniffError::UnknownContent);
        }
        parse_ip_query(payload)
            .map(|query| SniffResult::Dns(query.into()))
            .ok_or(SniffError::UnknownContent)
    }
}
