//! BitTorrent detection
//!
//! Over TCP a peer connection starts with the fixed handshake prefix
//! `\x13BitTorrent protocol`. Over UDP the transport is uTP (BEP 29),
//! recognized from its 20-byte header.
//!
//! Neither form carries a domain.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SniffError;
use crate::net::{Network, SniffContext};

use super::engine::ProtocolSniffer;
use super::result::SniffResult;

const BITTORRENT_PROTOCOL_INDICATE: &[u8] = b"\x13BitTorrent protocol";

/// uTP header size without extensions
const UTP_HEADER_SIZE: usize = 20;

/// Highest uTP packet type (`ST_SYN`)
const UTP_MAX_TYPE: u8 = 4;

/// Transport the BitTorrent traffic was seen on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitTorrentTransport {
    /// Peer wire protocol handshake over TCP
    Tcp,
    /// Micro transport protocol over UDP
    Utp,
}

/// BitTorrent sniffing result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitTorrentSniffResult {
    pub transport: BitTorrentTransport,
}

/// Compare a stream prefix against a fixed magic
///
/// # Errors
///
/// `NeedMoreData` while `data` is a strict prefix of `magic`,
/// `UnknownContent` once it diverges.
pub fn check_block(data: &[u8], magic: &[u8]) -> Result<(), SniffError> {
    if data.len() < magic.len() {
        if data == &magic[..data.len()] {
            Err(SniffError::NeedMoreData)
        } else {
            Err(SniffError::UnknownContent)
        }
    } else if &data[..magic.len()] == magic {
        Ok(())
    } else {
        Err(SniffError::UnknownContent)
    }
}

/// Detect the BitTorrent peer handshake at the start of a TCP stream
///
/// # Errors
///
/// See [`check_block`].
pub fn sniff_bittorrent(data: &[u8]) -> Result<BitTorrentSniffResult, SniffError> {
    check_block(data, BITTORRENT_PROTOCOL_INDICATE)?;
    Ok(BitTorrentSniffResult {
        transport: BitTorrentTransport::Tcp,
    })
}

// 0       4       8               16              24              32
// +-------+-------+---------------+---------------+---------------+
// | type  | ver   | extension     | connection_id                 |
// +-------+-------+---------------+---------------+---------------+
// | timestamp_microseconds                                        |
// +---------------+---------------+---------------+---------------+
// | timestamp_difference_microseconds                             |
// +---------------+---------------+---------------+---------------+
// | wnd_size                                                      |
// +---------------+---------------+---------------+---------------+
// | seq_nr                        | ack_nr                        |
// +---------------+---------------+---------------+---------------+

/// Detect a uTP packet
///
/// A datagram is complete, so truncation is a rejection rather than a
/// request for more data.
///
/// # Errors
///
/// `UnknownContent` if the datagram is not a well-formed uTP header.
pub fn sniff_utp(datagram: &[u8]) -> Result<BitTorrentSniffResult, SniffError> {
    if datagram.len() < UTP_HEADER_SIZE {
        return Err(SniffError::UnknownContent);
    }

    let pdu_type = datagram[0] >> 4;
    let pdu_version = datagram[0] & 0x0f;
    if pdu_type > UTP_MAX_TYPE || pdu_version != 1 {
        return Err(SniffError::UnknownContent);
    }

    // Extension chain: (next type, length, payload), terminated by type 0
    let mut next = datagram[1];
    let mut rest = &datagram[UTP_HEADER_SIZE..];
    while next != 0 {
        if next != 1 {
            trace!("Unknown uTP extension type {}", next);
            return Err(SniffError::UnknownContent);
        }
        let [following, len, tail @ ..] = rest else {
            return Err(SniffError::UnknownContent);
        };
        let len = usize::from(*len);
        if tail.len() < len {
            return Err(SniffError::UnknownContent);
        }
        next = *following;
        rest = &tail[len..];
    }

    Ok(BitTorrentSniffResult {
        transport: BitTorrentTransport::Utp,
    })
}

/// Payload-phase sniffer covering both BitTorrent transports
#[derive(Debug, Default, Clone, Copy)]
pub struct BitTorrentSniffer;

impl ProtocolSniffer for BitTorrentSniffer {
    fn name(&self) -> &'static str {
        "bittorrent"
    }

    fn sniff(&mut self, ctx: &SniffContext, payload: &[u8]) -> Result<SniffResult, SniffError> {
        let result = match ctx.network {
            Network::Udp => sniff_utp(payload)?,
            Network::Tcp | Network::Unix => sniff_bittorrent(payload)?,
        };
        Ok(SniffResult::BitTorrent(result))
    }
}
