//! Dispatcher-side sniffing driver
//!
//! A [`SniffSession`] wraps one [`Sniffer`] with the policy a dispatcher
//! applies around it: the metadata phase runs once, payload bytes are
//! accumulated up to a byte budget, a bounded number of attempts is made,
//! and the metadata and content outcomes are combined into one answer.
//!
//! The bytes consumed while sniffing stay in the session buffer so the
//! caller can replay them to the outbound.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::SniffConfig;
use crate::error::{SessionError, SniffError};
use crate::net::SniffContext;

use super::engine::Sniffer;
use super::registry::SnifferRegistry;
use super::result::SniffResult;

/// Per-connection sniffing driver
#[derive(Debug)]
pub struct SniffSession {
    sniffer: Sniffer,
    ctx: SniffContext,
    buffer: BytesMut,
    attempts: usize,
    metadata: Option<Result<SniffResult, SniffError>>,
    metadata_only: bool,
    max_attempts: usize,
    max_bytes: usize,
    read_timeout: Duration,
}

impl SniffSession {
    /// Start a session for one connection
    ///
    /// # Errors
    ///
    /// `SessionError::Disabled` if sniffing is off or the connection's
    /// network is not configured for sniffing.
    pub fn new(
        registry: &SnifferRegistry,
        ctx: SniffContext,
        config: &SniffConfig,
    ) -> Result<Self, SessionError> {
        if !config.applies_to(ctx.network) {
            trace!("Sniffing disabled for {} connection", ctx.network);
            return Err(SessionError::Disabled);
        }

        Ok(Self {
            sniffer: Sniffer::new(registry),
            ctx,
            buffer: BytesMut::with_capacity(config.max_bytes),
            attempts: 0,
            metadata: None,
            metadata_only: config.metadata_only,
            max_attempts: config.max_attempts,
            max_bytes: config.max_bytes,
            read_timeout: config.read_timeout(),
        })
    }

    /// Run the metadata phase for a stream connection
    ///
    /// Runs at most once; later calls return the first outcome.
    ///
    /// # Errors
    ///
    /// The metadata outcome when no metadata entry produced a result.
    pub fn sniff_metadata(&mut self) -> Result<SniffResult, SniffError> {
        self.run_metadata(&[])
    }

    /// Append payload bytes and run the payload phase
    ///
    /// Bytes beyond the byte budget are dropped. Each call counts as one
    /// attempt, even when `data` is empty.
    ///
    /// # Errors
    ///
    /// `SessionError::Sniff(NeedMoreData)` means call again with more bytes.
    /// Any other error is final.
    pub fn feed(&mut self, data: &[u8]) -> Result<SniffResult, SessionError> {
        self.run_metadata(&[]).ok();
        if self.metadata_only {
            return self.metadata_outcome();
        }

        self.attempts += 1;
        let room = self.max_bytes.saturating_sub(self.buffer.len());
        self.buffer.extend_from_slice(&data[..data.len().min(room)]);

        let content = if self.buffer.is_empty() {
            Err(SniffError::NeedMoreData)
        } else {
            self.sniffer.sniff(&self.ctx, &self.buffer, false)
        };

        let content = match content {
            Err(SniffError::NeedMoreData) if self.buffer.len() >= self.max_bytes => {
                trace!("Sniff buffer full at {} bytes", self.buffer.len());
                Err(SessionError::Sniff(SniffError::UnknownContent))
            }
            Err(SniffError::NeedMoreData) if self.attempts >= self.max_attempts => Err(
                SessionError::budget_exhausted(self.attempts, self.buffer.len()),
            ),
            Err(SniffError::NeedMoreData) => {
                return Err(SessionError::Sniff(SniffError::NeedMoreData));
            }
            other => other.map_err(SessionError::from),
        };

        self.combine(content)
    }

    /// Sniff a single UDP datagram
    ///
    /// The datagram is visible to the metadata phase, so DNS queries are
    /// recognized there. A datagram is complete: needing more data is final.
    ///
    /// # Errors
    ///
    /// The combined outcome when neither phase produced a result.
    pub fn sniff_datagram(&mut self, datagram: &[u8]) -> Result<SniffResult, SessionError> {
        self.run_metadata(datagram).ok();
        if self.metadata_only {
            return self.metadata_outcome();
        }

        self.attempts += 1;
        let datagram = &datagram[..datagram.len().min(self.max_bytes)];
        let content = match self.sniffer.sniff(&self.ctx, datagram, false) {
            Err(SniffError::NeedMoreData) => Err(SniffError::UnknownContent),
            other => other,
        };

        self.combine(content.map_err(SessionError::from))
    }

    /// Read from `reader` until the sniffer decides or a budget runs out
    ///
    /// Each read is bounded by the configured read timeout; a timed-out read
    /// counts as an attempt without new bytes. The bytes read are kept in the
    /// session buffer.
    ///
    /// # Errors
    ///
    /// `SessionError::Io` if a read fails, otherwise the combined outcome.
    pub async fn sniff_stream<R>(&mut self, reader: &mut R) -> Result<SniffResult, SessionError>
    where
        R: AsyncRead + Unpin,
    {
        self.run_metadata(&[]).ok();
        if self.metadata_only {
            return self.metadata_outcome();
        }

        let mut chunk = vec![0u8; self.max_bytes];
        loop {
            let room = self.max_bytes.saturating_sub(self.buffer.len());
            let read = match timeout(self.read_timeout, reader.read(&mut chunk[..room])).await {
                Ok(Ok(0)) => {
                    trace!("EOF after {} bytes", self.buffer.len());
                    return self.combine(Err(SessionError::Sniff(SniffError::UnknownContent)));
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(SessionError::Io(e)),
                Err(_) => {
                    trace!("Sniff read timed out after {:?}", self.read_timeout);
                    0
                }
            };

            match self.feed(&chunk[..read]) {
                Err(SessionError::Sniff(SniffError::NeedMoreData)) => continue,
                outcome => return outcome,
            }
        }
    }

    /// Bytes consumed so far
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Hand the consumed bytes back for replay
    #[must_use]
    pub fn into_buffer(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Payload attempts made so far
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }

    #[must_use]
    pub const fn context(&self) -> &SniffContext {
        &self.ctx
    }

    fn run_metadata(&mut self, payload: &[u8]) -> Result<SniffResult, SniffError> {
        if let Some(outcome) = &self.metadata {
            return outcome.clone();
        }
        let outcome = self.sniffer.sniff(&self.ctx, payload, true);
        debug!(
            network = %self.ctx.network,
            destination = ?self.ctx.destination,
            outcome = ?outcome,
            "Metadata sniffed"
        );
        self.metadata = Some(outcome.clone());
        outcome
    }

    fn metadata_outcome(&self) -> Result<SniffResult, SessionError> {
        match &self.metadata {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(e)) => Err(SessionError::Sniff(*e)),
            None => Err(SessionError::Sniff(SniffError::UnknownContent)),
        }
    }

    /// Merge the metadata outcome with a final content outcome
    fn combine(
        &self,
        content: Result<SniffResult, SessionError>,
    ) -> Result<SniffResult, SessionError> {
        let outcome = match (&self.metadata, content) {
            (Some(Ok(metadata)), Ok(content)) => {
                Ok(SniffResult::composite(metadata.clone(), content))
            }
            (Some(Ok(metadata)), Err(_)) => Ok(metadata.clone()),
            (_, content) => content,
        };
        debug!(
            attempts = self.attempts,
            bytes = self.buffer.len(),
            outcome = ?outcome.as_ref().map(ToString::to_string),
            "Sniffing finished"
        );
        outcome
    }
}
