use async_trait::async_trait;

use crate::Result;

/// Where the Bot API lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Path segment glued in front of the token (`/bot<TOKEN>/...`).
    pub routing_prefix: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: "api.telegram.org".to_string(),
            port: 443,
            routing_prefix: "bot".to_string(),
        }
    }
}

/// Result of a single non-blocking read attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n > 0` bytes were placed at the start of the buffer.
    Data(usize),
    /// Nothing available yet; try again.
    WouldBlock,
    /// Peer finished the response (graceful end of stream).
    Closed,
}

/// Result of a single non-blocking write attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(usize),
    WouldBlock,
}

/// An open, already-secured byte stream to the Bot API.
///
/// Hard failures come back as `Err` (`TransportWriteFailed` /
/// `TransportReadFailed`); "not yet" is a normal outcome, not an error.
#[async_trait]
pub trait TransportStream: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<WriteOutcome>;
    async fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome>;
    async fn close(&mut self) -> Result<()>;
}

/// Hexagonal port for opening transport streams (TLS in production, scripted
/// fakes in tests). Every call yields a fresh stream; nothing is pooled.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn TransportStream>>;
}
