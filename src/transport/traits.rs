use super::packet::{BusPacket, Target};
use std::sync::Arc;
use thiserror::Error;

/// Callback invoked by a transport for every received packet.
pub type PacketCallback = Arc<dyn Fn(BusPacket) + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("transport closed")]
    Closed,
}

/// Trait representing the lower bus transport.
///
/// Implementations own framing, checksums and arbitration, and must serialize
/// concurrent `transmit` calls themselves since services may send from any context.
pub trait BusTransport: Send + Sync {
    /// Queue `data` for transmission to `target`.
    fn transmit(&self, data: &[u8], target: Target) -> Result<(), TransportError>;

    /// Register the receive callback. Replaces any earlier callback.
    fn on_packet_received(&self, callback: PacketCallback);
}
