//! Outbound packet sink supplied by the owner of the connection.

use crate::error::TransportError;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Writes one request packet to the device.
///
/// Implementations must not retry. A failure is fatal to the job that sent it.
pub trait PacketSink {
    fn send(&mut self, packet: Bytes) -> Result<(), TransportError>;
}

impl<F> PacketSink for F
where
    F: FnMut(Bytes) -> Result<(), TransportError>,
{
    fn send(&mut self, packet: Bytes) -> Result<(), TransportError> {
        self(packet)
    }
}

/// Sink that forwards packets into a channel, e.g. to a characteristic writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Bytes>) -> Self {
        Self { tx }
    }
}

impl PacketSink for ChannelSink {
    fn send(&mut self, packet: Bytes) -> Result<(), TransportError> {
        self.tx
            .send(packet)
            .map_err(|_| TransportError::Disconnected)
    }
}
