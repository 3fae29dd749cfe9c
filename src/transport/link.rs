//! Outbound half of a master/worker channel.

use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::Envelope;

/// Sends envelopes to one peer.
///
/// A `Link` feeds an unbounded queue drained by a writer task (see
/// [`codec::write_frames`](crate::transport::codec::write_frames)), so `send` never
/// blocks the orchestrator. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Link {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Link {
    /// Creates a link and the receiver its writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues an envelope for delivery.
    ///
    /// Fails with [`TransportError::Closed`] once the writer side is gone.
    pub fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.tx.send(envelope).map_err(|_| TransportError::Closed)
    }

    /// Returns true once the writer side is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
