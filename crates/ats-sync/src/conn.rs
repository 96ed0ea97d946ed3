//! The transport abstraction `Peer::reconcile` runs over, and an in-memory
//! fixture pair for tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::wire::Envelope;

/// A symmetric duplex channel carrying framed JSON messages. Any framing
/// that preserves message boundaries (WebSocket text frames,
/// newline-delimited JSON, this crate's in-memory `duplex_pair`) satisfies
/// this trait.
#[async_trait]
pub trait Conn: Send {
    async fn read_json(&mut self) -> Result<Envelope, ProtocolError>;
    async fn write_json(&mut self, msg: &Envelope) -> Result<(), ProtocolError>;
    async fn close(&mut self) -> Result<(), ProtocolError>;
}

/// An in-memory `Conn` backed by a pair of `tokio::sync::mpsc` channels.
/// Used by tests and by any in-process caller that doesn't need a real
/// network transport.
pub struct ChannelConn {
    tx: mpsc::Sender<Envelope>,
    rx: mpsc::Receiver<Envelope>,
}

#[async_trait]
impl Conn for ChannelConn {
    async fn read_json(&mut self) -> Result<Envelope, ProtocolError> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| ProtocolError::Io("peer closed the connection".into()))
    }

    async fn write_json(&mut self, msg: &Envelope) -> Result<(), ProtocolError> {
        self.tx
            .send(msg.clone())
            .await
            .map_err(|e| ProtocolError::Io(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

/// Build two `ChannelConn`s wired to each other, for an in-process session
/// between two `Peer`s (tests, or two local stores kept in sync without a
/// real transport).
pub fn duplex_pair() -> (ChannelConn, ChannelConn) {
    let (tx_a, rx_a) = mpsc::channel(32);
    let (tx_b, rx_b) = mpsc::channel(32);

    (
        ChannelConn { tx: tx_a, rx: rx_b },
        ChannelConn { tx: tx_b, rx: rx_a },
    )
}
