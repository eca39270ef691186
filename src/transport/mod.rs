//! Transport seam to the remote streaming speech endpoint.
//!
//! A [`Transport`] performs the connect handshake and yields a live
//! [`TransportConn`]: a sender half for outbound media plus a channel of
//! inbound [`ServerEvent`]s pumped by the transport's own reader. The event
//! channel closing signals that the transport ended, cleanly or not.

pub mod messages;
pub mod mock;
pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::session::SessionConfig;

pub use messages::{
    AudioPayload, ClientMessage, MediaChunk, ServerEvent, SetupMessage, TranscriptionDelta,
};
pub use mock::MockTransport;
pub use ws::WsTransport;

/// Connects sessions to the remote endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a session: open the transport, send setup, and suspend until
    /// the remote acknowledges or the handshake fails (`Error::Connect`).
    async fn connect(&self, config: &SessionConfig) -> Result<TransportConn>;
}

/// A live, connected session transport.
pub struct TransportConn {
    pub sender: Box<dyn TransportSender>,
    /// Inbound events in arrival order; closes when the transport ends.
    pub events: mpsc::Receiver<ServerEvent>,
}

/// Outbound half of a live transport.
#[async_trait]
pub trait TransportSender: Send {
    async fn send(&mut self, chunk: MediaChunk) -> Result<()>;

    /// Close the transport. Idempotent.
    async fn close(&mut self);
}
