//! Session connection state machine and inbound event demux.

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use crate::audio::{codec, AudioChunk, PlaybackScheduler};
use crate::error::Result;
use crate::transcript::{Role, TranscriptAssembler};
use crate::transport::{MediaChunk, ServerEvent, Transport, TransportSender};

/// Session lifecycle state.
///
/// `Error` is terminal until an explicit restart; `stop()` reaches
/// `Disconnected` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Owns the connection state machine and the outbound transport half.
///
/// Holds no audio or text state itself; inbound events are demultiplexed by
/// [`process_event`] straight into the playback scheduler and transcript
/// assembler.
pub struct SessionConnection {
    state_tx: watch::Sender<SessionState>,
    sender: Option<Box<dyn TransportSender>>,
}

impl SessionConnection {
    pub fn new(state_tx: watch::Sender<SessionState>) -> Self {
        Self {
            state_tx,
            sender: None,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: SessionState) {
        if self.state() != state {
            info!(?state, "session state");
        }
        self.state_tx.send_replace(state);
    }

    /// Connect to the remote endpoint.
    ///
    /// Suspends until the handshake completes (`Connected`) or fails, in which
    /// case the session lands in `Error` and the cause is returned. On success
    /// the inbound event stream is handed back to the caller's event loop.
    pub async fn start(
        &mut self,
        transport: &dyn Transport,
        config: &SessionConfig,
    ) -> Result<mpsc::Receiver<ServerEvent>> {
        self.set_state(SessionState::Connecting);
        match transport.connect(config).await {
            Ok(conn) => {
                self.sender = Some(conn.sender);
                self.set_state(SessionState::Connected);
                Ok(conn.events)
            }
            Err(e) => {
                self.set_state(SessionState::Error);
                Err(e)
            }
        }
    }

    /// Transmit one captured chunk.
    ///
    /// Fire-and-forget by design: while not connected the chunk is silently
    /// dropped, never queued. A mid-session transport failure moves the
    /// session to `Error`.
    pub async fn send(&mut self, chunk: AudioChunk) {
        if self.state() != SessionState::Connected {
            debug!("outbound chunk dropped: not connected");
            return;
        }
        let Some(sender) = self.sender.as_mut() else {
            return;
        };
        let media = MediaChunk {
            mime_type: chunk.mime_type,
            data: chunk.payload,
        };
        if let Err(e) = sender.send(media).await {
            error!("transport send failed: {e}");
            self.fail().await;
        }
    }

    /// Tear down after a transport failure: the transport is released but the
    /// session stays in `Error` until an explicit restart.
    pub async fn fail(&mut self) {
        if let Some(mut sender) = self.sender.take() {
            sender.close().await;
        }
        self.set_state(SessionState::Error);
    }

    /// Close the transport and return to `Disconnected`, from any state.
    ///
    /// Idempotent: a second call finds nothing to close and is a no-op.
    pub async fn stop(&mut self) {
        if let Some(mut sender) = self.sender.take() {
            sender.close().await;
        }
        self.set_state(SessionState::Disconnected);
    }
}

/// Demultiplex one inbound event, in arrival order.
///
/// Transcription deltas feed the turn buffers, a turn boundary flushes them,
/// audio is decoded and scheduled, and an interruption cancels all scheduled
/// playback without touching the turn buffers. A malformed audio payload is
/// dropped and logged; it never terminates the session.
pub fn process_event(
    event: ServerEvent,
    scheduler: &mut PlaybackScheduler,
    assembler: &mut TranscriptAssembler,
) {
    if let Some(delta) = event.transcription {
        if let Some(text) = delta.input {
            assembler.append(Role::User, &text);
        }
        if let Some(text) = delta.output {
            assembler.append(Role::Assistant, &text);
        }
    }

    if event.turn_complete {
        assembler.flush();
    }

    if let Some(audio) = event.audio {
        match codec::decode(&audio.payload) {
            Ok(pcm) => scheduler.schedule(&pcm),
            Err(e) => warn!("dropping malformed audio payload: {e}"),
        }
    }

    if event.interrupted {
        scheduler.cancel_all();
    }
}
