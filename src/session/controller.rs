//! Session orchestration.
//!
//! The controller drives the session loop: a single task that owns the
//! microphone and mutates all session state (connection state, turn buffers,
//! scheduling cursor, active playback handles). The capture callback and the
//! transport reader are producers that feed it through channels and never
//! block on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::config::SessionConfig;
use super::connection::{process_event, SessionConnection, SessionState};
use crate::audio::{
    AudioChunk, CaptureEncoder, DeviceFactory, InputDevice, PlaybackScheduler,
};
use crate::error::Result;
use crate::transcript::{TranscriptAssembler, TranscriptLog, TranscriptionLine};
use crate::transport::{ServerEvent, Transport};

/// Root orchestrator for one live voice session at a time.
///
/// Exactly one session may be live per controller; `start` fully tears down
/// any prior session, including its device ownership, before acquiring fresh
/// handles.
pub struct SessionController {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    devices: Arc<dyn DeviceFactory>,
    state_tx: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,
    transcript: TranscriptLog,
    capturing: Arc<AtomicBool>,
    running: Option<RunningSession>,
}

struct RunningSession {
    stop_tx: Option<oneshot::Sender<()>>,
    encoder_handle: JoinHandle<()>,
    loop_handle: JoinHandle<()>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        devices: Arc<dyn DeviceFactory>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            transport,
            devices,
            state_tx,
            state_rx,
            transcript: TranscriptLog::default(),
            capturing: Arc::new(AtomicBool::new(false)),
            running: None,
        }
    }

    /// Start a session: acquire devices, connect, and begin streaming.
    ///
    /// Suspends until the remote handshake completes. A device failure means
    /// the session never starts (state stays `Disconnected`); a handshake
    /// failure leaves it in `Error`. Both release anything acquired so far.
    pub async fn start(&mut self) -> Result<()> {
        self.stop().await;

        info!(model = %self.config.model, voice = %self.config.voice, "starting session");

        let mut input = self.devices.input(self.config.capture_sample_rate)?;
        let samples_rx = match input.start() {
            Ok(rx) => rx,
            Err(e) => {
                input.stop();
                return Err(e);
            }
        };
        let sink = match self.devices.output(self.config.playback_sample_rate) {
            Ok(sink) => sink,
            Err(e) => {
                input.stop();
                return Err(e);
            }
        };

        let mut connection = SessionConnection::new(self.state_tx.clone());
        let events_rx = match connection
            .start(self.transport.as_ref(), &self.config)
            .await
        {
            Ok(rx) => rx,
            Err(e) => {
                input.stop();
                return Err(e);
            }
        };

        let (chunks_tx, chunks_rx) = mpsc::channel(8);
        let encoder =
            CaptureEncoder::new(self.config.capture_sample_rate, self.config.block_samples);
        let encoder_handle = tokio::spawn(encoder.run(samples_rx, chunks_tx));
        self.capturing.store(true, Ordering::SeqCst);

        // The loop owns the microphone so that every exit path, including a
        // mid-session transport failure, releases it.
        let (stop_tx, stop_rx) = oneshot::channel();
        let scheduler = PlaybackScheduler::new(sink);
        let assembler = TranscriptAssembler::new(Arc::clone(&self.transcript));
        let loop_handle = tokio::spawn(session_loop(
            connection,
            input,
            events_rx,
            chunks_rx,
            scheduler,
            assembler,
            stop_rx,
            Arc::clone(&self.capturing),
        ));

        self.running = Some(RunningSession {
            stop_tx: Some(stop_tx),
            encoder_handle,
            loop_handle,
        });

        info!("session started");
        Ok(())
    }

    /// Stop the session and release everything it owns.
    ///
    /// Safe to invoke from any state and idempotent: a second call finds no
    /// live session and only reaffirms `Disconnected`. Devices are released
    /// exactly once.
    pub async fn stop(&mut self) {
        if let Some(mut running) = self.running.take() {
            info!("stopping session");

            if let Some(stop_tx) = running.stop_tx.take() {
                let _ = stop_tx.send(());
            }
            // The loop releases the microphone on its way out; its stream
            // closing drains the encoder, so no block is processed after stop
            // is observed.
            if let Err(e) = running.loop_handle.await {
                error!("session loop panicked: {e}");
            }
            if let Err(e) = running.encoder_handle.await {
                error!("capture encoder task panicked: {e}");
            }
        }

        self.capturing.store(false, Ordering::SeqCst);
        self.state_tx.send_replace(SessionState::Disconnected);
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Observe session state changes (for the UI layer).
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Snapshot of the ordered transcript log.
    pub fn transcript(&self) -> Vec<TranscriptionLine> {
        self.transcript.lock().unwrap().clone()
    }

    /// Whether microphone capture is currently active.
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// The session's single logical thread of execution.
///
/// Processes inbound events strictly in arrival order and forwards captured
/// chunks in capture order; the two never interleave within one event.
async fn session_loop(
    mut connection: SessionConnection,
    mut input: Box<dyn InputDevice>,
    mut events_rx: mpsc::Receiver<ServerEvent>,
    mut chunks_rx: mpsc::Receiver<AudioChunk>,
    mut scheduler: PlaybackScheduler,
    mut assembler: TranscriptAssembler,
    mut stop_rx: oneshot::Receiver<()>,
    capturing: Arc<AtomicBool>,
) {
    let mut outbound_open = true;

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                connection.stop().await;
                break;
            }
            maybe_chunk = chunks_rx.recv(), if outbound_open => {
                match maybe_chunk {
                    Some(chunk) => connection.send(chunk).await,
                    None => outbound_open = false,
                }
            }
            maybe_event = events_rx.recv() => {
                match maybe_event {
                    Some(event) => process_event(event, &mut scheduler, &mut assembler),
                    None => {
                        // Mid-session disconnect. The session lands in Error;
                        // the transcript and already-played audio stay as-is.
                        error!("transport ended unexpectedly");
                        connection.fail().await;
                        break;
                    }
                }
            }
        }
    }

    // Both exit paths release the microphone and silence playback
    // immediately.
    input.stop();
    scheduler.cancel_all();
    capturing.store(false, Ordering::SeqCst);
}
