//! Gapless playback scheduling.
//!
//! Decoded reply audio arrives as a stream of PCM chunks. Each chunk is
//! anchored to the end of the previous one on the output clock (the
//! scheduling cursor) so successive buffers play back-to-back; after a
//! genuine pause the cursor has fallen behind real time and the next chunk
//! anchors to "now" instead. Barge-in cancels everything at once.

use std::sync::Arc;

use tracing::debug;

use super::codec;
use super::device::{OutputSink, SinkHandle};

pub struct PlaybackScheduler {
    sink: Arc<dyn OutputSink>,
    /// Next free slot on the output clock. Never decreases except on reset.
    cursor: f64,
    active: Vec<SinkHandle>,
}

impl PlaybackScheduler {
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self {
            sink,
            cursor: 0.0,
            active: Vec::new(),
        }
    }

    /// Schedule one decoded PCM 16-bit LE mono chunk for playback.
    pub fn schedule(&mut self, pcm: &[u8]) {
        // Handles that finished naturally leave the active set here.
        self.active.retain(|handle| !handle.is_done());

        let samples = codec::unpack_pcm16(pcm);
        if samples.is_empty() {
            return;
        }

        let duration = samples.len() as f64 / f64::from(self.sink.sample_rate());
        let start = self.cursor.max(self.sink.now());
        let handle = self.sink.play(samples, start);
        self.active.push(handle);
        self.cursor = start + duration;
    }

    /// Stop all scheduled audio immediately and reset the cursor, so the next
    /// chunk anchors to current real time rather than a stale future offset.
    ///
    /// Safe to call with nothing active.
    pub fn cancel_all(&mut self) {
        if !self.active.is_empty() {
            debug!(cancelled = self.active.len(), "playback interrupted");
        }
        for handle in self.active.drain(..) {
            handle.cancel();
        }
        self.cursor = 0.0;
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Number of buffers currently scheduled or playing.
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|h| !h.is_done()).count()
    }
}
