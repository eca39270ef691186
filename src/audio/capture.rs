//! Microphone capture encoding.
//!
//! Turns the continuous device sample stream into discrete transport-ready
//! chunks: fixed 4096-sample blocks, PCM16-LE packed, base64 encoded.

use tokio::sync::mpsc;
use tracing::debug;

use super::codec;

/// Samples per outbound block (~256 ms at 16 kHz).
pub const BLOCK_SAMPLES: usize = 4096;

/// One transport-ready unit of audio. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Mime-style descriptor, e.g. `audio/pcm;rate=16000`.
    pub mime_type: String,
    /// Base64-encoded PCM 16-bit little-endian mono.
    pub payload: String,
}

impl AudioChunk {
    /// Pack and encode one block of f32 samples.
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            mime_type: format!("audio/pcm;rate={sample_rate}"),
            payload: codec::encode(&codec::pack_pcm16(samples)),
        }
    }
}

/// Re-blocks the device sample stream and emits encoded chunks.
pub struct CaptureEncoder {
    sample_rate: u32,
    block_samples: usize,
}

impl CaptureEncoder {
    pub fn new(sample_rate: u32, block_samples: usize) -> Self {
        Self {
            sample_rate,
            block_samples,
        }
    }

    /// Run until the device stream closes.
    ///
    /// Device blocks arrive at arbitrary sizes; full `block_samples` blocks
    /// are encoded and emitted, a partial trailing block at stream end is
    /// discarded. Emission is fire-and-forget: if the session loop is not
    /// keeping up (or has stopped) the chunk is dropped, never queued.
    pub async fn run(
        self,
        mut samples_rx: mpsc::Receiver<Vec<f32>>,
        chunks_tx: mpsc::Sender<AudioChunk>,
    ) {
        let mut pending: Vec<f32> = Vec::with_capacity(self.block_samples * 2);

        while let Some(block) = samples_rx.recv().await {
            pending.extend_from_slice(&block);

            while pending.len() >= self.block_samples {
                let rest = pending.split_off(self.block_samples);
                let full = std::mem::replace(&mut pending, rest);
                let chunk = AudioChunk::from_samples(&full, self.sample_rate);
                if chunks_tx.try_send(chunk).is_err() {
                    debug!("outbound chunk dropped: session loop busy or stopped");
                }
            }
        }

        debug!(
            discarded_samples = pending.len(),
            "capture stream closed, encoder exiting"
        );
    }
}
