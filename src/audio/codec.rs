//! Wire codec for audio chunks.
//!
//! Audio crosses the transport boundary as base64-encoded PCM 16-bit
//! little-endian mono. `decode(encode(x)) == x` holds for every byte
//! sequence, including the empty one.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{Error, Result};

/// Encode raw PCM bytes into the text-safe transport representation.
pub fn encode(raw: &[u8]) -> String {
    BASE64.encode(raw)
}

/// Decode a transport payload back into raw PCM bytes.
///
/// Malformed input is the only error path; callers drop the payload and log.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    BASE64.decode(text).map_err(|e| Error::Codec(e.to_string()))
}

/// Pack f32 samples (nominally in [-1.0, 1.0]) into PCM 16-bit little-endian.
///
/// Values are scaled by 32768 and clamped to the i16 range; a sample at
/// exactly +1.0 saturates to `i16::MAX` instead of wrapping negative.
pub fn pack_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample * 32768.0).clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Unpack PCM 16-bit little-endian bytes into f32 samples in [-1.0, 1.0).
///
/// An odd trailing byte is ignored.
pub fn unpack_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect()
}
