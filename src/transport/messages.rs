use serde::{Deserialize, Serialize};

/// Session setup sent once after the socket opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    pub model: String,
    pub response_modalities: Vec<String>,
    pub voice: String,
    pub system_instruction: String,
    pub input_audio_transcription: bool,
    pub output_audio_transcription: bool,
}

/// One outbound media chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    /// Base64-encoded PCM payload.
    pub data: String,
}

/// Client-to-server frames, serialized as `{"setup": ...}` / `{"media": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(SetupMessage),
    Media(MediaChunk),
}

/// Transcription deltas carried by a server event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionDelta {
    pub input: Option<String>,
    pub output: Option<String>,
}

/// Audio payload carried by a server event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioPayload {
    /// Base64-encoded PCM 16-bit LE mono at the playback sample rate.
    pub payload: String,
}

/// One inbound event from the remote speech session.
///
/// Any combination of fields may be present; events are processed strictly in
/// arrival order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerEvent {
    /// Handshake acknowledgement; first event of a session.
    pub setup_complete: bool,
    pub transcription: Option<TranscriptionDelta>,
    pub turn_complete: bool,
    pub audio: Option<AudioPayload>,
    /// Barge-in: discard all scheduled reply audio immediately.
    pub interrupted: bool,
}

impl ServerEvent {
    pub fn with_input_transcription(text: &str) -> Self {
        Self {
            transcription: Some(TranscriptionDelta {
                input: Some(text.to_string()),
                output: None,
            }),
            ..Self::default()
        }
    }

    pub fn with_output_transcription(text: &str) -> Self {
        Self {
            transcription: Some(TranscriptionDelta {
                input: None,
                output: Some(text.to_string()),
            }),
            ..Self::default()
        }
    }

    pub fn with_turn_complete() -> Self {
        Self {
            turn_complete: true,
            ..Self::default()
        }
    }

    pub fn with_audio(payload: &str) -> Self {
        Self {
            audio: Some(AudioPayload {
                payload: payload.to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn with_interrupted() -> Self {
        Self {
            interrupted: true,
            ..Self::default()
        }
    }
}
