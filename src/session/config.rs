use serde::{Deserialize, Serialize};

use crate::transport::messages::SetupMessage;

/// Reply modality requested from the remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Audio,
    Text,
}

impl Modality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "AUDIO",
            Self::Text => "TEXT",
        }
    }
}

/// Configuration for a live voice session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Remote model identifier.
    pub model: String,

    /// Reply modality (spoken audio by default).
    pub modality: Modality,

    /// Voice identity for synthesized replies.
    pub voice: String,

    /// System instruction establishing the assistant's persona.
    pub system_instruction: String,

    /// Request transcription of the user's speech.
    pub input_transcription: bool,

    /// Request transcription of the assistant's speech.
    pub output_transcription: bool,

    /// Microphone capture rate (the transport expects 16 kHz mono).
    pub capture_sample_rate: u32,

    /// Reply audio rate (the remote streams 24 kHz mono).
    pub playback_sample_rate: u32,

    /// Samples per outbound chunk (~256 ms at 16 kHz).
    pub block_samples: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: "default-native-audio".to_string(),
            modality: Modality::Audio,
            voice: "Kore".to_string(),
            system_instruction: String::new(),
            input_transcription: true,
            output_transcription: true,
            capture_sample_rate: 16000,
            playback_sample_rate: 24000,
            block_samples: crate::audio::BLOCK_SAMPLES,
        }
    }
}

impl From<&SessionConfig> for SetupMessage {
    fn from(config: &SessionConfig) -> Self {
        Self {
            model: config.model.clone(),
            response_modalities: vec![config.modality.as_str().to_string()],
            voice: config.voice.clone(),
            system_instruction: config.system_instruction.clone(),
            input_audio_transcription: config.input_transcription,
            output_audio_transcription: config.output_transcription,
        }
    }
}
