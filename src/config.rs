use anyhow::{Context, Result};
use serde::Deserialize;

use crate::session::{Modality, SessionConfig};
use crate::transport::WsTransport;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub remote: RemoteConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoteConfig {
    /// WebSocket URL of the streaming speech endpoint.
    pub url: String,
    /// Environment variable holding the API key (never stored in the file).
    pub api_key_env: String,
    pub model: String,
    pub voice: String,
    #[serde(default)]
    pub system_instruction: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub block_samples: usize,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model: self.remote.model.clone(),
            modality: Modality::Audio,
            voice: self.remote.voice.clone(),
            system_instruction: self.remote.system_instruction.clone(),
            capture_sample_rate: self.audio.capture_sample_rate,
            playback_sample_rate: self.audio.playback_sample_rate,
            block_samples: self.audio.block_samples,
            ..SessionConfig::default()
        }
    }

    /// Build the WebSocket transport, resolving the API key from the
    /// environment.
    pub fn transport(&self) -> Result<WsTransport> {
        let api_key = std::env::var(&self.remote.api_key_env)
            .with_context(|| format!("missing API key env var {}", self.remote.api_key_env))?;
        Ok(WsTransport::new(self.remote.url.clone(), Some(api_key)))
    }
}
