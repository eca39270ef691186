//! Live session management
//!
//! This module provides the session layer of the voice core:
//! - `SessionConfig`: modality, voice, persona, transcription flags
//! - `SessionConnection`: connection state machine + inbound event demux
//! - `SessionController`: lifecycle orchestration and device ownership

mod config;
mod connection;
mod controller;

pub use config::{Modality, SessionConfig};
pub use connection::{process_event, SessionConnection, SessionState};
pub use controller::SessionController;
