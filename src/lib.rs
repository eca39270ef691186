pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod transcript;
pub mod transport;

pub use audio::{
    AudioChunk, CaptureEncoder, CpalDevices, DeviceFactory, InputDevice, ManualDevices,
    ManualSink, OutputSink, PlaybackScheduler, SinkHandle, BLOCK_SAMPLES,
};
pub use config::Config;
pub use error::{Error, Result};
pub use session::{Modality, SessionConfig, SessionConnection, SessionController, SessionState};
pub use transcript::{Role, TranscriptAssembler, TranscriptLog, TranscriptionLine};
pub use transport::{MediaChunk, MockTransport, ServerEvent, Transport, WsTransport};
