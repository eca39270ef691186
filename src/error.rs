use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy for the voice session core.
///
/// Codec and device errors are handled locally by the session machinery and
/// never tear down a running session on their own; connect and transport
/// errors surface as `SessionState::Error` and force a full teardown.
#[derive(Debug, Error)]
pub enum Error {
    /// Handshake or transport failure while establishing a session.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Malformed audio payload (dropped, never fatal).
    #[error("codec: {0}")]
    Codec(String),

    /// Microphone or output device unavailable.
    #[error("audio device: {0}")]
    Device(String),

    /// Mid-session transport failure.
    #[error("transport: {0}")]
    Transport(String),
}
