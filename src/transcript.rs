//! Transcript assembly.
//!
//! Transcription text arrives as incremental deltas per speaker role and is
//! accumulated in two turn buffers. At each turn boundary the buffers are
//! flushed into immutable lines on the ordered transcript log, user line
//! first, and cleared unconditionally.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Speaker role for one transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One completed line on the transcript log. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionLine {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Shared, ordered transcript log. Cloned handles observe the same log.
pub type TranscriptLog = Arc<Mutex<Vec<TranscriptionLine>>>;

pub struct TranscriptAssembler {
    user_buffer: String,
    assistant_buffer: String,
    log: TranscriptLog,
}

impl TranscriptAssembler {
    pub fn new(log: TranscriptLog) -> Self {
        Self {
            user_buffer: String::new(),
            assistant_buffer: String::new(),
            log,
        }
    }

    /// Append a transcription delta to the matching turn buffer.
    pub fn append(&mut self, role: Role, delta: &str) {
        match role {
            Role::User => self.user_buffer.push_str(delta),
            Role::Assistant => self.assistant_buffer.push_str(delta),
        }
    }

    /// Flush both turn buffers at a turn boundary.
    ///
    /// Non-empty buffers become lines on the log, user before assistant
    /// regardless of which filled first. Both buffers are cleared
    /// unconditionally; flushing with both empty is a valid no-op.
    pub fn flush(&mut self) {
        let user = std::mem::take(&mut self.user_buffer);
        let assistant = std::mem::take(&mut self.assistant_buffer);

        let mut log = self.log.lock().unwrap();
        if !user.is_empty() {
            let line = Self::line(Role::User, user);
            info!(role = "user", text = %line.text, "transcript line");
            log.push(line);
        }
        if !assistant.is_empty() {
            let line = Self::line(Role::Assistant, assistant);
            info!(role = "assistant", text = %line.text, "transcript line");
            log.push(line);
        }
    }

    fn line(role: Role, text: String) -> TranscriptionLine {
        TranscriptionLine {
            id: Uuid::new_v4(),
            role,
            text,
            timestamp: Utc::now(),
        }
    }
}
