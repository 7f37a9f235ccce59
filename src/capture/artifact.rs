use crate::error::{SessionError, SessionResult};

/// Size of a bare WAV/WebM container with no audio in it.
/// Anything at or below this is not a usable recording.
pub const MIN_ARTIFACT_BYTES: usize = 44;

/// Finished recording produced once per successful session.
///
/// Consumed exactly once by the artifact sink and never persisted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    /// MIME type reported by the capture worker (e.g. "audio/webm;codecs=opus")
    pub mime_hint: String,
    pub size_bytes: usize,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>, mime_hint: impl Into<String>) -> Self {
        let size_bytes = bytes.len();
        Self {
            bytes,
            mime_hint: mime_hint.into(),
            size_bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reject artifacts at or below `min_bytes`, or whose declared size
    /// disagrees with the payload
    pub fn validate(self, min_bytes: usize) -> SessionResult<Self> {
        if self.size_bytes != self.bytes.len() {
            return Err(SessionError::WorkerStop(format!(
                "Artifact size mismatch: declared {} bytes, received {}",
                self.size_bytes,
                self.bytes.len()
            )));
        }
        if self.bytes.len() <= min_bytes {
            return Err(SessionError::WorkerStop(format!(
                "Invalid audio data received ({} bytes)",
                self.bytes.len()
            )));
        }
        Ok(self)
    }

    /// File extension matching the MIME hint
    pub fn extension(&self) -> &'static str {
        let essence = self
            .mime_hint
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        match essence {
            "audio/webm" | "video/webm" => "webm",
            "audio/ogg" => "ogg",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            _ => "bin",
        }
    }
}
