use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::capture::Artifact;
use crate::error::{SessionError, SessionResult};

/// Operation requested from a remote capture worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerOperation {
    StartRecording,
    PauseRecording,
    ResumeRecording,
    StopRecording,
    CancelRecording,
}

/// Request published to `<prefix>.<contextId>`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    #[serde(rename = "type")]
    pub operation: WorkerOperation,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_type: Option<String>,
}

/// Reply from a remote capture worker
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerReply {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Machine-readable failure kind, e.g. "permission_denied"
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub blob_data: Option<BlobData>,
}

pub const PERMISSION_DENIED: &str = "permission_denied";

/// Recording bytes carried across the context boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobData {
    /// Base64-encoded artifact bytes
    pub data: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Byte count as reported by the worker
    pub size: usize,
}

impl BlobData {
    pub fn encode(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
            size: bytes.len(),
        }
    }

    /// Decode into an artifact, keeping the declared size for validation
    pub fn into_artifact(self) -> SessionResult<Artifact> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| SessionError::WorkerStop(format!("Corrupt recording payload: {}", e)))?;

        Ok(Artifact {
            bytes,
            mime_hint: self.mime_type,
            size_bytes: self.size,
        })
    }
}

/// Reply to `<prefix>.resolve`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetReply {
    pub context_id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Message on `<prefix>.<contextId>.lost`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LostNotice {
    #[serde(default)]
    pub reason: Option<String>,
}
