use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Command sent by a control surface over its subscriber connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    StartRecording {
        #[serde(rename = "recordingType")]
        recording_type: String,
    },
    StopRecording,
    PauseRecording,
    ResumeRecording,
    CancelRecording,
    /// Snapshot for the requesting subscriber only
    GetState,
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::StartRecording { .. } => "START_RECORDING",
            ClientCommand::StopRecording => "STOP_RECORDING",
            ClientCommand::PauseRecording => "PAUSE_RECORDING",
            ClientCommand::ResumeRecording => "RESUME_RECORDING",
            ClientCommand::CancelRecording => "CANCEL_RECORDING",
            ClientCommand::GetState => "GET_STATE",
        }
    }
}

/// Immutable view of the session as rendered by observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub is_recording: bool,
    pub is_paused: bool,
    /// Active (non-paused) seconds, floored
    pub duration: u64,
    pub recording_type: Option<String>,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self {
            is_recording: false,
            is_paused: false,
            duration: 0,
            recording_type: None,
        }
    }
}

/// Event fanned out to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    StateUpdate { state: SessionSnapshot },
    Error { error: String },
}

impl ServerEvent {
    pub fn state(snapshot: SessionSnapshot) -> Self {
        ServerEvent::StateUpdate { state: snapshot }
    }

    pub fn error(error: &SessionError) -> Self {
        ServerEvent::Error {
            error: error.to_string(),
        }
    }
}
