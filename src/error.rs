//! Session error taxonomy
//!
//! Every failure the coordinator can observe degrades to one of these
//! variants. None of them is fatal to the coordinator itself.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No eligible target context, or the context is restricted
    #[error("{0}")]
    Binding(String),

    /// Capture device access denied
    #[error("Microphone permission denied: {0}")]
    Permission(String),

    #[error("Failed to start recording: {0}")]
    WorkerStart(String),

    /// Includes "artifact too small/empty"
    #[error("Failed to stop recording: {0}")]
    WorkerStop(String),

    #[error("Failed to pause recording: {0}")]
    WorkerPause(String),

    #[error("Failed to resume recording: {0}")]
    WorkerResume(String),

    #[error("Failed to cancel recording: {0}")]
    WorkerCancel(String),

    /// Artifact sink failure; never affects the session phase
    #[error("Failed to deliver recording: {0}")]
    Delivery(String),

    /// Command received in a phase that does not accept it
    #[error("{0}")]
    Protocol(String),

    /// Command queue is full
    #[error("Coordinator is busy, try again")]
    Busy,

    /// Coordinator task has shut down
    #[error("Coordinator is not running")]
    Closed,
}

impl SessionError {
    /// Stable identifier for logs and clients
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Binding(_) => "BINDING_ERROR",
            SessionError::Permission(_) => "PERMISSION_ERROR",
            SessionError::WorkerStart(_) => "WORKER_START_ERROR",
            SessionError::WorkerStop(_) => "WORKER_STOP_ERROR",
            SessionError::WorkerPause(_) => "WORKER_PAUSE_ERROR",
            SessionError::WorkerResume(_) => "WORKER_RESUME_ERROR",
            SessionError::WorkerCancel(_) => "WORKER_CANCEL_ERROR",
            SessionError::Delivery(_) => "DELIVERY_ERROR",
            SessionError::Protocol(_) => "PROTOCOL_ERROR",
            SessionError::Busy => "BUSY",
            SessionError::Closed => "CLOSED",
        }
    }

    /// Whether another bind/start attempt may succeed.
    ///
    /// Permission denials are final: asking again without user action
    /// yields the same answer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Binding(_) | SessionError::WorkerStart(_))
    }

    pub fn already_in_progress() -> Self {
        SessionError::Protocol("Recording already in progress".to_string())
    }

    pub fn no_active_recording() -> Self {
        SessionError::Protocol("No active recording".to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
