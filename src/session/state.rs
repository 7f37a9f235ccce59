use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::protocol::SessionSnapshot;

/// Lifecycle phase of the single recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Starting,
    Recording,
    Paused,
    Stopping,
    Cancelling,
    /// A session that failed and is about to be reset to Idle
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Starting => "starting",
            Phase::Recording => "recording",
            Phase::Paused => "paused",
            Phase::Stopping => "stopping",
            Phase::Cancelling => "cancelling",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The authoritative session state.
///
/// Owned by the coordinator task and never shared by reference; observers
/// only see [`SessionSnapshot`]s. Every mutation goes through a guarded
/// transition method that leaves the state untouched when the guard fails.
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: Phase,
    session_id: Option<Uuid>,
    recording_type: Option<String>,
    /// Beginning of the current unpaused interval
    started_at: Option<Instant>,
    /// Active time banked across pause/resume cycles
    accumulated_active: Duration,
    target_context_id: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            session_id: None,
            recording_type: None,
            started_at: None,
            accumulated_active: Duration::ZERO,
            target_context_id: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn recording_type(&self) -> Option<&str> {
        self.recording_type.as_deref()
    }

    pub fn target_context_id(&self) -> Option<&str> {
        self.target_context_id.as_deref()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn accumulated_active(&self) -> Duration {
        self.accumulated_active
    }

    /// Idle → Starting. Rejects without side effects while another session exists.
    pub fn begin_start(&mut self, recording_type: &str) -> SessionResult<Uuid> {
        if self.phase != Phase::Idle {
            return Err(SessionError::already_in_progress());
        }

        let session_id = Uuid::new_v4();
        self.phase = Phase::Starting;
        self.session_id = Some(session_id);
        self.recording_type = Some(recording_type.to_string());
        self.started_at = None;
        self.accumulated_active = Duration::ZERO;
        self.target_context_id = None;

        Ok(session_id)
    }

    /// Record which context the capture worker was bound to
    pub fn bind_target(&mut self, context_id: &str) -> SessionResult<()> {
        self.expect_phase(&[Phase::Starting], "bind a capture context")?;
        self.target_context_id = Some(context_id.to_string());
        Ok(())
    }

    /// Starting → Recording once the worker confirmed the start
    pub fn mark_recording(&mut self, now: Instant) -> SessionResult<()> {
        self.expect_phase(&[Phase::Starting], "confirm start")?;
        self.phase = Phase::Recording;
        self.started_at = Some(now);
        self.accumulated_active = Duration::ZERO;
        Ok(())
    }

    /// Recording → Paused, banking the current interval
    pub fn pause(&mut self, now: Instant) -> SessionResult<()> {
        self.expect_phase(&[Phase::Recording], "pause")?;
        self.bank_interval(now);
        self.phase = Phase::Paused;
        Ok(())
    }

    /// Paused → Recording, opening a new interval
    pub fn resume(&mut self, now: Instant) -> SessionResult<()> {
        self.expect_phase(&[Phase::Paused], "resume")?;
        self.phase = Phase::Recording;
        self.started_at = Some(now);
        Ok(())
    }

    /// Recording/Paused → Stopping. The duration freezes at its current value.
    pub fn begin_stop(&mut self, now: Instant) -> SessionResult<()> {
        self.expect_phase(&[Phase::Recording, Phase::Paused], "stop")?;
        self.bank_interval(now);
        self.phase = Phase::Stopping;
        Ok(())
    }

    /// Starting/Recording/Paused → Cancelling
    pub fn begin_cancel(&mut self, now: Instant) -> SessionResult<()> {
        self.expect_phase(
            &[Phase::Starting, Phase::Recording, Phase::Paused],
            "cancel",
        )?;
        self.bank_interval(now);
        self.phase = Phase::Cancelling;
        Ok(())
    }

    /// Mark the session failed; the caller reports and then resets
    pub fn fail(&mut self, now: Instant) {
        self.bank_interval(now);
        self.phase = Phase::Failed;
    }

    /// Back to Idle, discarding everything about the session
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Active duration: banked time plus the open interval while recording
    pub fn active_duration(&self, now: Instant) -> Duration {
        let live = match (self.phase, self.started_at) {
            (Phase::Recording, Some(started_at)) => now.saturating_duration_since(started_at),
            _ => Duration::ZERO,
        };
        self.accumulated_active + live
    }

    /// Observer-facing projection, computed at `now`
    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        let is_recording = matches!(
            self.phase,
            Phase::Recording | Phase::Paused | Phase::Stopping | Phase::Cancelling
        );

        SessionSnapshot {
            is_recording,
            is_paused: self.phase == Phase::Paused,
            duration: self.active_duration(now).as_secs(),
            recording_type: if self.phase == Phase::Idle {
                None
            } else {
                self.recording_type.clone()
            },
        }
    }

    fn bank_interval(&mut self, now: Instant) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated_active += now.saturating_duration_since(started_at);
        }
    }

    fn expect_phase(&self, allowed: &[Phase], action: &str) -> SessionResult<()> {
        if allowed.contains(&self.phase) {
            return Ok(());
        }
        if self.phase == Phase::Idle {
            return Err(SessionError::no_active_recording());
        }
        Err(SessionError::Protocol(format!(
            "Cannot {} while {}",
            action, self.phase
        )))
    }
}
