use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::CoordinatorConfig;
use super::handle::{CoordinatorHandle, CoordinatorMessage};
use super::state::{Phase, SessionState};
use crate::capture::{Artifact, BoundWorker, CaptureHost, CaptureWorker, TargetContext};
use crate::error::{SessionError, SessionResult};
use crate::observers::{ObserverRegistry, SubscriberId};
use crate::protocol::{ClientCommand, ServerEvent, SessionSnapshot};
use crate::sink::ArtifactSink;

/// How a failed command is reported
enum Failure {
    /// Sent to the issuing subscriber only
    Rejected(SessionError),
    /// Fanned out to every subscriber
    Reported(SessionError),
}

impl From<SessionError> for Failure {
    fn from(error: SessionError) -> Self {
        Failure::Rejected(error)
    }
}

type CommandResult = Result<(), Failure>;

/// Single source of truth for the recording session.
///
/// Runs as one task that owns the [`SessionState`], the bound capture worker
/// and the observer registry. Messages are handled one at a time and each
/// command finishes its worker round-trip before the next one is read, so
/// worker calls never interleave.
pub struct SessionCoordinator {
    config: CoordinatorConfig,
    state: SessionState,
    observers: ObserverRegistry,
    host: Arc<dyn CaptureHost>,
    sink: Arc<dyn ArtifactSink>,
    worker: Option<Box<dyn CaptureWorker>>,
    receiver: mpsc::Receiver<CoordinatorMessage>,
    /// Lets watcher and delivery tasks report back without keeping the
    /// coordinator alive
    mailbox: mpsc::WeakSender<CoordinatorMessage>,
}

impl SessionCoordinator {
    /// Start the coordinator task; it runs until every handle is dropped
    pub fn spawn(
        config: CoordinatorConfig,
        host: Arc<dyn CaptureHost>,
        sink: Arc<dyn ArtifactSink>,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.command_queue_depth.max(1));

        info!(
            "Session coordinator starting (capture host: {}, heartbeat: {:?}, worker timeout: {:?})",
            host.name(),
            config.heartbeat_interval,
            config.worker_timeout
        );

        let coordinator = Self {
            observers: ObserverRegistry::new(config.subscriber_buffer),
            config,
            state: SessionState::new(),
            host,
            sink,
            worker: None,
            receiver,
            mailbox: sender.downgrade(),
        };

        let task = tokio::spawn(coordinator.run());

        (CoordinatorHandle::new(sender), task)
    }

    async fn run(mut self) {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.receiver.recv() => match message {
                    Some(message) => {
                        if self.handle_message(message).await.is_break() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = heartbeat.tick() => self.on_heartbeat(),
            }
        }

        self.shutdown().await;
    }

    async fn handle_message(&mut self, message: CoordinatorMessage) -> ControlFlow<()> {
        match message {
            CoordinatorMessage::Command {
                command,
                origin,
                respond_to,
            } => {
                let result = self.handle_command(command, origin).await;
                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(result);
                }
            }
            CoordinatorMessage::Attach { respond_to } => {
                let snapshot = self.snapshot();
                let subscription = self.observers.attach(snapshot);
                let _ = respond_to.send(subscription);
            }
            CoordinatorMessage::Detach { id } => {
                self.observers.detach(id);
            }
            CoordinatorMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
            CoordinatorMessage::WorkerLost { session_id, reason } => {
                self.on_worker_lost(session_id, reason);
            }
            CoordinatorMessage::DeliveryFinished { session_id, result } => {
                self.on_delivery_finished(session_id, result);
            }
            CoordinatorMessage::Shutdown => return ControlFlow::Break(()),
        }

        ControlFlow::Continue(())
    }

    async fn handle_command(
        &mut self,
        command: ClientCommand,
        origin: Option<SubscriberId>,
    ) -> SessionResult<()> {
        let name = command.name();
        debug!("Handling {} (phase: {})", name, self.state.phase());

        if let Some(id) = origin {
            self.observers.touch(id);
        }

        let outcome = match command {
            ClientCommand::StartRecording { recording_type } => self.start(recording_type).await,
            ClientCommand::StopRecording => self.stop().await,
            ClientCommand::PauseRecording => self.pause().await,
            ClientCommand::ResumeRecording => self.resume().await,
            ClientCommand::CancelRecording => self.cancel().await,
            ClientCommand::GetState => {
                if let Some(id) = origin {
                    let snapshot = self.snapshot();
                    self.observers.send_to(id, ServerEvent::state(snapshot));
                }
                Ok(())
            }
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(Failure::Rejected(e)) => {
                warn!("{} rejected: {}", name, e);
                if let Some(id) = origin {
                    self.observers.send_to(id, ServerEvent::error(&e));
                }
                Err(e)
            }
            Err(Failure::Reported(e)) => {
                error!("{} failed: {} ({})", name, e, e.code());
                self.observers.broadcast(&ServerEvent::error(&e));
                Err(e)
            }
        }
    }

    async fn start(&mut self, recording_type: String) -> CommandResult {
        let session_id = self
            .state
            .begin_start(&recording_type)
            .map_err(Failure::Reported)?;

        info!(
            "Starting recording session {} (type: {})",
            session_id, recording_type
        );

        match self.bind_and_start(&recording_type).await {
            Ok((target, bound)) => {
                self.state.mark_recording(Instant::now())?;
                self.worker = Some(bound.worker);
                if let Some(lost) = bound.lost {
                    self.watch_worker(session_id, lost);
                }

                info!(
                    "Recording session {} started in context {}",
                    session_id, target.id
                );
                self.broadcast_state();
                Ok(())
            }
            Err(e) => {
                self.state.fail(Instant::now());
                self.state.reset();
                Err(Failure::Reported(e))
            }
        }
    }

    /// Resolve the target, then bind and start a worker under the retry policy
    async fn bind_and_start(
        &mut self,
        recording_type: &str,
    ) -> SessionResult<(TargetContext, BoundWorker)> {
        let limit = self.config.worker_timeout;

        let target = bounded(
            limit,
            self.host.resolve_target(),
            SessionError::Binding("Timed out resolving capture context".to_string()),
        )
        .await?;
        target.check_eligible(&self.config.restricted_schemes)?;
        self.state.bind_target(&target.id)?;

        let host = Arc::clone(&self.host);
        let target_ref = &target;

        let bound = self
            .config
            .start_retry
            .run("Capture start", |attempt| {
                let host = Arc::clone(&host);
                async move {
                    debug!("Capture start attempt {} in {}", attempt, target_ref.id);

                    let mut bound = bounded(
                        limit,
                        host.bind(target_ref),
                        SessionError::Binding("Timed out binding capture worker".to_string()),
                    )
                    .await?;

                    let started = bounded(
                        limit,
                        bound.worker.start(recording_type),
                        SessionError::WorkerStart("Capture worker did not respond".to_string()),
                    )
                    .await;

                    match started {
                        Ok(()) => Ok(bound),
                        Err(e) => {
                            release(bound.worker, limit).await;
                            Err(e)
                        }
                    }
                }
            })
            .await?;

        Ok((target, bound))
    }

    async fn pause(&mut self) -> CommandResult {
        // Guard only; the transition is applied once the worker confirms
        self.state.clone().pause(Instant::now())?;

        let limit = self.config.worker_timeout;
        let worker = self.bound_worker(SessionError::WorkerPause)?;
        bounded(
            limit,
            worker.pause(),
            SessionError::WorkerPause("Capture worker did not acknowledge pause".to_string()),
        )
        .await
        .map_err(Failure::Reported)?;

        self.state.pause(Instant::now())?;
        info!(
            "Recording paused at {:.1}s",
            self.state.accumulated_active().as_secs_f64()
        );
        self.broadcast_state();
        Ok(())
    }

    async fn resume(&mut self) -> CommandResult {
        self.state.clone().resume(Instant::now())?;

        let limit = self.config.worker_timeout;
        let worker = self.bound_worker(SessionError::WorkerResume)?;
        bounded(
            limit,
            worker.resume(),
            SessionError::WorkerResume("Capture worker did not acknowledge resume".to_string()),
        )
        .await
        .map_err(Failure::Reported)?;

        self.state.resume(Instant::now())?;
        info!(
            "Recording resumed from {:.1}s",
            self.state.accumulated_active().as_secs_f64()
        );
        self.broadcast_state();
        Ok(())
    }

    async fn stop(&mut self) -> CommandResult {
        self.state.begin_stop(Instant::now())?;

        let session_id = self.state.session_id().unwrap_or_else(Uuid::nil);
        let recording_type = self.state.recording_type().unwrap_or_default().to_string();
        let active = self.state.accumulated_active();

        info!(
            "Stopping recording session {} after {:.1}s",
            session_id,
            active.as_secs_f64()
        );

        let result = match self.worker.take() {
            Some(mut worker) => bounded(
                self.config.worker_timeout,
                worker.stop(),
                SessionError::WorkerStop("Capture worker did not respond to stop".to_string()),
            )
            .await
            .and_then(|artifact| artifact.validate(self.config.min_artifact_bytes)),
            None => Err(SessionError::WorkerStop("No capture worker bound".to_string())),
        };

        match result {
            Ok(artifact) => {
                info!(
                    "Recording session {} complete: {} bytes ({})",
                    session_id, artifact.size_bytes, artifact.mime_hint
                );
                self.hand_off(session_id, artifact, recording_type);
                self.state.reset();
                self.broadcast_state();
                Ok(())
            }
            Err(e) => {
                self.state.fail(Instant::now());
                self.state.reset();
                self.broadcast_state();
                Err(Failure::Reported(e))
            }
        }
    }

    async fn cancel(&mut self) -> CommandResult {
        if self.state.is_idle() {
            debug!("Cancel while idle; nothing to do");
            return Ok(());
        }

        self.state.begin_cancel(Instant::now())?;
        info!("Cancelling recording session {:?}", self.state.session_id());

        let result = match self.worker.take() {
            Some(mut worker) => {
                bounded(
                    self.config.worker_timeout,
                    worker.cancel(),
                    SessionError::WorkerCancel(
                        "Capture worker did not acknowledge cancel".to_string(),
                    ),
                )
                .await
            }
            None => Ok(()),
        };

        // Any partial recording went with the worker
        self.state.reset();
        self.broadcast_state();
        result.map_err(Failure::Reported)
    }

    fn on_heartbeat(&mut self) {
        if self.state.phase() == Phase::Recording && !self.observers.is_empty() {
            self.broadcast_state();
        }
    }

    fn on_worker_lost(&mut self, session_id: Uuid, reason: String) {
        if self.state.is_idle() || self.state.session_id() != Some(session_id) {
            debug!("Ignoring loss notice for stale session {}", session_id);
            return;
        }

        warn!(
            "Capture context {:?} lost during {}: {}",
            self.state.target_context_id(),
            self.state.phase(),
            reason
        );

        self.worker = None;
        self.state.fail(Instant::now());
        self.state.reset();

        let error = SessionError::Binding(format!("Capture context lost: {}", reason));
        self.observers.broadcast(&ServerEvent::error(&error));
        self.broadcast_state();
    }

    fn on_delivery_finished(&mut self, session_id: Uuid, result: SessionResult<()>) {
        match result {
            Ok(()) => info!("Recording from session {} delivered", session_id),
            Err(e) => {
                error!("Delivery for session {} failed: {}", session_id, e);
                self.observers.broadcast(&ServerEvent::error(&e));
            }
        }
    }

    /// Give the artifact to the sink without waiting for it
    fn hand_off(&self, session_id: Uuid, artifact: Artifact, recording_type: String) {
        let sink = Arc::clone(&self.sink);
        let mailbox = self.mailbox.clone();

        tokio::spawn(async move {
            let result = sink.deliver(artifact, &recording_type).await;
            if let Some(sender) = mailbox.upgrade() {
                let _ = sender
                    .send(CoordinatorMessage::DeliveryFinished { session_id, result })
                    .await;
            }
        });
    }

    fn watch_worker(&self, session_id: Uuid, lost: oneshot::Receiver<String>) {
        let mailbox = self.mailbox.clone();

        tokio::spawn(async move {
            if let Ok(reason) = lost.await {
                if let Some(sender) = mailbox.upgrade() {
                    let _ = sender
                        .send(CoordinatorMessage::WorkerLost { session_id, reason })
                        .await;
                }
            }
        });
    }

    fn bound_worker(
        &mut self,
        failure: fn(String) -> SessionError,
    ) -> Result<&mut Box<dyn CaptureWorker>, Failure> {
        self.worker
            .as_mut()
            .ok_or_else(|| Failure::Reported(failure("No capture worker bound".to_string())))
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot(Instant::now())
    }

    fn broadcast_state(&mut self) {
        let event = ServerEvent::state(self.snapshot());
        let delivered = self.observers.broadcast(&event);
        debug!("State broadcast to {} subscriber(s)", delivered);
    }

    async fn shutdown(&mut self) {
        info!("Session coordinator shutting down");
        if let Some(worker) = self.worker.take() {
            release(worker, self.config.worker_timeout).await;
        }
        self.state.reset();

        let dropped = self.observers.clear();
        debug!("Closed {} subscriber stream(s)", dropped);
    }
}

/// Await `future`, failing with `on_timeout` after `limit`
async fn bounded<T>(
    limit: Duration,
    future: impl Future<Output = SessionResult<T>>,
    on_timeout: SessionError,
) -> SessionResult<T> {
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout),
    }
}

/// Best-effort cancel, then drop the worker
async fn release(mut worker: Box<dyn CaptureWorker>, limit: Duration) {
    match tokio::time::timeout(limit, worker.cancel()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to release capture worker: {}", e),
        Err(_) => warn!("Capture worker did not acknowledge release"),
    }
}
