use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::observers::{SubscriberId, Subscription};
use crate::protocol::{ClientCommand, SessionSnapshot};

/// Messages sent to the coordinator task
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// A command from a control surface
    Command {
        command: ClientCommand,
        /// Subscriber that issued it, if it came over a subscriber connection
        origin: Option<SubscriberId>,
        /// Completion channel for callers that wait on the result
        respond_to: Option<oneshot::Sender<SessionResult<()>>>,
    },

    /// Register a new subscriber; it receives a snapshot immediately
    Attach {
        respond_to: oneshot::Sender<Subscription>,
    },

    Detach { id: SubscriberId },

    GetSnapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },

    /// The bound capture worker's context went away
    WorkerLost { session_id: Uuid, reason: String },

    /// Artifact sink finished with a session's recording
    DeliveryFinished {
        session_id: Uuid,
        result: SessionResult<()>,
    },

    /// Release the worker, drop every subscriber and exit
    Shutdown,
}

/// Cloneable sending side of the coordinator mailbox
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
}

impl CoordinatorHandle {
    pub(crate) fn new(sender: mpsc::Sender<CoordinatorMessage>) -> Self {
        Self { sender }
    }

    /// Queue a command without waiting for it to run.
    ///
    /// Fails with `Busy` when the mailbox is full, so a burst from many
    /// surfaces is rejected instead of growing without bound.
    pub fn dispatch(&self, command: ClientCommand, origin: Option<SubscriberId>) -> SessionResult<()> {
        self.sender
            .try_send(CoordinatorMessage::Command {
                command,
                origin,
                respond_to: None,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => SessionError::Busy,
                TrySendError::Closed(_) => SessionError::Closed,
            })
    }

    /// Run a command and wait until it has been fully processed
    pub async fn execute(&self, command: ClientCommand) -> SessionResult<()> {
        self.execute_from(command, None).await
    }

    pub async fn execute_from(
        &self,
        command: ClientCommand,
        origin: Option<SubscriberId>,
    ) -> SessionResult<()> {
        let (respond_to, response) = oneshot::channel();
        self.send(CoordinatorMessage::Command {
            command,
            origin,
            respond_to: Some(respond_to),
        })
        .await?;
        response.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn attach(&self) -> SessionResult<Subscription> {
        let (respond_to, response) = oneshot::channel();
        self.send(CoordinatorMessage::Attach { respond_to }).await?;
        response.await.map_err(|_| SessionError::Closed)
    }

    pub async fn detach(&self, id: SubscriberId) -> SessionResult<()> {
        self.send(CoordinatorMessage::Detach { id }).await
    }

    /// Current session snapshot, duration computed now
    pub async fn snapshot(&self) -> SessionResult<SessionSnapshot> {
        let (respond_to, response) = oneshot::channel();
        self.send(CoordinatorMessage::GetSnapshot { respond_to }).await?;
        response.await.map_err(|_| SessionError::Closed)
    }

    /// Ask the coordinator to stop. Subscriber event streams end once it
    /// has released the worker.
    pub async fn shutdown(&self) {
        // Already gone is fine
        let _ = self.send(CoordinatorMessage::Shutdown).await;
    }

    async fn send(&self, message: CoordinatorMessage) -> SessionResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| SessionError::Closed)
    }
}
