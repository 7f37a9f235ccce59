use anyhow::{Context, Result};
use async_nats::{Client, RequestErrorKind};
use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::messages::{LostNotice, TargetReply, WorkerOperation, WorkerReply, WorkerRequest, PERMISSION_DENIED};
use crate::capture::{Artifact, BoundWorker, CaptureHost, CaptureWorker, TargetContext};
use crate::error::{SessionError, SessionResult};

/// Capture host reaching remote workers over NATS request/reply
pub struct NatsCaptureHost {
    client: Client,
    subject_prefix: String,
}

impl NatsCaptureHost {
    /// Connect to NATS server
    pub async fn connect(url: &str, subject_prefix: impl Into<String>) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self::new(client, subject_prefix))
    }

    pub fn new(client: Client, subject_prefix: impl Into<String>) -> Self {
        Self {
            client,
            subject_prefix: subject_prefix.into(),
        }
    }

    pub fn resolve_subject(&self) -> String {
        format!("{}.resolve", self.subject_prefix)
    }

    pub fn worker_subject(&self, context_id: &str) -> String {
        format!("{}.{}", self.subject_prefix, context_id)
    }

    pub fn lost_subject(&self, context_id: &str) -> String {
        format!("{}.{}.lost", self.subject_prefix, context_id)
    }
}

#[async_trait]
impl CaptureHost for NatsCaptureHost {
    async fn resolve_target(&self) -> SessionResult<TargetContext> {
        let subject = self.resolve_subject();
        debug!("Resolving capture context on {}", subject);

        let message = self
            .client
            .request(subject, Vec::<u8>::new().into())
            .await
            .map_err(|e| match e.kind() {
                RequestErrorKind::NoResponders => {
                    SessionError::Binding("No active capture context found".to_string())
                }
                _ => SessionError::Binding(format!("Failed to resolve capture context: {}", e)),
            })?;

        let reply: TargetReply = serde_json::from_slice(&message.payload)
            .map_err(|e| SessionError::Binding(format!("Invalid resolve reply: {}", e)))?;

        let mut target = TargetContext::new(reply.context_id);
        if let Some(url) = reply.url {
            target = target.with_url(url);
        }

        Ok(target)
    }

    async fn bind(&self, target: &TargetContext) -> SessionResult<BoundWorker> {
        let lost_subject = self.lost_subject(&target.id);

        let mut subscriber = self
            .client
            .subscribe(lost_subject.clone())
            .await
            .map_err(|e| SessionError::Binding(format!("Failed to watch capture context: {}", e)))?;

        let (lost_tx, lost_rx) = oneshot::channel::<String>();
        let context_id = target.id.clone();

        let lost_watch = tokio::spawn(async move {
            if let Some(message) = subscriber.next().await {
                let notice: LostNotice = serde_json::from_slice(&message.payload).unwrap_or_default();
                let reason = notice
                    .reason
                    .unwrap_or_else(|| format!("Capture context {} disconnected", context_id));
                warn!("Capture context lost: {}", reason);
                let _ = lost_tx.send(reason);
            }
        });

        info!("Bound remote capture worker {} (watching {})", target.id, lost_subject);

        let worker = NatsCaptureWorker {
            client: self.client.clone(),
            subject: self.worker_subject(&target.id),
            session_id: Uuid::new_v4().to_string(),
            lost_watch,
        };

        Ok(BoundWorker::new(Box::new(worker)).with_loss_signal(lost_rx))
    }

    fn name(&self) -> &str {
        "nats"
    }
}

pub struct NatsCaptureWorker {
    client: Client,
    subject: String,
    session_id: String,
    lost_watch: JoinHandle<()>,
}

impl NatsCaptureWorker {
    async fn call(
        &self,
        operation: WorkerOperation,
        recording_type: Option<&str>,
        failure: fn(String) -> SessionError,
    ) -> SessionResult<WorkerReply> {
        let request = WorkerRequest {
            operation,
            session_id: self.session_id.clone(),
            recording_type: recording_type.map(str::to_string),
        };

        let payload = serde_json::to_vec(&request)
            .map_err(|e| failure(format!("Failed to encode request: {}", e)))?;

        let message = self
            .client
            .request(self.subject.clone(), payload.into())
            .await
            .map_err(|e| match e.kind() {
                RequestErrorKind::NoResponders => {
                    failure("Capture worker is not reachable".to_string())
                }
                _ => failure(e.to_string()),
            })?;

        let reply: WorkerReply = serde_json::from_slice(&message.payload)
            .map_err(|e| failure(format!("Invalid worker reply: {}", e)))?;

        if !reply.success {
            let reason = reply
                .error
                .clone()
                .unwrap_or_else(|| format!("{:?} rejected", operation));

            if reply.code.as_deref() == Some(PERMISSION_DENIED) {
                return Err(SessionError::Permission(reason));
            }
            return Err(failure(reason));
        }

        debug!("{:?} acknowledged by {}", operation, self.subject);

        Ok(reply)
    }
}

#[async_trait]
impl CaptureWorker for NatsCaptureWorker {
    async fn start(&mut self, recording_type: &str) -> SessionResult<()> {
        self.call(
            WorkerOperation::StartRecording,
            Some(recording_type),
            SessionError::WorkerStart,
        )
        .await?;
        Ok(())
    }

    async fn pause(&mut self) -> SessionResult<()> {
        self.call(WorkerOperation::PauseRecording, None, SessionError::WorkerPause)
            .await?;
        Ok(())
    }

    async fn resume(&mut self) -> SessionResult<()> {
        self.call(WorkerOperation::ResumeRecording, None, SessionError::WorkerResume)
            .await?;
        Ok(())
    }

    async fn stop(&mut self) -> SessionResult<Artifact> {
        let reply = self
            .call(WorkerOperation::StopRecording, None, SessionError::WorkerStop)
            .await?;

        let blob = reply
            .blob_data
            .ok_or_else(|| SessionError::WorkerStop("No audio data received".to_string()))?;

        blob.into_artifact()
    }

    async fn cancel(&mut self) -> SessionResult<()> {
        self.call(WorkerOperation::CancelRecording, None, SessionError::WorkerCancel)
            .await?;
        Ok(())
    }
}

impl Drop for NatsCaptureWorker {
    fn drop(&mut self) {
        self.lost_watch.abort();
    }
}
