use async_trait::async_trait;
use tokio::sync::oneshot;

use super::artifact::Artifact;
use crate::error::{SessionError, SessionResult};

/// Execution context a capture worker runs in (a page, a tab, a local device)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetContext {
    pub id: String,
    /// Address of the context, if it has one (checked for eligibility)
    pub url: Option<String>,
}

impl TargetContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Reject browser system pages and anything that is not a web page.
    /// Contexts without an address (local devices) are always eligible.
    pub fn check_eligible(&self, restricted_schemes: &[String]) -> SessionResult<()> {
        let Some(url) = self.url.as_deref() else {
            return Ok(());
        };

        if restricted_schemes
            .iter()
            .any(|scheme| url.starts_with(scheme.as_str()))
        {
            return Err(SessionError::Binding(
                "Recording not available on browser system pages".to_string(),
            ));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SessionError::Binding(
                "Recording is only supported on web pages".to_string(),
            ));
        }

        Ok(())
    }
}

/// The component with direct access to the capture device and encoder.
///
/// Raw data increments stay inside the worker; the coordinator only ever sees
/// the final artifact or a failure. `stop` flushes buffered data before it
/// resolves.
#[async_trait]
pub trait CaptureWorker: Send {
    async fn start(&mut self, recording_type: &str) -> SessionResult<()>;

    async fn pause(&mut self) -> SessionResult<()>;

    async fn resume(&mut self) -> SessionResult<()>;

    async fn stop(&mut self) -> SessionResult<Artifact>;

    /// Best-effort and idempotent; discards any partial recording
    async fn cancel(&mut self) -> SessionResult<()>;
}

/// A worker bound to a target context for the life of one session
pub struct BoundWorker {
    pub worker: Box<dyn CaptureWorker>,
    /// Fires with a reason if the worker's context goes away
    pub lost: Option<oneshot::Receiver<String>>,
}

impl BoundWorker {
    pub fn new(worker: Box<dyn CaptureWorker>) -> Self {
        Self { worker, lost: None }
    }

    pub fn with_loss_signal(mut self, lost: oneshot::Receiver<String>) -> Self {
        self.lost = Some(lost);
        self
    }
}

/// Finds target contexts and binds capture workers to them
#[async_trait]
pub trait CaptureHost: Send + Sync {
    /// Pick the context the next session records in
    async fn resolve_target(&self) -> SessionResult<TargetContext>;

    /// Attach a capture worker to `target`
    async fn bind(&self, target: &TargetContext) -> SessionResult<BoundWorker>;

    /// Host name for logging
    fn name(&self) -> &str;
}
