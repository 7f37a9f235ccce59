//! Artifact sink: the single outbound delivery per completed session

mod webhook;

use async_trait::async_trait;

use crate::capture::Artifact;
use crate::error::SessionResult;

pub use webhook::WebhookSink;

/// Accepts a finished recording plus its routing tag.
///
/// Delivery is best-effort; the session has already ended when this runs.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn deliver(&self, artifact: Artifact, recording_type: &str) -> SessionResult<()>;
}
