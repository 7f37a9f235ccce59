use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info};

use super::ArtifactSink;
use crate::capture::Artifact;
use crate::error::{SessionError, SessionResult};

/// Posts finished recordings to `<endpoint>?route=<recordingType>` as a
/// multipart form with a single `audio` part.
pub struct WebhookSink {
    client: reqwest::Client,
    endpoint: Option<String>,
    file_name: String,
}

impl WebhookSink {
    pub fn new(endpoint: Option<String>, file_name: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: endpoint.filter(|url| !url.trim().is_empty()),
            file_name: file_name.into(),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Delivery URL for `recording_type`, if an endpoint is configured.
    /// The tag is query-encoded; existing query pairs are kept.
    pub fn delivery_url(&self, recording_type: &str) -> SessionResult<Option<Url>> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(None);
        };

        let mut url = Url::parse(endpoint).map_err(|e| {
            SessionError::Delivery(format!("Invalid webhook URL {}: {}", endpoint, e))
        })?;
        url.query_pairs_mut().append_pair("route", recording_type);

        Ok(Some(url))
    }
}

#[async_trait]
impl ArtifactSink for WebhookSink {
    async fn deliver(&self, artifact: Artifact, recording_type: &str) -> SessionResult<()> {
        let Some(url) = self.delivery_url(recording_type)? else {
            debug!(
                "No webhook configured; discarding {} byte recording",
                artifact.size_bytes
            );
            return Ok(());
        };

        let file_name = format!("{}.{}", self.file_name, artifact.extension());
        let size = artifact.size_bytes;

        let part = Part::bytes(artifact.bytes)
            .file_name(file_name)
            .mime_str(&artifact.mime_hint)
            .map_err(|e| SessionError::Delivery(format!("Invalid MIME type: {}", e)))?;

        let form = Form::new().part("audio", part);

        info!("Sending {} byte recording to webhook: {}", size, url);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SessionError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::Delivery(format!(
                "Upload failed: {}",
                response.status().as_u16()
            )));
        }

        info!("Upload successful");

        Ok(())
    }
}
