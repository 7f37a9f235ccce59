//! In-process capture worker
//!
//! Pulls frames from an [`AudioBackend`], drops them while paused, and encodes
//! whatever was captured as a WAV artifact on stop.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::artifact::Artifact;
use super::worker::{BoundWorker, CaptureHost, CaptureWorker, TargetContext};
use crate::audio::{AudioBackend, AudioBackendConfig, WavEncoder};
use crate::error::{SessionError, SessionResult};

pub const WAV_MIME: &str = "audio/wav";

/// Opens a fresh backend for each session
pub type BackendFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn AudioBackend>> + Send + Sync>;

/// Capture host with a single local context
pub struct LocalCaptureHost {
    context_id: String,
    config: AudioBackendConfig,
    factory: BackendFactory,
}

impl LocalCaptureHost {
    pub fn new<F>(context_id: impl Into<String>, config: AudioBackendConfig, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn AudioBackend>> + Send + Sync + 'static,
    {
        Self {
            context_id: context_id.into(),
            config,
            factory: Arc::new(factory),
        }
    }
}

#[async_trait]
impl CaptureHost for LocalCaptureHost {
    async fn resolve_target(&self) -> SessionResult<TargetContext> {
        Ok(TargetContext::new(self.context_id.clone()))
    }

    async fn bind(&self, target: &TargetContext) -> SessionResult<BoundWorker> {
        if target.id != self.context_id {
            return Err(SessionError::Binding(format!(
                "Unknown capture context: {}",
                target.id
            )));
        }

        let backend = (self.factory)().map_err(|e| {
            SessionError::Binding(format!("Failed to open capture device: {:#}", e))
        })?;

        info!("Bound local capture worker ({})", backend.name());

        let (lost_tx, lost_rx) = oneshot::channel();
        let worker = LocalCaptureWorker::new(backend, self.config.clone(), lost_tx);

        Ok(BoundWorker::new(Box::new(worker)).with_loss_signal(lost_rx))
    }

    fn name(&self) -> &str {
        "local"
    }
}

pub struct LocalCaptureWorker {
    backend: Box<dyn AudioBackend>,
    config: AudioBackendConfig,
    paused: Arc<AtomicBool>,
    /// Set before the stream is closed on purpose so the collector does not
    /// report the end of the stream as a lost context
    stopping: Arc<AtomicBool>,
    lost_tx: Option<oneshot::Sender<String>>,
    collector: Option<JoinHandle<WavEncoder>>,
}

impl LocalCaptureWorker {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        config: AudioBackendConfig,
        lost_tx: oneshot::Sender<String>,
    ) -> Self {
        Self {
            backend,
            config,
            paused: Arc::new(AtomicBool::new(false)),
            stopping: Arc::new(AtomicBool::new(false)),
            lost_tx: Some(lost_tx),
            collector: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.collector.is_some()
    }
}

#[async_trait]
impl CaptureWorker for LocalCaptureWorker {
    async fn start(&mut self, recording_type: &str) -> SessionResult<()> {
        if self.collector.is_some() {
            return Err(SessionError::WorkerStart("Already recording".to_string()));
        }

        let mut audio_rx = self
            .backend
            .start()
            .await
            .map_err(|e| SessionError::WorkerStart(format!("{:#}", e)))?;

        self.paused.store(false, Ordering::SeqCst);
        self.stopping.store(false, Ordering::SeqCst);

        let paused = Arc::clone(&self.paused);
        let stopping = Arc::clone(&self.stopping);
        let lost_tx = self.lost_tx.take();
        let mut encoder = WavEncoder::new(self.config.target_sample_rate, self.config.target_channels);

        let collector = tokio::spawn(async move {
            while let Some(frame) = audio_rx.recv().await {
                if !paused.load(Ordering::SeqCst) {
                    encoder.write_frame(&frame);
                }
            }

            if !stopping.load(Ordering::SeqCst) {
                warn!("Capture stream ended without a stop request");
                if let Some(lost_tx) = lost_tx {
                    let _ = lost_tx.send("Capture stream ended unexpectedly".to_string());
                }
            }

            encoder
        });

        self.collector = Some(collector);

        info!(
            "Local capture started ({}, type={})",
            self.backend.name(),
            recording_type
        );

        Ok(())
    }

    async fn pause(&mut self) -> SessionResult<()> {
        if self.collector.is_none() {
            return Err(SessionError::WorkerPause("Not recording".to_string()));
        }
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> SessionResult<()> {
        if self.collector.is_none() {
            return Err(SessionError::WorkerResume("Not recording".to_string()));
        }
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> SessionResult<Artifact> {
        let collector = self
            .collector
            .take()
            .ok_or_else(|| SessionError::WorkerStop("Not recording".to_string()))?;

        self.stopping.store(true, Ordering::SeqCst);

        if let Err(e) = self.backend.stop().await {
            collector.abort();
            return Err(SessionError::WorkerStop(format!("{:#}", e)));
        }

        // Backend closed its sender; the collector drains what is still buffered
        let encoder = collector
            .await
            .map_err(|e| SessionError::WorkerStop(format!("Capture task failed: {}", e)))?;

        if encoder.is_empty() {
            return Err(SessionError::WorkerStop("No audio data recorded".to_string()));
        }

        info!(
            "Local capture stopped: {} samples, {:.1}s",
            encoder.sample_count(),
            encoder.span_ms() as f64 / 1000.0
        );

        let bytes = encoder
            .finish()
            .map_err(|e| SessionError::WorkerStop(format!("{:#}", e)))?;

        Ok(Artifact::new(bytes, WAV_MIME))
    }

    async fn cancel(&mut self) -> SessionResult<()> {
        self.stopping.store(true, Ordering::SeqCst);

        if let Some(collector) = self.collector.take() {
            if let Err(e) = self.backend.stop().await {
                warn!("Failed to stop backend during cancel: {:#}", e);
            }
            collector.abort();
            info!("Local capture cancelled");
        }

        Ok(())
    }
}

impl Drop for LocalCaptureWorker {
    fn drop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
    }
}
