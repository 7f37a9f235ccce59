// Tests for the in-process capture worker driven by file playback

use anyhow::Result;
use async_trait::async_trait;
use loqa_recorder::audio::{
    AudioBackend, AudioBackendConfig, AudioFile, AudioFrame, FilePlaybackBackend,
};
use loqa_recorder::capture::{
    CaptureHost, CaptureWorker, LocalCaptureHost, LocalCaptureWorker, TargetContext,
};
use loqa_recorder::error::SessionError;
use loqa_recorder::protocol::{ClientCommand, SessionSnapshot};
use loqa_recorder::session::{CoordinatorConfig, SessionCoordinator};
use loqa_recorder::sink::ArtifactSink;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};

mod common;

fn file_host(dir: &Path, seconds: f64) -> Result<LocalCaptureHost> {
    let path = dir.join("source.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for i in 0..(16000.0 * seconds) as usize {
        writer.write_sample(((i * 37) % 2000) as i16 - 1000)?;
    }
    writer.finalize()?;

    let audio = Arc::new(AudioFile::open(&path)?);
    let config = AudioBackendConfig::default();
    let factory_config = config.clone();

    Ok(LocalCaptureHost::new("local", config, move || {
        let backend = FilePlaybackBackend::new(Arc::clone(&audio), factory_config.clone());
        Ok(Box::new(backend) as Box<dyn AudioBackend>)
    }))
}

/// Backend whose stream stays open and whose stop always fails
struct WedgedBackend {
    tx: Option<mpsc::Sender<AudioFrame>>,
}

#[async_trait]
impl AudioBackend for WedgedBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(8);
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        anyhow::bail!("device wedged")
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "wedged"
    }
}

fn wav_samples(bytes: &[u8]) -> Result<usize> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    Ok(reader.len() as usize)
}

#[tokio::test(start_paused = true)]
async fn test_local_worker_records_wav() -> Result<()> {
    let dir = TempDir::new()?;
    let host = file_host(dir.path(), 5.0)?;

    let target = host.resolve_target().await?;
    assert_eq!(target.id, "local");

    let mut bound = host.bind(&target).await?;
    bound.worker.start("meeting").await?;

    tokio::time::sleep(Duration::from_millis(1000)).await;

    let artifact = bound.worker.stop().await?;
    assert_eq!(artifact.mime_hint, "audio/wav");
    assert_eq!(artifact.extension(), "wav");

    let samples = wav_samples(&artifact.bytes)?;
    assert!(samples > 0);
    assert!(samples < 80000, "stopped before the file ran out");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_local_worker_drops_frames_while_paused() -> Result<()> {
    let dir = TempDir::new()?;

    let host = file_host(dir.path(), 5.0)?;
    let target = host.resolve_target().await?;
    let mut continuous = host.bind(&target).await?;
    continuous.worker.start("meeting").await?;
    tokio::time::sleep(Duration::from_millis(2000)).await;
    let full = wav_samples(&continuous.worker.stop().await?.bytes)?;

    let mut paused = host.bind(&target).await?;
    paused.worker.start("meeting").await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    paused.worker.pause().await?;
    tokio::time::sleep(Duration::from_millis(1000)).await;
    paused.worker.resume().await?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    let partial = wav_samples(&paused.worker.stop().await?.bytes)?;

    assert!(partial < full);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_local_worker_signals_loss_when_stream_ends() -> Result<()> {
    let dir = TempDir::new()?;
    let host = file_host(dir.path(), 0.3)?;

    let target = host.resolve_target().await?;
    let mut bound = host.bind(&target).await?;
    let lost = bound.lost.take().unwrap();

    bound.worker.start("meeting").await?;

    let reason = tokio::time::timeout(Duration::from_secs(5), lost).await??;
    assert_eq!(reason, "Capture stream ended unexpectedly");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_local_worker_rejects_out_of_order_calls() -> Result<()> {
    let dir = TempDir::new()?;
    let host = file_host(dir.path(), 1.0)?;
    let target = host.resolve_target().await?;

    let mut bound = host.bind(&target).await?;
    assert!(matches!(
        bound.worker.stop().await,
        Err(SessionError::WorkerStop(_))
    ));
    assert!(matches!(
        bound.worker.pause().await,
        Err(SessionError::WorkerPause(_))
    ));
    assert!(matches!(
        bound.worker.resume().await,
        Err(SessionError::WorkerResume(_))
    ));

    bound.worker.start("meeting").await?;
    assert!(matches!(
        bound.worker.start("meeting").await,
        Err(SessionError::WorkerStart(_))
    ));

    // Cancel is idempotent
    bound.worker.cancel().await?;
    bound.worker.cancel().await?;

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_backend_stop_aborts_collector() -> Result<()> {
    let (lost_tx, lost_rx) = oneshot::channel();
    let backend = Box::new(WedgedBackend { tx: None });
    let mut worker = LocalCaptureWorker::new(backend, AudioBackendConfig::default(), lost_tx);

    worker.start("meeting").await?;

    let result = worker.stop().await;
    assert_eq!(
        result.map(|_| ()),
        Err(SessionError::WorkerStop("device wedged".to_string()))
    );
    assert!(!worker.is_recording());

    // The backend still holds the stream open, so only an aborted collector
    // drops the loss sender; it must do so without reporting a loss
    let outcome = tokio::time::timeout(Duration::from_secs(1), lost_rx).await?;
    assert!(outcome.is_err());

    Ok(())
}

#[tokio::test]
async fn test_local_host_rejects_unknown_context() -> Result<()> {
    let dir = TempDir::new()?;
    let host = file_host(dir.path(), 1.0)?;

    let result = host.bind(&TargetContext::new("tab-7")).await;
    assert!(matches!(result, Err(SessionError::Binding(_))));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_coordinator_end_to_end_with_file_capture() -> Result<()> {
    let dir = TempDir::new()?;
    let host = Arc::new(file_host(dir.path(), 5.0)?);
    let (sink, mut deliveries) = common::RecordingSink::new();
    let sink: Arc<dyn ArtifactSink> = sink;

    let config = CoordinatorConfig {
        heartbeat_interval: Duration::from_secs(3600),
        ..CoordinatorConfig::default()
    };
    let (handle, _task) = SessionCoordinator::spawn(config, host, sink);

    handle
        .execute(ClientCommand::StartRecording {
            recording_type: "dictation".to_string(),
        })
        .await?;
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(handle.snapshot().await?.duration, 1);

    handle.execute(ClientCommand::StopRecording).await?;
    assert_eq!(handle.snapshot().await?, SessionSnapshot::idle());

    let (artifact, tag) = deliveries.recv().await.unwrap();
    assert_eq!(tag, "dictation");
    assert!(artifact.size_bytes > 44);
    assert!(wav_samples(&artifact.bytes)? > 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_coordinator_resets_when_file_runs_out() -> Result<()> {
    let dir = TempDir::new()?;
    let host = Arc::new(file_host(dir.path(), 0.5)?);
    let (sink, _deliveries) = common::RecordingSink::new();
    let (handle, _task) = SessionCoordinator::spawn(CoordinatorConfig::default(), host, sink);

    handle
        .execute(ClientCommand::StartRecording {
            recording_type: "meeting".to_string(),
        })
        .await?;

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(handle.snapshot().await?, SessionSnapshot::idle());

    Ok(())
}
