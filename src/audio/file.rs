use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            bail!(
                "Unsupported WAV format: {} bits {:?} (expected 16-bit PCM)",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split into frames of `frame_ms` each (the last one may be shorter)
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        let samples_per_frame = (self.sample_rate as u64 * self.channels as u64 * frame_ms / 1000)
            .max(self.channels as u64) as usize;

        self.samples
            .chunks(samples_per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Replays a WAV file as if it were a live capture device.
///
/// Frames are emitted every `buffer_duration_ms`; the stream ends when the
/// file runs out or `stop` is called.
pub struct FilePlaybackBackend {
    audio: Arc<AudioFile>,
    config: AudioBackendConfig,
    stop_tx: Option<watch::Sender<bool>>,
    pump: Option<JoinHandle<()>>,
}

impl FilePlaybackBackend {
    pub fn new(audio: Arc<AudioFile>, config: AudioBackendConfig) -> Self {
        info!(
            "File playback backend initialized: {} ({}ms buffers)",
            audio.path, config.buffer_duration_ms
        );

        Self {
            audio,
            config,
            stop_tx: None,
            pump: None,
        }
    }

    pub fn open(path: impl AsRef<Path>, config: AudioBackendConfig) -> Result<Self> {
        let audio = AudioFile::open(path)?;
        Ok(Self::new(Arc::new(audio), config))
    }
}

#[async_trait::async_trait]
impl AudioBackend for FilePlaybackBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.is_capturing() {
            bail!("Already capturing");
        }

        let frame_ms = self.config.buffer_duration_ms.max(1);
        let frames = self.audio.frames(frame_ms);
        let (tx, rx) = mpsc::channel(100);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let pump = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
            for frame in frames {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
            debug!("File playback pump finished");
        });

        self.stop_tx = Some(stop_tx);
        self.pump = Some(pump);

        info!("File playback started: {}", self.audio.path);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }

        if let Some(pump) = self.pump.take() {
            pump.await.context("File playback task panicked")?;
        }

        info!("File playback stopped: {}", self.audio.path);

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.pump.as_ref().is_some_and(|pump| !pump.is_finished())
    }

    fn name(&self) -> &str {
        "file playback"
    }
}
