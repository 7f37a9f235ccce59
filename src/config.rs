use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::AudioBackendConfig;
use crate::capture::MIN_ARTIFACT_BYTES;
use crate::session::{CoordinatorConfig, RetryPolicy};

/// Environment override prefix, e.g. `LOQA_RECORDER__SERVICE__HTTP__PORT=9000`
pub const ENV_PREFIX: &str = "LOQA_RECORDER";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionSettings,
    pub capture: CaptureConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-recorder".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3100,
        }
    }
}

/// Coordinator tuning as it appears in the config file (milliseconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub heartbeat_interval_ms: u64,
    pub command_queue_depth: usize,
    pub subscriber_buffer: usize,
    pub start_attempts: u32,
    pub start_retry_delay_ms: u64,
    pub worker_timeout_ms: u64,
    pub min_artifact_bytes: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 1000,
            command_queue_depth: 32,
            subscriber_buffer: 64,
            start_attempts: 3,
            start_retry_delay_ms: 1000,
            worker_timeout_ms: 5000,
            min_artifact_bytes: MIN_ARTIFACT_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Remote capture workers reached over NATS request/reply
    Nats,
    /// Local file playback, no browser involved
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub mode: CaptureMode,
    pub nats_url: String,
    pub subject_prefix: String,
    pub file_path: Option<PathBuf>,
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_duration_ms: u64,
    pub restricted_schemes: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Nats,
            nats_url: "nats://localhost:4222".to_string(),
            subject_prefix: "capture".to_string(),
            file_path: None,
            sample_rate: 16000,
            channels: 1,
            buffer_duration_ms: 100,
            restricted_schemes: vec!["chrome://".to_string(), "edge://".to_string()],
        }
    }
}

impl CaptureConfig {
    pub fn backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: self.sample_rate,
            target_channels: self.channels,
            buffer_duration_ms: self.buffer_duration_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Webhook endpoint; delivery is skipped when unset
    pub webhook_url: Option<String>,
    pub file_name: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            file_name: "recording".to_string(),
        }
    }
}

impl Config {
    /// Load `path` (any extension the `config` crate understands, optional)
    /// and then apply `LOQA_RECORDER__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("capture.restricted_schemes"),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid recorder configuration")
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let session = &self.session;
        CoordinatorConfig {
            heartbeat_interval: Duration::from_millis(session.heartbeat_interval_ms.max(1)),
            command_queue_depth: session.command_queue_depth.max(1),
            subscriber_buffer: session.subscriber_buffer.max(1),
            start_retry: RetryPolicy::new(
                session.start_attempts,
                Duration::from_millis(session.start_retry_delay_ms),
            ),
            worker_timeout: Duration::from_millis(session.worker_timeout_ms),
            min_artifact_bytes: session.min_artifact_bytes,
            restricted_schemes: self.capture.restricted_schemes.clone(),
        }
    }
}
