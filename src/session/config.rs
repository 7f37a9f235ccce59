use std::time::Duration;

use super::retry::RetryPolicy;
use crate::capture::MIN_ARTIFACT_BYTES;

/// Tuning for the session coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Snapshot re-broadcast interval while recording
    pub heartbeat_interval: Duration,

    /// Mailbox capacity; commands beyond it are rejected as busy
    pub command_queue_depth: usize,

    /// Per-subscriber outbox capacity
    pub subscriber_buffer: usize,

    /// Bind/start handshake retries
    pub start_retry: RetryPolicy,

    /// Upper bound on any single capture worker call
    pub worker_timeout: Duration,

    /// Artifacts at or below this size are rejected
    pub min_artifact_bytes: usize,

    /// Target address prefixes that may never be recorded
    pub restricted_schemes: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(1),
            command_queue_depth: 32,
            subscriber_buffer: 64,
            start_retry: RetryPolicy::default(),
            worker_timeout: Duration::from_secs(5),
            min_artifact_bytes: MIN_ARTIFACT_BYTES,
            restricted_schemes: vec!["chrome://".to_string(), "edge://".to_string()],
        }
    }
}
