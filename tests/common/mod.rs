// Test doubles shared by the integration tests
//
// `ScriptedHost` hands out workers whose behaviour is driven by a shared
// `Script`; `RecordingSink` captures every delivery.

#![allow(dead_code)]

use async_trait::async_trait;
use loqa_recorder::capture::{Artifact, BoundWorker, CaptureHost, CaptureWorker, TargetContext};
use loqa_recorder::error::{SessionError, SessionResult};
use loqa_recorder::protocol::{ServerEvent, SessionSnapshot};
use loqa_recorder::session::{CoordinatorConfig, CoordinatorHandle, RetryPolicy, SessionCoordinator};
use loqa_recorder::sink::ArtifactSink;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};

/// What the worker does when asked to stop
#[derive(Debug, Clone)]
pub enum StopScript {
    Artifact(Artifact),
    Fail(SessionError),
    /// Never answers
    Hang,
}

#[derive(Debug)]
pub struct Script {
    pub target: Mutex<SessionResult<TargetContext>>,
    /// Upcoming start attempts that fail with a retryable error
    pub failing_starts: AtomicU32,
    pub start_error: Mutex<Option<SessionError>>,
    /// When set, `start` waits for a notification before answering
    pub start_gate: Mutex<Option<Arc<Notify>>>,
    pub pause_error: Mutex<Option<SessionError>>,
    /// When set, `pause` never answers
    pub pause_hangs: AtomicBool,
    pub stop: Mutex<StopScript>,
    /// When set, `cancel` never answers
    pub cancel_hangs: AtomicBool,
    pub binds: AtomicU32,
    pub calls: Mutex<Vec<String>>,
    /// Loss senders in bind order, one per bound worker
    pub loss: Mutex<Vec<Option<oneshot::Sender<String>>>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            target: Mutex::new(Ok(
                TargetContext::new("tab-1").with_url("https://meet.example.com/abc")
            )),
            failing_starts: AtomicU32::new(0),
            start_error: Mutex::new(None),
            start_gate: Mutex::new(None),
            pause_error: Mutex::new(None),
            pause_hangs: AtomicBool::new(false),
            stop: Mutex::new(StopScript::Artifact(webm_artifact(2048))),
            cancel_hangs: AtomicBool::new(false),
            binds: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
            loss: Mutex::new(Vec::new()),
        }
    }
}

impl Script {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn binds(&self) -> u32 {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn set_target(&self, target: SessionResult<TargetContext>) {
        *self.target.lock().unwrap() = target;
    }

    pub fn set_stop(&self, stop: StopScript) {
        *self.stop.lock().unwrap() = stop;
    }

    /// Fire the loss signal of the `index`-th bound worker
    pub fn lose(&self, index: usize, reason: &str) {
        let sender = self.loss.lock().unwrap()[index].take();
        sender.expect("loss signal already used").send(reason.to_string()).unwrap();
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

pub struct ScriptedHost {
    pub script: Arc<Script>,
}

impl ScriptedHost {
    pub fn new() -> (Arc<Self>, Arc<Script>) {
        let script = Arc::new(Script::default());
        let host = Arc::new(Self {
            script: Arc::clone(&script),
        });
        (host, script)
    }
}

#[async_trait]
impl CaptureHost for ScriptedHost {
    async fn resolve_target(&self) -> SessionResult<TargetContext> {
        self.script.target.lock().unwrap().clone()
    }

    async fn bind(&self, target: &TargetContext) -> SessionResult<BoundWorker> {
        self.script.binds.fetch_add(1, Ordering::SeqCst);
        self.script.record(format!("bind:{}", target.id));

        let (lost_tx, lost_rx) = oneshot::channel();
        self.script.loss.lock().unwrap().push(Some(lost_tx));

        let worker = ScriptedWorker {
            script: Arc::clone(&self.script),
        };
        Ok(BoundWorker::new(Box::new(worker)).with_loss_signal(lost_rx))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct ScriptedWorker {
    script: Arc<Script>,
}

#[async_trait]
impl CaptureWorker for ScriptedWorker {
    async fn start(&mut self, recording_type: &str) -> SessionResult<()> {
        self.script.record(format!("start:{}", recording_type));

        let gate = self.script.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(e) = self.script.start_error.lock().unwrap().clone() {
            return Err(e);
        }

        let failing = self.script.failing_starts.load(Ordering::SeqCst);
        if failing > 0 {
            self.script.failing_starts.store(failing - 1, Ordering::SeqCst);
            return Err(SessionError::WorkerStart("device busy".to_string()));
        }

        Ok(())
    }

    async fn pause(&mut self) -> SessionResult<()> {
        self.script.record("pause");
        if self.script.pause_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        match self.script.pause_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn resume(&mut self) -> SessionResult<()> {
        self.script.record("resume");
        Ok(())
    }

    async fn stop(&mut self) -> SessionResult<Artifact> {
        self.script.record("stop");
        let stop = self.script.stop.lock().unwrap().clone();
        match stop {
            StopScript::Artifact(artifact) => Ok(artifact),
            StopScript::Fail(e) => Err(e),
            StopScript::Hang => std::future::pending().await,
        }
    }

    async fn cancel(&mut self) -> SessionResult<()> {
        self.script.record("cancel");
        if self.script.cancel_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Sink that forwards every delivery to the test
pub struct RecordingSink {
    deliveries: mpsc::UnboundedSender<(Artifact, String)>,
    failure: Option<SessionError>,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(Artifact, String)>) {
        let (deliveries, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                deliveries,
                failure: None,
            }),
            rx,
        )
    }

    pub fn failing(error: SessionError) -> (Arc<Self>, mpsc::UnboundedReceiver<(Artifact, String)>) {
        let (deliveries, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                deliveries,
                failure: Some(error),
            }),
            rx,
        )
    }
}

#[async_trait]
impl ArtifactSink for RecordingSink {
    async fn deliver(&self, artifact: Artifact, recording_type: &str) -> SessionResult<()> {
        let _ = self.deliveries.send((artifact, recording_type.to_string()));
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

pub fn webm_artifact(size: usize) -> Artifact {
    Artifact::new(vec![0x1a; size], "audio/webm;codecs=opus")
}

/// Quiet heartbeat and fast retries so event counts stay exact
pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        heartbeat_interval: Duration::from_secs(3600),
        start_retry: RetryPolicy::new(3, Duration::from_millis(10)),
        ..CoordinatorConfig::default()
    }
}

pub struct Harness {
    pub handle: CoordinatorHandle,
    pub script: Arc<Script>,
    pub deliveries: mpsc::UnboundedReceiver<(Artifact, String)>,
}

pub fn spawn_with(config: CoordinatorConfig) -> Harness {
    let (host, script) = ScriptedHost::new();
    let (sink, deliveries) = RecordingSink::new();
    let (handle, _task) = SessionCoordinator::spawn(config, host, sink);
    Harness {
        handle,
        script,
        deliveries,
    }
}

pub fn spawn() -> Harness {
    spawn_with(test_config())
}

/// Everything already queued for a subscriber
pub fn drain(events: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

pub fn states(events: &[ServerEvent]) -> Vec<SessionSnapshot> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::StateUpdate { state } => Some(state.clone()),
            _ => None,
        })
        .collect()
}

pub fn errors(events: &[ServerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::Error { error } => Some(error.clone()),
            _ => None,
        })
        .collect()
}
