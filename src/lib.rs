pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod observers;
pub mod protocol;
pub mod session;
pub mod sink;

pub use audio::{AudioBackend, AudioBackendConfig, AudioFile, AudioFrame, FilePlaybackBackend, WavEncoder};
pub use capture::{
    Artifact, BoundWorker, CaptureHost, CaptureWorker, LocalCaptureHost, LocalCaptureWorker,
    TargetContext,
};
pub use config::Config;
pub use error::{SessionError, SessionResult};
pub use http::{create_router, AppState};
pub use nats::{NatsCaptureHost, NatsCaptureWorker};
pub use observers::{ObserverRegistry, SubscriberId, Subscription};
pub use protocol::{ClientCommand, ServerEvent, SessionSnapshot};
pub use session::{
    CoordinatorConfig, CoordinatorHandle, Phase, RetryPolicy, SessionCoordinator, SessionState,
};
pub use sink::{ArtifactSink, WebhookSink};
