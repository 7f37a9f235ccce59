//! Capture worker contract and the in-process implementation
//!
//! The coordinator talks to capture workers only through [`CaptureHost`] and
//! [`CaptureWorker`]. Remote workers (page or offscreen contexts) are reached
//! through `crate::nats`.

pub mod artifact;
pub mod local;
pub mod worker;

pub use artifact::{Artifact, MIN_ARTIFACT_BYTES};
pub use local::{LocalCaptureHost, LocalCaptureWorker};
pub use worker::{BoundWorker, CaptureHost, CaptureWorker, TargetContext};
