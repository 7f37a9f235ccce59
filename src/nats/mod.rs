//! NATS transport to capture workers running in other contexts
//!
//! Subjects (with the default `capture` prefix):
//! - `capture.resolve` - reply names the context to record in
//! - `capture.<contextId>` - worker operations, one request per command
//! - `capture.<contextId>.lost` - published when the context goes away

pub mod client;
pub mod messages;

pub use client::{NatsCaptureHost, NatsCaptureWorker};
pub use messages::{BlobData, LostNotice, TargetReply, WorkerOperation, WorkerReply, WorkerRequest};
