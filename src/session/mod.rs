//! Recording session coordination
//!
//! This module provides the `SessionCoordinator`, which manages:
//! - The single authoritative session state and its transitions
//! - Serialized command processing against the bound capture worker
//! - Snapshot broadcasts to attached observers (on change and on heartbeat)
//! - Hand-off of finished recordings to the artifact sink

mod config;
mod coordinator;
mod handle;
mod retry;
mod state;

pub use config::CoordinatorConfig;
pub use coordinator::SessionCoordinator;
pub use handle::{CoordinatorHandle, CoordinatorMessage};
pub use retry::RetryPolicy;
pub use state::{Phase, SessionState};
