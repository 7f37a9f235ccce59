//! HTTP API server for the control surfaces
//!
//! This module exposes the session coordinator over HTTP:
//! - GET /health - Health check
//! - GET /state - Current session snapshot
//! - POST /commands - Queue one command (clients without a live connection)
//! - GET /ws - Subscriber connection: snapshots and errors out, commands in

mod handlers;
mod routes;
mod socket;
mod state;

pub use routes::create_router;
pub use state::AppState;
