//! Wire shapes exchanged with control surfaces
//!
//! Commands and events are JSON objects tagged by a `type` field:
//! - `START_RECORDING { recordingType }`, `STOP_RECORDING`, `PAUSE_RECORDING`,
//!   `RESUME_RECORDING`, `CANCEL_RECORDING`, `GET_STATE`
//! - `STATE_UPDATE { state }`, `ERROR { error }`

pub mod messages;

pub use messages::{ClientCommand, ServerEvent, SessionSnapshot};
