pub mod backend;
pub mod file;
pub mod wav;

pub use backend::{AudioBackend, AudioBackendConfig, AudioFrame};
pub use file::{AudioFile, FilePlaybackBackend};
pub use wav::WavEncoder;
