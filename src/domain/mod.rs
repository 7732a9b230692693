pub mod buffer;
pub mod config;
pub mod error;
pub mod playback;
pub mod severity;
pub mod synthesis;

pub use buffer::{AudioBuffer, SAMPLE_RATE};
pub use config::{EngineConfig, LoggingConfig, OutputConfig};
pub use error::EngineError;
pub use playback::{EngineEvent, EngineSnapshot, PlaybackState, SoundKind, SoundSpec};
pub use severity::{AtomicSeverity, FilterState, Severity};
