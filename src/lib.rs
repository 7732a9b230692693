#![forbid(unsafe_code)]

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use app::HearingSimulator;
pub use domain::{
    AudioBuffer, EngineConfig, EngineError, EngineEvent, EngineSnapshot, FilterState,
    PlaybackState, Severity, SAMPLE_RATE,
};
