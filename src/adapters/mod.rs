pub mod config_store;
pub mod haptics_log;
pub mod output_cpal;
pub mod speech_log;

pub use config_store::TomlConfigStore;
pub use haptics_log::LogHaptics;
pub use output_cpal::CpalAudioOutput;
pub use speech_log::LogSpeech;
