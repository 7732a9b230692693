pub mod config;
pub mod haptics;
pub mod output;
pub mod speech;

pub use config::ConfigStore;
pub use haptics::HapticDevice;
pub use output::{AudioOutput, OutputEvent, SourceSlot};
pub use speech::{SpeechSynthesizer, Utterance};
