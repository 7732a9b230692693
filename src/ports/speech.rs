use async_trait::async_trait;

use crate::domain::EngineError;

/// A single utterance handed to the speech synthesis service.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Pitch multiplier; 1.0 is the voice's natural pitch.
    pub pitch: f32,
    /// Delivery volume in [0, 1].
    pub volume: f32,
    /// Delivery rate in [0, 1]; 0.5 is natural pace.
    pub rate: f32,
}

/// Port for asynchronous speech synthesis.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Start speaking. Returns once the utterance has been accepted, not
    /// once it finishes.
    async fn speak(&self, utterance: Utterance) -> Result<(), EngineError>;

    /// Cut off the in-flight utterance, immediately or at the next word
    /// boundary. No-op when nothing is speaking.
    fn stop(&self, immediate: bool);

    /// Whether an utterance is currently in flight.
    fn is_speaking(&self) -> bool;
}
