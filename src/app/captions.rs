use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::Severity;
use crate::ports::{SpeechSynthesizer, Utterance};

/// Narrates caption text through the speech service, modulated by severity
/// so the listener hears captions the way the simulated patient would.
pub struct CaptionSpeaker {
    synth: Arc<dyn SpeechSynthesizer>,
}

impl CaptionSpeaker {
    pub fn new(synth: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { synth }
    }

    /// Pitch multiplier for a caption speaker tag.
    fn pitch_for(speaker_id: &str) -> f32 {
        match speaker_id {
            "Doctor" => 0.82,
            "Patient" => 1.18,
            "Alarm" => 1.50,
            _ => 1.00,
        }
    }

    /// Speak `text` as `speaker_id`. A caption already in flight is cut off
    /// first: at most one utterance is active at a time.
    pub async fn speak(&self, text: &str, speaker_id: &str, severity: Severity) {
        if self.synth.is_speaking() {
            self.synth.stop(true);
        }

        let utterance = Utterance {
            text: text.to_string(),
            pitch: Self::pitch_for(speaker_id),
            volume: severity.speech_volume(),
            rate: severity.speech_rate(),
        };
        debug!(
            speaker = speaker_id,
            pitch = utterance.pitch,
            volume = utterance.volume,
            rate = utterance.rate,
            "Speaking caption"
        );

        if let Err(e) = self.synth.speak(utterance).await {
            warn!(error = %e, "Caption speech failed");
        }
    }

    /// Cut off the current utterance. No-op when nothing is speaking.
    pub fn stop(&self) {
        self.synth.stop(true);
    }
}
