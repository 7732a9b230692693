use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::domain::EngineError;
use crate::ports::{SpeechSynthesizer, Utterance};

/// Words per second of the stand-in voice at natural rate (0.5).
const BASE_WORDS_PER_SEC: f32 = 2.5;

/// Speech stand-in for platforms without a system voice.
///
/// Logs each utterance and models its duration so `is_speaking` behaves like
/// a real synthesizer: the flag stays up for the estimated delivery time and
/// drops early when the utterance is cut off.
pub struct LogSpeech {
    speaking: Arc<AtomicBool>,
    active: Mutex<Option<watch::Sender<bool>>>,
}

impl LogSpeech {
    pub fn new() -> Self {
        Self {
            speaking: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(None),
        }
    }

    fn estimated_duration(utterance: &Utterance) -> Duration {
        let words = utterance.text.split_whitespace().count().max(1) as f32;
        let rate_factor = (utterance.rate / 0.5).max(0.1);
        let secs = words / (BASE_WORDS_PER_SEC * rate_factor);
        Duration::from_secs_f32(secs.max(0.1))
    }
}

impl Default for LogSpeech {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSynthesizer for LogSpeech {
    async fn speak(&self, utterance: Utterance) -> Result<(), EngineError> {
        self.stop(true);

        info!(
            text = %utterance.text,
            pitch = utterance.pitch,
            volume = utterance.volume,
            rate = utterance.rate,
            "Speaking"
        );

        let duration = Self::estimated_duration(&utterance);
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        self.speaking.store(true, Ordering::Release);
        *self.active.lock() = Some(cancel_tx);

        let speaking = Arc::clone(&self.speaking);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx.changed() => {}
                _ = tokio::time::sleep(duration) => {
                    speaking.store(false, Ordering::Release);
                    debug!("Utterance finished");
                }
            }
        });
        Ok(())
    }

    fn stop(&self, immediate: bool) {
        if let Some(cancel) = self.active.lock().take() {
            let _ = cancel.send(true);
            if self.speaking.swap(false, Ordering::AcqRel) {
                debug!(immediate, "Utterance cut off");
            }
        }
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Acquire)
    }
}
