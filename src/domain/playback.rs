use serde::Serialize;

use crate::domain::buffer::AudioBuffer;
use crate::domain::error::EngineError;
use crate::domain::synthesis;

/// Playback state machine.
///
/// State transitions:
/// - Idle -> Playing (play_sound with a successfully generated buffer)
/// - Playing -> Idle (second play_sound, explicit stop, buffer completion)
///
/// A second play_sound while Playing stops the current sound instead of
/// switching to the new one: the invocation is a toggle control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "sound")]
pub enum PlaybackState {
    Idle,
    Playing(String),
}

impl PlaybackState {
    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing(_))
    }

    #[must_use]
    pub fn current_sound(&self) -> Option<&str> {
        match self {
            PlaybackState::Playing(name) => Some(name),
            PlaybackState::Idle => None,
        }
    }
}

/// Synthesis recipe for a named scenario sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoundKind {
    Tone { frequency_hz: f32 },
    Speech { base_hz: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundSpec {
    pub kind: SoundKind,
    pub duration_secs: f32,
}

impl SoundSpec {
    /// Map a scenario sound name to its synthesis parameters. Unknown names
    /// fall back to a short mid-range tone.
    #[must_use]
    pub fn for_name(name: &str) -> Self {
        match name {
            "notification" => Self {
                kind: SoundKind::Tone {
                    frequency_hz: 1_000.0,
                },
                duration_secs: 0.6,
            },
            "alarm" => Self {
                kind: SoundKind::Tone {
                    frequency_hz: 1_200.0,
                },
                duration_secs: 1.4,
            },
            "voice" => Self {
                kind: SoundKind::Speech { base_hz: 200.0 },
                duration_secs: 2.2,
            },
            _ => Self {
                kind: SoundKind::Tone {
                    frequency_hz: 440.0,
                },
                duration_secs: 0.8,
            },
        }
    }

    /// Render this spec into a playable buffer.
    pub fn render(&self) -> Result<AudioBuffer, EngineError> {
        match self.kind {
            SoundKind::Tone { frequency_hz } => {
                synthesis::generate_tone(frequency_hz, self.duration_secs)
            }
            SoundKind::Speech { base_hz } => {
                synthesis::generate_speech(self.duration_secs, base_hz)
            }
        }
    }
}

/// Observable engine state, emitted after every playback transition.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub is_playing: bool,
    pub current_sound: Option<String>,
    /// Decaying visualization level in [0, 1].
    pub volume_level: f32,
    pub severity: f32,
}

/// Events emitted by the engine for UI observation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    /// Playback state changed; carries the full post-transition snapshot.
    StateChanged { snapshot: EngineSnapshot },
    /// The volume-decay loop advanced a step.
    VolumeLevel { level: f32 },
    /// Severity changed and the shared filter was reconfigured.
    SeverityChanged {
        severity: f32,
        cutoff_hz: f32,
        gain: f32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_state_accessors() {
        assert!(!PlaybackState::Idle.is_playing());
        assert_eq!(PlaybackState::Idle.current_sound(), None);

        let playing = PlaybackState::Playing("alarm".to_string());
        assert!(playing.is_playing());
        assert_eq!(playing.current_sound(), Some("alarm"));
    }

    #[test]
    fn test_sound_catalog() {
        let spec = SoundSpec::for_name("notification");
        assert_eq!(
            spec.kind,
            SoundKind::Tone {
                frequency_hz: 1_000.0
            }
        );
        assert_eq!(spec.duration_secs, 0.6);

        let spec = SoundSpec::for_name("alarm");
        assert_eq!(
            spec.kind,
            SoundKind::Tone {
                frequency_hz: 1_200.0
            }
        );
        assert_eq!(spec.duration_secs, 1.4);

        let spec = SoundSpec::for_name("voice");
        assert_eq!(spec.kind, SoundKind::Speech { base_hz: 200.0 });
        assert_eq!(spec.duration_secs, 2.2);
    }

    #[test]
    fn test_unknown_sound_falls_back() {
        let spec = SoundSpec::for_name("door-creak");
        assert_eq!(
            spec.kind,
            SoundKind::Tone {
                frequency_hz: 440.0
            }
        );
        assert_eq!(spec.duration_secs, 0.8);
    }

    #[test]
    fn test_render_produces_expected_lengths() {
        let tone = SoundSpec::for_name("notification").render().unwrap();
        assert_eq!(tone.len(), 26_460);

        let speech = SoundSpec::for_name("voice").render().unwrap();
        assert_eq!(speech.len(), (44_100.0f32 * 2.2).round() as usize);
    }
}
