use std::f32::consts::TAU;

use tracing::debug;

use crate::domain::buffer::{AudioBuffer, SAMPLE_RATE};
use crate::domain::error::EngineError;

/// Linear fade-in/out applied to every generated buffer, in seconds.
const FADE_SECS: f32 = 0.02;

/// Peak scale for pure tones.
const TONE_SCALE: f32 = 0.35;

/// Peak scale for the formant stack.
const SPEECH_SCALE: f32 = 0.25;

/// Syllabic amplitude-modulation rate in Hz.
const SYLLABLE_HZ: f32 = 5.0;

/// Speech-like formant stack, energy decreasing with frequency.
///
/// F0 is the speaker fundamental and F1 its third harmonic; F2..F5 sit at
/// fixed frequencies. Under an increasingly severe low-pass the top of the
/// stack (consonant and sibilant cues) disappears first, then vowel colour,
/// until only the fundamental rumble remains.
fn formant_stack(base_hz: f32) -> [(f32, f32); 6] {
    [
        (base_hz, 0.40),
        (base_hz * 3.0, 0.22),
        (1_800.0, 0.18),
        (2_800.0, 0.12),
        (4_500.0, 0.07),
        (6_500.0, 0.04),
    ]
}

fn frame_count(duration_secs: f32) -> Result<usize, EngineError> {
    let frames = (SAMPLE_RATE as f32 * duration_secs).round();
    if frames <= 0.0 {
        return Err(EngineError::EmptyBuffer { duration_secs });
    }
    Ok(frames as usize)
}

fn fade_frames() -> usize {
    (SAMPLE_RATE as f32 * FADE_SECS).round() as usize
}

/// Combined linear fade-in/out gain for one frame.
fn fade_gain(frame: usize, frames: usize, fade: usize) -> f32 {
    let fade_in = if frame < fade {
        frame as f32 / fade as f32
    } else {
        1.0
    };
    let fade_out = if frame + fade > frames {
        (frames - frame) as f32 / fade as f32
    } else {
        1.0
    };
    fade_in * fade_out
}

/// Generate a fixed-frequency tone with a quiet second harmonic and the
/// standard fade envelope.
pub fn generate_tone(frequency_hz: f32, duration_secs: f32) -> Result<AudioBuffer, EngineError> {
    let frames = frame_count(duration_secs)?;
    let fade = fade_frames();
    let sr = SAMPLE_RATE as f32;

    let mut samples = Vec::with_capacity(frames);
    for f in 0..frames {
        let t = f as f32 / sr;
        let sample =
            (TAU * frequency_hz * t).sin() + 0.25 * (TAU * frequency_hz * 2.0 * t).sin();
        samples.push(sample * TONE_SCALE * fade_gain(f, frames, fade));
    }

    debug!(frequency_hz, duration_secs, frames, "Generated tone buffer");
    Ok(AudioBuffer::from_samples(samples, SAMPLE_RATE))
}

/// Generate a speech-like buffer from the six-formant stack, amplitude
/// modulated at 5 Hz to mimic syllable rhythm.
pub fn generate_speech(duration_secs: f32, base_hz: f32) -> Result<AudioBuffer, EngineError> {
    let frames = frame_count(duration_secs)?;
    let fade = fade_frames();
    let sr = SAMPLE_RATE as f32;
    let formants = formant_stack(base_hz);

    let mut samples = Vec::with_capacity(frames);
    for f in 0..frames {
        let t = f as f32 / sr;
        let syllable = 0.7 + 0.3 * (TAU * SYLLABLE_HZ * t).sin();

        let mut sample = 0.0;
        for (freq, amp) in formants {
            sample += amp * (TAU * freq * t).sin();
        }

        samples.push(sample * syllable * SPEECH_SCALE * fade_gain(f, frames, fade));
    }

    debug!(base_hz, duration_secs, frames, "Generated speech buffer");
    Ok(AudioBuffer::from_samples(samples, SAMPLE_RATE))
}
