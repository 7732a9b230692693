use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

/// Normalized hearing-loss severity in [0, 1].
///
/// 0.0 is normal hearing, 1.0 is profound loss. Out-of-range input is
/// clamped at construction, never rejected: the UI slider guarantees the
/// range, the engine re-clamps anyway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Severity(f32);

impl Severity {
    /// Normal hearing, no simulated loss.
    pub const NORMAL: Severity = Severity(0.0);

    pub fn new(level: f32) -> Self {
        Self(level.clamp(0.0, 1.0))
    }

    #[must_use]
    pub fn level(&self) -> f32 {
        self.0
    }

    /// Low-pass cutoff for this severity.
    ///
    /// Exponential rolloff (`20_000 * 0.04^level`, floored at 150 Hz):
    /// real hearing loss takes high frequencies first, so consonant and
    /// sibilant energy disappears long before the fundamental. Below 0.01
    /// the filter is left fully open.
    #[must_use]
    pub fn cutoff_hz(&self) -> f32 {
        if self.0 < 0.01 {
            return 20_000.0;
        }
        (20_000.0 * 0.04_f32.powf(self.0)).max(150.0)
    }

    /// Master output gain. Drops linearly and less steeply than the filter;
    /// the two effects combine.
    #[must_use]
    pub fn output_gain(&self) -> f32 {
        (1.0 - 0.75 * self.0).clamp(0.0, 1.0)
    }

    /// Caption speech volume: `10^(-3.5 * level)`, floored at 0.02 so the
    /// voice never fully vanishes.
    #[must_use]
    pub fn speech_volume(&self) -> f32 {
        10.0_f32.powf(-3.5 * self.0).max(0.02)
    }

    /// Caption speech rate, linear from 0.50 down to 0.25. Impaired
    /// listeners need slower speech to parse words.
    #[must_use]
    pub fn speech_rate(&self) -> f32 {
        (0.50 - 0.25 * self.0).max(0.25)
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::NORMAL
    }
}

/// Atomic cell for lock-free severity reads across tasks.
///
/// Stores the raw f32 bits; single writer (the control context).
#[derive(Debug)]
pub struct AtomicSeverity(AtomicU32);

impl AtomicSeverity {
    pub fn new(severity: Severity) -> Self {
        Self(AtomicU32::new(severity.level().to_bits()))
    }

    pub fn load(&self) -> Severity {
        Severity::new(f32::from_bits(self.0.load(Ordering::Relaxed)))
    }

    pub fn store(&self, severity: Severity) {
        self.0.store(severity.level().to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicSeverity {
    fn default() -> Self {
        Self::new(Severity::NORMAL)
    }
}

/// Low-pass filter parameters derived from severity.
///
/// Published by the control context to the real-time render path on every
/// severity change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterState {
    pub cutoff_hz: f32,
    pub gain: f32,
}

impl FilterState {
    /// Fully open filter at unity gain.
    pub const OPEN: FilterState = FilterState {
        cutoff_hz: 20_000.0,
        gain: 1.0,
    };

    #[must_use]
    pub fn for_severity(severity: Severity) -> Self {
        Self {
            cutoff_hz: severity.cutoff_hz().clamp(150.0, 20_000.0),
            gain: severity.output_gain(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_clamps_input() {
        assert_eq!(Severity::new(-0.5).level(), 0.0);
        assert_eq!(Severity::new(1.5).level(), 1.0);
        assert_eq!(Severity::new(0.3).level(), 0.3);
    }

    #[test]
    fn test_cutoff_open_below_threshold() {
        assert_eq!(Severity::new(0.0).cutoff_hz(), 20_000.0);
        assert_eq!(Severity::new(0.009).cutoff_hz(), 20_000.0);
    }

    #[test]
    fn test_cutoff_reference_points() {
        // 20_000 * 0.04^0.5 = 4_000
        let mid = Severity::new(0.5).cutoff_hz();
        assert!((mid - 4_000.0).abs() < 4_000.0 * 0.05, "got {mid}");

        // 20_000 * 0.04^1.0 = 800
        let full = Severity::new(1.0).cutoff_hz();
        assert!((full - 800.0).abs() < 800.0 * 0.05, "got {full}");
    }

    #[test]
    fn test_cutoff_monotone_and_floored() {
        let mut prev = f32::INFINITY;
        for i in 0..=100 {
            let cutoff = Severity::new(i as f32 / 100.0).cutoff_hz();
            assert!(cutoff <= prev, "not monotone at level {}", i as f32 / 100.0);
            assert!(cutoff >= 150.0);
            prev = cutoff;
        }
    }

    #[test]
    fn test_output_gain() {
        assert_eq!(Severity::new(0.0).output_gain(), 1.0);
        assert_eq!(Severity::new(1.0).output_gain(), 0.25);
        assert!((Severity::new(0.5).output_gain() - 0.625).abs() < 1e-6);
    }

    #[test]
    fn test_speech_volume_curve() {
        assert_eq!(Severity::new(0.0).speech_volume(), 1.0);
        // 10^-3.5 is well below the floor
        assert_eq!(Severity::new(1.0).speech_volume(), 0.02);

        let mut prev = f32::INFINITY;
        for i in 0..=100 {
            let vol = Severity::new(i as f32 / 100.0).speech_volume();
            assert!(vol <= prev);
            assert!(vol >= 0.02);
            prev = vol;
        }
    }

    #[test]
    fn test_speech_rate_linear_with_floor() {
        assert_eq!(Severity::new(0.0).speech_rate(), 0.50);
        assert!((Severity::new(0.5).speech_rate() - 0.375).abs() < 1e-6);
        assert_eq!(Severity::new(1.0).speech_rate(), 0.25);
    }

    #[test]
    fn test_filter_state_for_severity() {
        let open = FilterState::for_severity(Severity::NORMAL);
        assert_eq!(open.cutoff_hz, 20_000.0);
        assert_eq!(open.gain, 1.0);

        let mid = FilterState::for_severity(Severity::new(0.5));
        assert!((mid.cutoff_hz - 4_000.0).abs() < 200.0);
        assert!((mid.gain - 0.625).abs() < 1e-6);
    }

    #[test]
    fn test_atomic_severity_roundtrip() {
        let cell = AtomicSeverity::default();
        assert_eq!(cell.load(), Severity::NORMAL);

        cell.store(Severity::new(0.7));
        assert!((cell.load().level() - 0.7).abs() < 1e-6);
    }
}
