use tracing::debug;

use crate::ports::HapticDevice;

/// Haptic sink for platforms without a vibration motor.
///
/// Each impulse is recorded to the log so demos and tests can observe the
/// pulse train the engine produces.
#[derive(Debug, Default)]
pub struct LogHaptics;

impl LogHaptics {
    pub fn new() -> Self {
        Self
    }
}

impl HapticDevice for LogHaptics {
    fn impact(&self, intensity: f32) {
        let intensity = intensity.clamp(0.0, 1.0);
        debug!(intensity, "Haptic impulse");
    }
}
