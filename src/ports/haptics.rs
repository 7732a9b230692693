/// Port for discrete haptic impulses.
///
/// Impulses are fire-and-forget and must never block; implementations clamp
/// intensity to [0, 1].
pub trait HapticDevice: Send + Sync {
    fn impact(&self, intensity: f32);
}
