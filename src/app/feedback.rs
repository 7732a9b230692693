use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::debug;

use crate::domain::{EngineEvent, Severity};
use crate::ports::HapticDevice;

/// Interval between haptic pulses during playback.
const HAPTIC_INTERVAL: Duration = Duration::from_millis(250);

/// Number of volume-decay steps across a sound's duration.
const VOLUME_STEPS: u32 = 20;

/// Shared volume-level cell: written by the decay loop, read for snapshots.
/// Raw f32 bits in an atomic; single writer at a time.
#[derive(Debug)]
pub struct VolumeCell(AtomicU32);

impl VolumeCell {
    pub fn new(level: f32) -> Self {
        Self(AtomicU32::new(level.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, level: f32) {
        self.0.store(level.to_bits(), Ordering::Relaxed);
    }
}

/// Cancellable haptic and volume-decay loops tied to one playback session.
///
/// Both loops snapshot severity at start; severity changes mid-playback only
/// affect future sessions. Cancellation is cooperative: the loops observe
/// the token at each timed wait and stop mutating once they see it.
pub struct FeedbackScheduler {
    cancel: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl FeedbackScheduler {
    /// Spawn both loops. Returns immediately; neither loop blocks the
    /// caller.
    pub fn start(
        duration: Duration,
        severity: Severity,
        haptics: Arc<dyn HapticDevice>,
        volume: Arc<VolumeCell>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let (cancel, _) = watch::channel(false);

        let haptic_task = tokio::spawn(haptic_loop(
            duration,
            severity,
            haptics,
            cancel.subscribe(),
        ));
        let volume_task = tokio::spawn(volume_loop(duration, volume, events, cancel.subscribe()));

        Self {
            cancel,
            tasks: vec![haptic_task, volume_task],
        }
    }

    /// Cancel both loops. Idempotent.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Whether both loops have run to completion or cancellation.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|task| task.is_finished())
    }
}

impl Drop for FeedbackScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// One strong impulse up front, then a soft pulse every 0.25 s until the
/// sound ends. Intensity fades with severity: the haptic channel mirrors how
/// much of the sound the simulated listener still gets.
async fn haptic_loop(
    duration: Duration,
    severity: Severity,
    haptics: Arc<dyn HapticDevice>,
    mut cancel: watch::Receiver<bool>,
) {
    haptics.impact((1.0 - severity.level()).max(0.1));

    let pulse_intensity = (0.5 * (1.0 - severity.level())).max(0.0);
    let interval_secs = HAPTIC_INTERVAL.as_secs_f32();
    let duration_secs = duration.as_secs_f32();
    let iterations = (duration_secs / interval_secs) as u32 + 1;

    let mut elapsed = 0.0f32;
    for _ in 0..iterations {
        if *cancel.borrow() {
            break;
        }
        elapsed += interval_secs;
        if elapsed >= duration_secs {
            break;
        }
        haptics.impact(pulse_intensity);
        tokio::select! {
            _ = cancel.changed() => break,
            _ = time::sleep(HAPTIC_INTERVAL) => {}
        }
    }
    debug!("Haptic loop finished");
}

/// Walk the published volume level from 1.0 down to exactly 0 in 20 equal
/// steps across the sound's duration.
async fn volume_loop(
    duration: Duration,
    volume: Arc<VolumeCell>,
    events: broadcast::Sender<EngineEvent>,
    mut cancel: watch::Receiver<bool>,
) {
    let step = duration / VOLUME_STEPS;
    for k in 1..=VOLUME_STEPS {
        tokio::select! {
            _ = cancel.changed() => return,
            _ = time::sleep(step) => {}
        }
        if *cancel.borrow() {
            return;
        }
        let level = 1.0 - k as f32 / VOLUME_STEPS as f32;
        volume.store(level);
        let _ = events.send(EngineEvent::VolumeLevel { level });
    }
    debug!("Volume decay finished");
}
