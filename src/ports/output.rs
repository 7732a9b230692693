use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::{AudioBuffer, EngineError, FilterState};

/// The two source slots feeding the shared mixer and low-pass filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceSlot {
    /// One-shot scenario sounds.
    Scenario,
    /// Looping background beep.
    Loop,
}

/// Events published by the output device.
#[derive(Debug, Clone, Serialize)]
pub enum OutputEvent {
    /// A non-looping buffer on `slot` played to completion.
    Completed { slot: SourceSlot },
}

/// Port for the audio output device.
///
/// Implementations own the routing topology: two source slots -> mixer ->
/// low-pass filter -> master gain -> hardware. Scheduling a buffer starts
/// playback immediately; completion of a non-looping buffer is reported on
/// the event channel.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Schedule a buffer on a slot and start playing it.
    ///
    /// Ownership of the buffer transfers to the device; whatever the slot
    /// was playing is replaced. Fails softly when no device is available.
    async fn schedule(
        &self,
        slot: SourceSlot,
        buffer: AudioBuffer,
        looping: bool,
    ) -> Result<(), EngineError>;

    /// Silence a slot. No-op when the slot is already silent.
    fn stop(&self, slot: SourceSlot);

    /// Publish new filter parameters (cutoff + master gain) to the render
    /// path.
    fn set_filter(&self, state: FilterState);

    /// Bypass or re-enable the low-pass filter.
    fn set_bypass(&self, bypass: bool);

    /// Subscribe to completion events.
    fn subscribe(&self) -> broadcast::Receiver<OutputEvent>;
}
