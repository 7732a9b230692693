use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{CpalAudioOutput, LogHaptics, LogSpeech, TomlConfigStore};
use crate::app::captions::CaptionSpeaker;
use crate::app::feedback::{FeedbackScheduler, VolumeCell};
use crate::domain::{
    synthesis, AtomicSeverity, EngineConfig, EngineEvent, EngineSnapshot, FilterState,
    PlaybackState, Severity, SoundSpec,
};
use crate::infrastructure::{init_logging, LogSink};
use crate::ports::{
    AudioOutput, ConfigStore, HapticDevice, OutputEvent, SourceSlot, SpeechSynthesizer,
};

/// Frequency and period of the looping alarm beep.
const ALARM_LOOP_HZ: f32 = 900.0;
const ALARM_LOOP_SECS: f32 = 0.5;

/// One active playback session: the sound name plus its feedback loops.
struct ActiveSession {
    sound: String,
    scheduler: FeedbackScheduler,
}

/// The engine's public surface: a state machine orchestrating synthesis,
/// playback, feedback loops and caption speech.
///
/// At most one playback session is active at a time. Calling `play_sound`
/// while a session is active stops it instead of switching sounds; the
/// second invocation is a toggle control. All failures are absorbed and
/// logged: the engine degrades to silence rather than surfacing errors.
///
/// Must be constructed inside a tokio runtime; a background task routes
/// output completion events back into the state machine.
pub struct HearingSimulator {
    output: Arc<dyn AudioOutput>,
    haptics: Arc<dyn HapticDevice>,
    captions: CaptionSpeaker,
    severity: AtomicSeverity,
    session: Mutex<Option<ActiveSession>>,
    volume: Arc<VolumeCell>,
    events: broadcast::Sender<EngineEvent>,
    _log_guard: Option<WorkerGuard>,
}

impl HearingSimulator {
    /// Wire the engine to its collaborators.
    pub fn new(
        output: Arc<dyn AudioOutput>,
        haptics: Arc<dyn HapticDevice>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Arc<Self> {
        Self::assemble(output, haptics, speech, None)
    }

    /// Build a fully wired engine: configuration from disk, logging, cpal
    /// output, log-backed haptics and speech. Setup failures degrade to a
    /// silent engine rather than failing construction.
    pub fn with_defaults() -> Arc<Self> {
        let store = TomlConfigStore::new().ok();
        let config = store
            .as_ref()
            .and_then(|s| s.load().ok())
            .unwrap_or_else(EngineConfig::default);
        let log_guard = store.as_ref().and_then(|s| {
            let sink = LogSink::from_config(&config.logging, &s.logs_dir());
            init_logging(sink, &config.logging.level).ok().flatten()
        });

        info!("Hearing simulator starting");
        let output: Arc<dyn AudioOutput> =
            Arc::new(CpalAudioOutput::with_config(config.output.clone()));
        Self::assemble(
            output,
            Arc::new(LogHaptics::new()),
            Arc::new(LogSpeech::new()),
            log_guard,
        )
    }

    fn assemble(
        output: Arc<dyn AudioOutput>,
        haptics: Arc<dyn HapticDevice>,
        speech: Arc<dyn SpeechSynthesizer>,
        log_guard: Option<WorkerGuard>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let simulator = Arc::new(Self {
            output,
            haptics,
            captions: CaptionSpeaker::new(speech),
            severity: AtomicSeverity::default(),
            session: Mutex::new(None),
            volume: Arc::new(VolumeCell::new(0.0)),
            events,
            _log_guard: log_guard,
        });

        let weak = Arc::downgrade(&simulator);
        let mut output_events = simulator.output.subscribe();
        tokio::spawn(async move {
            loop {
                match output_events.recv().await {
                    Ok(OutputEvent::Completed {
                        slot: SourceSlot::Scenario,
                    }) => {
                        let Some(simulator) = weak.upgrade() else { break };
                        debug!("Scenario buffer played to completion");
                        simulator.stop_playback();
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        simulator
    }

    /// Set the simulated severity. Reconfigures the shared low-pass filter
    /// immediately; feedback loops already in flight keep the severity they
    /// started with.
    pub fn set_severity(&self, level: f32) {
        let severity = Severity::new(level);
        self.severity.store(severity);

        let filter = FilterState::for_severity(severity);
        self.output.set_filter(filter);

        info!(
            level = severity.level(),
            cutoff_hz = filter.cutoff_hz,
            gain = filter.gain,
            "Severity updated"
        );
        let _ = self.events.send(EngineEvent::SeverityChanged {
            severity: severity.level(),
            cutoff_hz: filter.cutoff_hz,
            gain: filter.gain,
        });
    }

    pub fn severity(&self) -> Severity {
        self.severity.load()
    }

    /// Play a named scenario sound.
    ///
    /// While a session is active this stops the current sound and does not
    /// start the new one. Synthesis or device failures leave the controller
    /// Idle with nothing started.
    pub async fn play_sound(&self, name: &str) {
        if self.state().is_playing() {
            info!(sound = name, "Play request while playing, stopping current sound");
            self.stop_playback();
            return;
        }

        let spec = SoundSpec::for_name(name);
        let buffer = match spec.render() {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(sound = name, error = %e, "Buffer generation failed, play request dropped");
                return;
            }
        };

        if let Err(e) = self
            .output
            .schedule(SourceSlot::Scenario, buffer, false)
            .await
        {
            warn!(sound = name, error = %e, "Audio output rejected buffer, play request dropped");
            return;
        }

        self.volume.store(1.0);
        let scheduler = FeedbackScheduler::start(
            Duration::from_secs_f32(spec.duration_secs),
            self.severity.load(),
            Arc::clone(&self.haptics),
            Arc::clone(&self.volume),
            self.events.clone(),
        );
        *self.session.lock() = Some(ActiveSession {
            sound: name.to_string(),
            scheduler,
        });

        info!(
            sound = name,
            duration_secs = spec.duration_secs,
            "Playback started"
        );
        self.publish_snapshot();
    }

    /// Stop the active session, if any. Idempotent; a stop with nothing
    /// playing is a harmless no-op.
    pub fn stop_playback(&self) {
        let ended = self.session.lock().take();

        self.output.stop(SourceSlot::Scenario);
        self.volume.store(0.0);

        if let Some(session) = ended {
            session.scheduler.cancel();
            info!(sound = %session.sound, "Playback stopped");
            self.publish_snapshot();
        }
    }

    /// Narrate caption text, modulated by the current severity.
    pub async fn speak(&self, text: &str, speaker_id: &str) {
        self.captions
            .speak(text, speaker_id, self.severity.load())
            .await;
    }

    /// Cut off caption speech. No-op when idle.
    pub fn stop_speech(&self) {
        self.captions.stop();
    }

    /// Start the looping alarm beep on the dedicated loop slot, independent
    /// of the scenario session.
    pub async fn start_alarm_loop(&self) {
        let buffer = match synthesis::generate_tone(ALARM_LOOP_HZ, ALARM_LOOP_SECS) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(error = %e, "Alarm loop synthesis failed");
                return;
            }
        };
        if let Err(e) = self.output.schedule(SourceSlot::Loop, buffer, true).await {
            warn!(error = %e, "Audio output rejected alarm loop");
        }
    }

    pub fn stop_alarm_loop(&self) {
        self.output.stop(SourceSlot::Loop);
    }

    /// Stop everything: scenario playback, alarm loop and caption speech.
    pub fn stop_all(&self) {
        self.stop_playback();
        self.stop_alarm_loop();
        self.stop_speech();
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.session
            .lock()
            .as_ref()
            .map(|s| PlaybackState::Playing(s.sound.clone()))
            .unwrap_or(PlaybackState::Idle)
    }

    /// Current observable state for visualization.
    pub fn snapshot(&self) -> EngineSnapshot {
        let session = self.session.lock();
        EngineSnapshot {
            is_playing: session.is_some(),
            current_sound: session.as_ref().map(|s| s.sound.clone()),
            volume_level: self.volume.load(),
            severity: self.severity.load().level(),
        }
    }

    /// Subscribe to engine events: state snapshots, volume steps, severity
    /// changes.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn publish_snapshot(&self) {
        let _ = self.events.send(EngineEvent::StateChanged {
            snapshot: self.snapshot(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use crate::domain::{AudioBuffer, EngineError};
    use crate::ports::Utterance;

    struct MockOutput {
        events: broadcast::Sender<OutputEvent>,
        scheduled: Mutex<Vec<(SourceSlot, usize, bool)>>,
        stops: Mutex<Vec<SourceSlot>>,
        filters: Mutex<Vec<FilterState>>,
        fail: AtomicBool,
    }

    impl MockOutput {
        fn new() -> Arc<Self> {
            let (events, _) = broadcast::channel(16);
            Arc::new(Self {
                events,
                scheduled: Mutex::new(Vec::new()),
                stops: Mutex::new(Vec::new()),
                filters: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            })
        }

        fn complete(&self, slot: SourceSlot) {
            let _ = self.events.send(OutputEvent::Completed { slot });
        }
    }

    #[async_trait]
    impl AudioOutput for MockOutput {
        async fn schedule(
            &self,
            slot: SourceSlot,
            buffer: AudioBuffer,
            looping: bool,
        ) -> Result<(), EngineError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(EngineError::OutputUnavailable);
            }
            self.scheduled.lock().push((slot, buffer.len(), looping));
            Ok(())
        }

        fn stop(&self, slot: SourceSlot) {
            self.stops.lock().push(slot);
        }

        fn set_filter(&self, state: FilterState) {
            self.filters.lock().push(state);
        }

        fn set_bypass(&self, _bypass: bool) {}

        fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
            self.events.subscribe()
        }
    }

    struct NullSpeech;

    #[async_trait]
    impl SpeechSynthesizer for NullSpeech {
        async fn speak(&self, _utterance: Utterance) -> Result<(), EngineError> {
            Ok(())
        }
        fn stop(&self, _immediate: bool) {}
        fn is_speaking(&self) -> bool {
            false
        }
    }

    struct NullHaptics;

    impl HapticDevice for NullHaptics {
        fn impact(&self, _intensity: f32) {}
    }

    fn simulator_with(output: Arc<MockOutput>) -> Arc<HearingSimulator> {
        HearingSimulator::new(
            output as Arc<dyn AudioOutput>,
            Arc::new(NullHaptics),
            Arc::new(NullSpeech),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_enters_playing_state() {
        let output = MockOutput::new();
        let simulator = simulator_with(Arc::clone(&output));

        simulator.play_sound("notification").await;

        assert_eq!(
            simulator.state(),
            PlaybackState::Playing("notification".to_string())
        );
        let snapshot = simulator.snapshot();
        assert!(snapshot.is_playing);
        assert_eq!(snapshot.current_sound.as_deref(), Some("notification"));
        assert_eq!(snapshot.volume_level, 1.0);

        let scheduled = output.scheduled.lock();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0], (SourceSlot::Scenario, 26_460, false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_play_toggles_to_idle() {
        let output = MockOutput::new();
        let simulator = simulator_with(Arc::clone(&output));

        simulator.play_sound("alarm").await;
        assert!(simulator.state().is_playing());

        simulator.play_sound("notification").await;
        assert_eq!(simulator.state(), PlaybackState::Idle);

        // The second call stopped the first sound; "notification" never
        // reached the device.
        assert_eq!(output.scheduled.lock().len(), 1);
        assert_eq!(output.scheduled.lock()[0].0, SourceSlot::Scenario);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_stop_is_idempotent() {
        let output = MockOutput::new();
        let simulator = simulator_with(output);

        simulator.stop_playback();
        simulator.stop_playback();
        assert_eq!(simulator.state(), PlaybackState::Idle);
        assert_eq!(simulator.snapshot().volume_level, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_returns_to_idle() {
        let output = MockOutput::new();
        let simulator = simulator_with(Arc::clone(&output));

        simulator.play_sound("notification").await;
        assert!(simulator.state().is_playing());

        output.complete(SourceSlot::Scenario);
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        assert_eq!(simulator.state(), PlaybackState::Idle);
        assert_eq!(simulator.snapshot().volume_level, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_failure_leaves_idle() {
        let output = MockOutput::new();
        output.fail.store(true, Ordering::SeqCst);
        let simulator = simulator_with(Arc::clone(&output));

        simulator.play_sound("voice").await;

        assert_eq!(simulator.state(), PlaybackState::Idle);
        assert_eq!(simulator.snapshot().volume_level, 0.0);
        assert!(output.scheduled.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_severity_reconfigures_filter() {
        let output = MockOutput::new();
        let simulator = simulator_with(Arc::clone(&output));

        simulator.set_severity(0.5);

        let filters = output.filters.lock();
        let state = filters.last().unwrap();
        assert!((state.cutoff_hz - 4_000.0).abs() < 200.0);
        assert!((state.gain - 0.625).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_severity_clamps() {
        let output = MockOutput::new();
        let simulator = simulator_with(output);

        simulator.set_severity(2.5);
        assert_eq!(simulator.severity().level(), 1.0);

        simulator.set_severity(-1.0);
        assert_eq!(simulator.severity().level(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_loop_uses_loop_slot() {
        let output = MockOutput::new();
        let simulator = simulator_with(Arc::clone(&output));

        simulator.start_alarm_loop().await;
        {
            let scheduled = output.scheduled.lock();
            assert_eq!(scheduled.len(), 1);
            let (slot, len, looping) = scheduled[0];
            assert_eq!(slot, SourceSlot::Loop);
            assert_eq!(len, 22_050); // 0.5 s at 44.1 kHz
            assert!(looping);
        }

        simulator.stop_alarm_loop();
        assert_eq!(output.stops.lock().as_slice(), &[SourceSlot::Loop]);

        // The alarm loop never touches the scenario session.
        assert_eq!(simulator.state(), PlaybackState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_silences_everything() {
        let output = MockOutput::new();
        let simulator = simulator_with(Arc::clone(&output));

        simulator.play_sound("alarm").await;
        simulator.start_alarm_loop().await;
        simulator.stop_all();

        assert_eq!(simulator.state(), PlaybackState::Idle);
        let stops = output.stops.lock();
        assert!(stops.contains(&SourceSlot::Scenario));
        assert!(stops.contains(&SourceSlot::Loop));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_changes_are_published() {
        let output = MockOutput::new();
        let simulator = simulator_with(Arc::clone(&output));
        let mut events = simulator.subscribe();

        simulator.play_sound("voice").await;
        match events.try_recv() {
            Ok(EngineEvent::StateChanged { snapshot }) => {
                assert!(snapshot.is_playing);
                assert_eq!(snapshot.current_sound.as_deref(), Some("voice"));
            }
            other => panic!("expected StateChanged, got {:?}", other),
        }

        simulator.stop_playback();
        match events.try_recv() {
            Ok(EngineEvent::StateChanged { snapshot }) => {
                assert!(!snapshot.is_playing);
                assert_eq!(snapshot.current_sound, None);
                assert_eq!(snapshot.volume_level, 0.0);
            }
            other => panic!("expected StateChanged, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_moderate_loss() {
        let output = MockOutput::new();
        let simulator = simulator_with(Arc::clone(&output));

        simulator.set_severity(0.5);
        {
            let filters = output.filters.lock();
            let state = filters.last().unwrap();
            assert!((state.cutoff_hz - 4_000.0).abs() < 200.0);
            assert!((state.gain - 0.625).abs() < 1e-6);
        }

        simulator.play_sound("notification").await;
        assert_eq!(output.scheduled.lock()[0].1, 26_460);
        assert_eq!(
            simulator.state(),
            PlaybackState::Playing("notification".to_string())
        );

        // Let the 0.6 s decay loop run out, then complete the buffer.
        tokio::time::sleep(Duration::from_millis(700)).await;
        tokio::task::yield_now().await;
        assert_eq!(simulator.snapshot().volume_level, 0.0);

        output.complete(SourceSlot::Scenario);
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(simulator.state(), PlaybackState::Idle);
        assert_eq!(simulator.snapshot().volume_level, 0.0);
    }
}
