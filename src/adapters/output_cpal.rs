use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::domain::config::OutputConfig;
use crate::domain::{AudioBuffer, EngineError, FilterState, SAMPLE_RATE};
use crate::ports::{AudioOutput, OutputEvent, SourceSlot};

/// Lock-free message ring from the control loop into the render callback.
type MessageProducer = ringbuf::HeapProd<VoiceMessage>;
type MessageConsumer = ringbuf::HeapCons<VoiceMessage>;

const SLOTS: [SourceSlot; 2] = [SourceSlot::Scenario, SourceSlot::Loop];

fn slot_index(slot: SourceSlot) -> usize {
    match slot {
        SourceSlot::Scenario => 0,
        SourceSlot::Loop => 1,
    }
}

/// Messages handed to the render callback. Sample ownership moves exactly
/// once, from the scheduling context into the callback.
enum VoiceMessage {
    Start {
        slot: SourceSlot,
        samples: Vec<f32>,
        looping: bool,
    },
    Stop {
        slot: SourceSlot,
    },
}

/// Commands sent to the output thread.
enum OutputCommand {
    Schedule {
        slot: SourceSlot,
        samples: Vec<f32>,
        looping: bool,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Stop {
        slot: SourceSlot,
    },
    Shutdown,
}

/// Filter parameters crossing from the control context to the render
/// callback. Single writer, raw f32 bits in atomics; the reader tolerates
/// whichever value was published most recently.
#[derive(Debug)]
struct FilterControls {
    cutoff_bits: AtomicU32,
    gain_bits: AtomicU32,
    bypass: AtomicBool,
}

impl FilterControls {
    fn new(state: FilterState) -> Self {
        Self {
            cutoff_bits: AtomicU32::new(state.cutoff_hz.to_bits()),
            gain_bits: AtomicU32::new(state.gain.to_bits()),
            bypass: AtomicBool::new(false),
        }
    }

    fn publish(&self, state: FilterState) {
        self.cutoff_bits
            .store(state.cutoff_hz.to_bits(), Ordering::Relaxed);
        self.gain_bits.store(state.gain.to_bits(), Ordering::Relaxed);
    }

    fn set_bypass(&self, bypass: bool) {
        self.bypass.store(bypass, Ordering::Relaxed);
    }

    fn cutoff_hz(&self) -> f32 {
        f32::from_bits(self.cutoff_bits.load(Ordering::Relaxed))
    }

    fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }

    fn bypassed(&self) -> bool {
        self.bypass.load(Ordering::Relaxed)
    }
}

/// One-pole low-pass section used by the render path.
#[derive(Debug, Default)]
struct OnePole {
    prev: f32,
}

impl OnePole {
    fn process(&mut self, input: f32, coeff: f32) -> f32 {
        self.prev += coeff * (input - self.prev);
        self.prev
    }
}

/// Smoothing coefficient for a one-pole low-pass at the given cutoff.
fn one_pole_coeff(cutoff_hz: f32, sample_rate: f32) -> f32 {
    1.0 - (-TAU * cutoff_hz / sample_rate).exp()
}

/// Per-slot playback state owned by the render callback.
#[derive(Default)]
struct Voice {
    samples: Vec<f32>,
    position: usize,
    looping: bool,
    active: bool,
    finished: bool,
}

impl Voice {
    fn start(&mut self, samples: Vec<f32>, looping: bool) {
        self.active = !samples.is_empty();
        self.samples = samples;
        self.position = 0;
        self.looping = looping;
        self.finished = false;
    }

    fn stop(&mut self) {
        self.active = false;
        self.position = 0;
    }

    fn next_sample(&mut self) -> f32 {
        if !self.active {
            return 0.0;
        }
        if self.position >= self.samples.len() {
            if self.looping {
                self.position = 0;
            } else {
                self.active = false;
                self.finished = true;
                return 0.0;
            }
        }
        let sample = self.samples[self.position];
        self.position += 1;
        sample
    }
}

/// The mixing and filtering core run inside the cpal callback:
/// two voices -> sum -> one-pole low-pass -> master gain.
struct Renderer {
    messages: MessageConsumer,
    voices: [Voice; 2],
    filter: Arc<FilterControls>,
    events: broadcast::Sender<OutputEvent>,
    sample_rate: f32,
    low_pass: OnePole,
    coeff: f32,
    gain: f32,
}

impl Renderer {
    fn new(
        messages: MessageConsumer,
        filter: Arc<FilterControls>,
        events: broadcast::Sender<OutputEvent>,
        sample_rate: f32,
    ) -> Self {
        let coeff = one_pole_coeff(filter.cutoff_hz(), sample_rate);
        let gain = filter.gain();
        Self {
            messages,
            voices: [Voice::default(), Voice::default()],
            filter,
            events,
            sample_rate,
            low_pass: OnePole::default(),
            coeff,
            gain,
        }
    }

    /// Apply pending messages and refresh filter parameters for this block.
    fn begin_block(&mut self) {
        while let Some(message) = self.messages.try_pop() {
            match message {
                VoiceMessage::Start {
                    slot,
                    samples,
                    looping,
                } => self.voices[slot_index(slot)].start(samples, looping),
                VoiceMessage::Stop { slot } => self.voices[slot_index(slot)].stop(),
            }
        }
        self.coeff = one_pole_coeff(self.filter.cutoff_hz(), self.sample_rate);
        self.gain = self.filter.gain();
    }

    fn next_sample(&mut self) -> f32 {
        let mixed = self.voices[0].next_sample() + self.voices[1].next_sample();
        let filtered = if self.filter.bypassed() {
            mixed
        } else {
            self.low_pass.process(mixed, self.coeff)
        };
        filtered * self.gain
    }

    /// Report voices that exhausted their buffer during this block.
    fn end_block(&mut self) {
        for (index, voice) in self.voices.iter_mut().enumerate() {
            if voice.finished {
                voice.finished = false;
                let _ = self.events.send(OutputEvent::Completed { slot: SLOTS[index] });
            }
        }
    }

    fn render_f32(&mut self, data: &mut [f32], channels: usize) {
        self.begin_block();
        for frame in data.chunks_mut(channels) {
            let sample = self.next_sample();
            for out in frame.iter_mut() {
                *out = sample;
            }
        }
        self.end_block();
    }

    fn render_i16(&mut self, data: &mut [i16], channels: usize) {
        self.begin_block();
        for frame in data.chunks_mut(channels) {
            let sample = (self.next_sample().clamp(-1.0, 1.0) * 32767.0) as i16;
            for out in frame.iter_mut() {
                *out = sample;
            }
        }
        self.end_block();
    }
}

/// Linear-interpolation resampler for buffers headed to a device whose rate
/// differs from the engine's 44.1 kHz.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = src_pos.fract() as f32;

        let sample = if src_idx + 1 < samples.len() {
            let s0 = samples[src_idx];
            let s1 = samples[src_idx + 1];
            s0 + (s1 - s0) * frac
        } else if src_idx < samples.len() {
            samples[src_idx]
        } else {
            0.0
        };
        output.push(sample);
    }
    output
}

fn get_output_device(selected: Option<&str>) -> Result<Device, EngineError> {
    let host = cpal::default_host();

    if let Some(name) = selected {
        let devices = host.output_devices().map_err(|e| EngineError::OutputDevice {
            message: format!("Failed to enumerate devices: {}", e),
        })?;

        for device in devices {
            if device.name().is_ok_and(|n| n == name) {
                return Ok(device);
            }
        }
        warn!(device = %name, "Selected output device not found, falling back to default");
    }

    host.default_output_device()
        .ok_or_else(|| EngineError::OutputDevice {
            message: "No default output device available".to_string(),
        })
}

/// Open the output stream and start it. Returns the stream plus the device
/// sample rate so schedule-time resampling can match it.
fn open_stream(
    config: &OutputConfig,
    filter: Arc<FilterControls>,
    events: broadcast::Sender<OutputEvent>,
    messages: MessageConsumer,
) -> Result<(Stream, u32), EngineError> {
    let device = get_output_device(config.device.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = device
        .default_output_config()
        .map_err(|e| EngineError::OutputDevice {
            message: format!("Failed to get default config: {}", e),
        })?;
    let sample_format = supported.sample_format();
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    let channels = stream_config.channels as usize;
    let device_rate = stream_config.sample_rate.0;
    let mut renderer = Renderer::new(messages, filter, events, device_rate as f32);

    debug!(
        device = %device_name,
        sample_rate = device_rate,
        channels,
        format = ?sample_format,
        "Opening output stream"
    );

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                renderer.render_f32(data, channels);
            },
            |err| error!(?err, "Audio output stream error"),
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                renderer.render_i16(data, channels);
            },
            |err| error!(?err, "Audio output stream error"),
            None,
        ),
        _ => {
            return Err(EngineError::OutputDevice {
                message: format!("Unsupported sample format: {:?}", sample_format),
            });
        }
    }
    .map_err(|e| EngineError::OutputDevice {
        message: format!("Failed to build stream: {}", e),
    })?;

    stream.play().map_err(|e| EngineError::OutputDevice {
        message: format!("Failed to start stream: {}", e),
    })?;

    info!(device = %device_name, sample_rate = device_rate, "Audio output running");
    Ok((stream, device_rate))
}

/// Output thread runner: owns the non-Send Stream and feeds the render ring.
fn output_thread_main(
    config: OutputConfig,
    filter: Arc<FilterControls>,
    events: broadcast::Sender<OutputEvent>,
    mut cmd_rx: mpsc::Receiver<OutputCommand>,
) {
    let ring = HeapRb::<VoiceMessage>::new(32);
    let (mut producer, consumer): (MessageProducer, MessageConsumer) = ring.split();

    // Setup failure degrades to a silent engine rather than tearing it down.
    let stream = match open_stream(&config, filter, events, consumer) {
        Ok(opened) => Some(opened),
        Err(e) => {
            warn!(error = %e, "Audio output unavailable, running silent");
            None
        }
    };
    let device_rate = stream.as_ref().map(|(_, rate)| *rate);

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            OutputCommand::Schedule {
                slot,
                samples,
                looping,
                reply,
            } => {
                let result = match device_rate {
                    None => Err(EngineError::OutputUnavailable),
                    Some(rate) => {
                        let samples = if rate == SAMPLE_RATE {
                            samples
                        } else {
                            resample(&samples, SAMPLE_RATE, rate)
                        };
                        producer
                            .try_push(VoiceMessage::Start {
                                slot,
                                samples,
                                looping,
                            })
                            .map_err(|_| EngineError::OutputDevice {
                                message: "Render message ring full".to_string(),
                            })
                    }
                };
                let _ = reply.send(result);
            }
            OutputCommand::Stop { slot } => {
                let _ = producer.try_push(VoiceMessage::Stop { slot });
            }
            OutputCommand::Shutdown => break,
        }
    }
    drop(stream);
    debug!("Audio output thread shutting down");
}

/// cpal-backed audio output.
///
/// A dedicated thread owns the non-Send cpal Stream; buffers and stop
/// requests reach the render callback through a lock-free SPSC ring, and
/// filter parameters cross through atomics. When no device can be opened the
/// adapter stays alive in a silent degraded mode: scheduling fails softly
/// and the caller treats the play request as a no-op.
pub struct CpalAudioOutput {
    filter: Arc<FilterControls>,
    events: broadcast::Sender<OutputEvent>,
    cmd_tx: mpsc::Sender<OutputCommand>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CpalAudioOutput {
    pub fn new() -> Self {
        Self::with_config(OutputConfig::default())
    }

    pub fn with_config(config: OutputConfig) -> Self {
        let filter = Arc::new(FilterControls::new(FilterState::OPEN));
        let (events, _) = broadcast::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let thread_filter = Arc::clone(&filter);
        let thread_events = events.clone();
        let thread_handle = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || output_thread_main(config, thread_filter, thread_events, cmd_rx))
            .map_err(|e| warn!(error = %e, "Failed to spawn audio output thread"))
            .ok();

        Self {
            filter,
            events,
            cmd_tx,
            thread_handle: Mutex::new(thread_handle),
        }
    }
}

impl Default for CpalAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CpalAudioOutput {
    fn drop(&mut self) {
        // Only join when the thread actually saw the shutdown command.
        if self.cmd_tx.try_send(OutputCommand::Shutdown).is_ok() {
            if let Some(handle) = self.thread_handle.lock().take() {
                let _ = handle.join();
            }
        }
    }
}

#[async_trait]
impl AudioOutput for CpalAudioOutput {
    async fn schedule(
        &self,
        slot: SourceSlot,
        buffer: AudioBuffer,
        looping: bool,
    ) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.cmd_tx
            .send(OutputCommand::Schedule {
                slot,
                samples: buffer.into_samples(),
                looping,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::OutputUnavailable)?;

        reply_rx.await.map_err(|_| EngineError::OutputUnavailable)?
    }

    fn stop(&self, slot: SourceSlot) {
        if self.cmd_tx.try_send(OutputCommand::Stop { slot }).is_err() {
            debug!(?slot, "Stop request dropped, output thread gone");
        }
    }

    fn set_filter(&self, state: FilterState) {
        self.filter.publish(state);
        debug!(
            cutoff_hz = state.cutoff_hz,
            gain = state.gain,
            "Filter reconfigured"
        );
    }

    fn set_bypass(&self, bypass: bool) {
        self.filter.set_bypass(bypass);
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }
}
