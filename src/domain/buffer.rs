/// Fixed engine sample rate. All synthesis runs at 44.1 kHz mono.
pub const SAMPLE_RATE: u32 = 44_100;

/// An owned mono PCM buffer.
///
/// Immutable once generated: produced by exactly one synthesizer call and
/// handed to the output device by value for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consume the buffer, transferring sample ownership to the output path.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_accessors() {
        let buffer = AudioBuffer::from_samples(vec![0.1, -0.2, 0.3], SAMPLE_RATE);
        assert_eq!(buffer.len(), 3);
        assert!(!buffer.is_empty());
        assert_eq!(buffer.sample_rate(), SAMPLE_RATE);
        assert_eq!(buffer.samples(), &[0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer::from_samples(vec![0.0; SAMPLE_RATE as usize], SAMPLE_RATE);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_into_samples_transfers_ownership() {
        let buffer = AudioBuffer::from_samples(vec![0.5; 4], SAMPLE_RATE);
        let samples = buffer.into_samples();
        assert_eq!(samples, vec![0.5; 4]);
    }
}
