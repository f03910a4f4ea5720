//! Decoded audio data container.

use std::sync::Arc;
use std::time::Duration;

/// Container for decoded audio with reference-counted sharing.
///
/// Decoded buffers are shared only through the resolver cache: every emitter
/// voice that references the same raw audio entry holds a clone of the same
/// `Arc`, never a duplicate decode.
///
/// Samples are stored in interleaved format (`[L0, R0, L1, R1, ...]`), which
/// is what decoders produce and what playback backends expect.
#[derive(Debug, Clone)]
pub struct ResonaAudioData {
    inner: Arc<AudioDataInner>,
}

#[derive(Debug)]
struct AudioDataInner {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
    total_frames: usize,
}

impl ResonaAudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let total_frames = if channels == 0 {
            0
        } else {
            samples.len() / channels as usize
        };
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(total_frames as f64 / sample_rate as f64)
        };
        Self {
            inner: Arc::new(AudioDataInner {
                samples,
                sample_rate,
                channels,
                duration,
                total_frames,
            }),
        }
    }

    /// A silent handle for sources that reference no raw audio data.
    /// Playing a voice backed by empty data is a no-op.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.samples.len()
    }
}
