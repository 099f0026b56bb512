//! Streaming plumbing between the emulation thread and the audio device
//!
//! The [`RingBuffer`] is the only state shared between the two threads. The
//! emulation side feeds it through an [`AudioResampler`](crate::AudioResampler);
//! the device side drains it from its callback (see [`AudioDevice`] with the
//! `streaming` feature).

#[cfg(feature = "streaming")]
pub mod audio_device;
pub mod realtime;
pub mod ring_buffer;

#[cfg(feature = "streaming")]
pub use audio_device::AudioDevice;
pub use realtime::{PlaybackStats, RealtimeStream};
pub use ring_buffer::{OverflowPolicy, RingBuffer, RingBufferStats};

use crate::resampler::Quality;
use crate::{AudioError, Result};
use serde::{Deserialize, Serialize};

/// Default device sample rate (48 kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Channels carried through the FIFO (interleaved L, R)
pub const CHANNELS: u16 = 2;

/// Bytes per interleaved stereo 16-bit frame
pub const BYTES_PER_FRAME: usize = CHANNELS as usize * std::mem::size_of::<i16>();

/// Configuration for the audio path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Size of the ring buffer in bytes
    /// Larger buffers = more latency but less chance of underrun
    pub ring_buffer_size: usize,

    /// Device (target) sample rate in Hz
    pub sample_rate: u32,

    /// What the FIFO does with writes that do not fit
    pub overflow_policy: OverflowPolicy,

    /// Interpolation used by the resampler
    pub quality: Quality,
}

impl StreamConfig {
    /// Create a configuration with roughly `latency_ms` of buffering
    pub fn with_latency(sample_rate: u32, latency_ms: u32) -> Self {
        let frames = (sample_rate as u64 * latency_ms as u64).div_ceil(1000) as usize;
        StreamConfig {
            ring_buffer_size: frames.max(1) * BYTES_PER_FRAME,
            sample_rate,
            overflow_policy: OverflowPolicy::default(),
            quality: Quality::default(),
        }
    }

    /// Configuration optimized for low latency
    /// Buffer ≈ 64 ms
    pub fn low_latency(sample_rate: u32) -> Self {
        Self::with_latency(sample_rate, 64)
    }

    /// Configuration optimized for stability
    /// Buffer ≈ 250 ms
    pub fn stable(sample_rate: u32) -> Self {
        Self::with_latency(sample_rate, 250)
    }

    /// Parse a configuration from JSON; missing fields take the defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: StreamConfig = serde_json::from_str(json)
            .map_err(|e| AudioError::ConfigError(format!("Invalid stream config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the audio path cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(AudioError::ConfigError(
                "sample_rate must be greater than 0".into(),
            ));
        }
        if self.ring_buffer_size < BYTES_PER_FRAME {
            return Err(AudioError::ConfigError(format!(
                "ring_buffer_size must hold at least one frame ({BYTES_PER_FRAME} bytes)"
            )));
        }
        // Overflow discards `len - free` bytes, which is only frame-aligned when
        // the capacity is; otherwise the read cursor lands between L and R for good
        if self.ring_buffer_size % BYTES_PER_FRAME != 0 {
            return Err(AudioError::ConfigError(format!(
                "ring_buffer_size ({}) must be a multiple of {BYTES_PER_FRAME} bytes",
                self.ring_buffer_size
            )));
        }
        Ok(())
    }

    /// Buffered frames when the FIFO is full
    pub fn buffer_frames(&self) -> usize {
        self.ring_buffer_size / BYTES_PER_FRAME
    }

    /// Get latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        ((self.buffer_frames() as f32) / (self.sample_rate as f32)) * 1000.0
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::stable(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_stream_config_latency() {
        let config = StreamConfig::low_latency(48_000);
        assert_eq!(config.ring_buffer_size, 3072 * BYTES_PER_FRAME);
        assert_abs_diff_eq!(config.latency_ms(), 64.0, epsilon = 0.01);

        let config = StreamConfig::stable(44_100);
        assert_abs_diff_eq!(config.latency_ms(), 250.0, epsilon = 0.05);
    }

    #[test]
    fn test_buffer_is_frame_aligned() {
        let config = StreamConfig::with_latency(32_040, 17);
        assert_eq!(config.ring_buffer_size % BYTES_PER_FRAME, 0);
    }

    #[test]
    fn test_config_from_json() {
        let config = StreamConfig::from_json_str(
            r#"{ "sample_rate": 44100, "overflow_policy": "drop_newest", "quality": "linear" }"#,
        )
        .unwrap();

        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.overflow_policy, OverflowPolicy::DropNewest);
        assert_eq!(config.quality, Quality::Linear);
        assert_eq!(
            config.ring_buffer_size,
            StreamConfig::default().ring_buffer_size
        );
    }

    #[test]
    fn test_config_rejects_zero_rate() {
        let err = StreamConfig::from_json_str(r#"{ "sample_rate": 0 }"#).unwrap_err();
        assert!(matches!(err, AudioError::ConfigError(_)));
    }

    #[test]
    fn test_config_rejects_partial_frame_buffer() {
        let err = StreamConfig::from_json_str(r#"{ "sample_rate": 48000, "ring_buffer_size": 1002 }"#)
            .unwrap_err();
        assert!(matches!(err, AudioError::ConfigError(_)));

        let config =
            StreamConfig::from_json_str(r#"{ "sample_rate": 48000, "ring_buffer_size": 1000 }"#)
                .unwrap();
        assert_eq!(config.buffer_frames(), 250);
    }

    #[test]
    fn test_config_rejects_garbage() {
        assert!(StreamConfig::from_json_str("not json").is_err());
    }
}
