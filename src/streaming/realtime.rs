//! Ready-made producer side of the audio path
//!
//! Bundles a [`RingBuffer`] sized from a [`StreamConfig`] with the
//! [`AudioResampler`] that feeds it. The emulation loop drives it through
//! [`AudioComponent`]; the device side takes a clone of the buffer handle.

use super::{RingBuffer, StreamConfig, BYTES_PER_FRAME};
use crate::logger::Logger;
use crate::resampler::{AudioComponent, AudioResampler};
use crate::Result;
use std::sync::Arc;

/// Real-time audio stream (emulation-thread side)
#[derive(Debug)]
pub struct RealtimeStream {
    /// Ring buffer shared with the device callback
    buffer: Arc<RingBuffer>,
    resampler: AudioResampler,
    config: StreamConfig,
    /// Source frames handed to `mix`
    frames_mixed: u64,
}

/// Playback statistics for monitoring buffer health
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStats {
    /// Source frames delivered by the core
    pub frames_mixed: u64,
    /// Device reads that had to be padded with silence
    pub underrun_count: u64,
    /// Writes that lost data because the FIFO was full
    pub overflow_count: u64,
    /// Current buffer fill percentage
    pub fill_percentage: f32,
}

impl RealtimeStream {
    /// Create the FIFO and resampler described by `config`
    pub fn new(config: StreamConfig, logger: Box<dyn Logger>) -> Result<Self> {
        config.validate()?;

        let buffer = Arc::new(RingBuffer::with_policy(
            config.ring_buffer_size,
            config.overflow_policy,
        )?);
        let resampler = AudioResampler::with_quality(
            logger,
            config.sample_rate,
            Arc::clone(&buffer),
            config.quality,
        )?;

        Ok(RealtimeStream {
            buffer,
            resampler,
            config,
            frames_mixed: 0,
        })
    }

    /// Get a handle to the ring buffer for audio device integration
    pub fn get_buffer(&self) -> Arc<RingBuffer> {
        Arc::clone(&self.buffer)
    }

    /// The resampler feeding the buffer
    pub fn resampler(&self) -> &AudioResampler {
        &self.resampler
    }

    /// Get the stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Frames currently buffered for the device
    pub fn buffered_frames(&self) -> usize {
        self.buffer.occupied() / BYTES_PER_FRAME
    }

    /// Get buffer fill percentage (0.0 to 1.0)
    pub fn fill_percentage(&self) -> f32 {
        self.buffer.fill_percentage()
    }

    /// Get current playback statistics
    pub fn get_stats(&self) -> PlaybackStats {
        let fifo = self.buffer.stats();
        PlaybackStats {
            frames_mixed: self.frames_mixed,
            underrun_count: fifo.underrun_count,
            overflow_count: fifo.overflow_count,
            fill_percentage: self.buffer.fill_percentage(),
        }
    }

    /// Discard buffered audio and the resampler's history (e.g. after loading a state)
    pub fn flush(&mut self) {
        self.buffer.reset();
        self.resampler.reset();
    }

    /// Get buffer latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        self.config.latency_ms()
    }
}

impl AudioComponent for RealtimeStream {
    fn set_rate(&mut self, rate: f64) -> bool {
        self.resampler.set_rate(rate)
    }

    fn mix(&mut self, samples: &[i16]) {
        self.frames_mixed += (samples.len() / 2) as u64;
        self.resampler.mix(samples);
    }
}

impl Drop for RealtimeStream {
    fn drop(&mut self) {
        let stats = self.get_stats();
        tracing::info!(
            frames_mixed = stats.frames_mixed,
            underruns = stats.underrun_count,
            overflows = stats.overflow_count,
            "audio stream closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::OverflowPolicy;
    use crate::TracingLogger;

    fn stream(config: StreamConfig) -> RealtimeStream {
        RealtimeStream::new(config, Box::new(TracingLogger)).unwrap()
    }

    #[test]
    fn test_stream_uses_config() {
        let config = StreamConfig::low_latency(48_000);
        let rt = stream(config);
        assert_eq!(rt.get_buffer().capacity(), config.ring_buffer_size);
        assert_eq!(rt.resampler().target_rate(), 48_000);
        assert!(rt.latency_ms() > 60.0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = StreamConfig {
            sample_rate: 0,
            ..StreamConfig::default()
        };
        assert!(RealtimeStream::new(config, Box::new(TracingLogger)).is_err());
    }

    #[test]
    fn test_playback_stats() {
        let mut rt = stream(StreamConfig::with_latency(48_000, 10));
        assert!(rt.set_rate(48_000.0));

        rt.mix(&vec![0; 240 * 2]);
        assert!((239..=241).contains(&rt.buffered_frames()));

        let device = rt.get_buffer();
        let mut period = vec![0u8; 480 * BYTES_PER_FRAME];
        device.read(&mut period);

        let stats = rt.get_stats();
        assert_eq!(stats.frames_mixed, 240);
        assert_eq!(stats.underrun_count, 1);
        assert_eq!(stats.overflow_count, 0);
        assert_eq!(stats.fill_percentage, 0.0);
    }

    #[test]
    fn test_overflow_counted() {
        let config = StreamConfig {
            overflow_policy: OverflowPolicy::DropNewest,
            ..StreamConfig::with_latency(48_000, 10)
        };
        let mut rt = stream(config);
        assert!(rt.set_rate(48_000.0));

        // 10 ms holds 480 frames
        rt.mix(&vec![0; 1000 * 2]);
        let stats = rt.get_stats();
        assert_eq!(stats.overflow_count, 1);
        assert_eq!(rt.buffered_frames(), 480);
    }

    #[test]
    fn test_rejects_partial_frame_buffer() {
        let config = StreamConfig {
            ring_buffer_size: 1002,
            ..StreamConfig::default()
        };
        assert!(matches!(
            RealtimeStream::new(config, Box::new(TracingLogger)),
            Err(crate::AudioError::ConfigError(_))
        ));
    }

    #[test]
    fn test_overflow_keeps_channels_in_place() {
        let config = StreamConfig {
            ring_buffer_size: 1000,
            ..StreamConfig::default()
        };
        let mut rt = stream(config);
        assert!(rt.set_rate(48_000.0));

        let frames: Vec<i16> = [1000, -1000].repeat(200);
        rt.mix(&frames);
        rt.mix(&frames);
        assert_eq!(rt.buffered_frames(), 250);

        let mut bytes = vec![0u8; 1000];
        rt.get_buffer().read(&mut bytes);
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect();

        // Only the newest 250 frames survive, all well past the lead-in
        for frame in samples.chunks_exact(2) {
            assert_eq!(frame, &[1000, -1000]);
        }
    }

    #[test]
    fn test_flush() {
        let mut rt = stream(StreamConfig::default());
        assert!(rt.set_rate(44_100.0));
        rt.mix(&vec![100; 735 * 2]);
        assert!(rt.buffered_frames() > 0);

        rt.flush();
        assert_eq!(rt.buffered_frames(), 0);
        assert!(rt.resampler().is_ready());
    }
}
