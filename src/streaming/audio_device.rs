//! Audio device integration using rodio
//!
//! The device callback is the FIFO's consumer: rodio pulls samples from
//! [`RingBufferSource`] on its own thread, which refills from the ring buffer in
//! whole-frame batches. Missing data comes back as silence, so the stream never
//! stalls waiting for the emulation thread.

use super::{RingBuffer, BYTES_PER_FRAME, CHANNELS};
use crate::{AudioError, Result};
use rodio::{OutputStream, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Frames pulled from the FIFO per refill
const BATCH_FRAMES: usize = 512;

/// Audio source that reads interleaved i16 frames from the ring buffer
struct RingBufferSource {
    ring_buffer: Arc<RingBuffer>,
    sample_rate: u32,
    finished: Arc<AtomicBool>,
    /// Raw bytes of the current batch (reduces lock traffic)
    batch: Vec<u8>,
    /// Current sample position in the batch
    batch_pos: usize,
}

impl RingBufferSource {
    fn new(ring_buffer: Arc<RingBuffer>, sample_rate: u32, finished: Arc<AtomicBool>) -> Self {
        let batch_len = BATCH_FRAMES * BYTES_PER_FRAME;
        RingBufferSource {
            ring_buffer,
            sample_rate,
            finished,
            batch: vec![0u8; batch_len],
            batch_pos: batch_len / 2, // Start by reading new batch
        }
    }

    fn samples_in_batch(&self) -> usize {
        self.batch.len() / 2
    }
}

impl Source for RingBufferSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.samples_in_batch() - self.batch_pos)
    }

    fn channels(&self) -> u16 {
        CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for RingBufferSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }

        if self.batch_pos >= self.samples_in_batch() {
            // Whole frames only, so L/R never swap; underrun is zero-filled by the FIFO
            self.ring_buffer.read(&mut self.batch);
            self.batch_pos = 0;
        }

        let i = self.batch_pos * 2;
        self.batch_pos += 1;
        Some(i16::from_ne_bytes([self.batch[i], self.batch[i + 1]]))
    }
}

/// Audio playback device using rodio
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    /// Shared with the source; once set the source ends
    finished: Arc<AtomicBool>,
}

impl AudioDevice {
    /// Open the default output device and start draining `ring_buffer`
    ///
    /// # Arguments
    /// * `sample_rate` - Device rate in Hz; must match the resampler's target rate
    /// * `ring_buffer` - FIFO filled by the emulation thread
    pub fn new(sample_rate: u32, ring_buffer: Arc<RingBuffer>) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default().map_err(|e| {
            AudioError::AudioDeviceError(format!("Failed to create audio stream: {e}"))
        })?;

        let sink = Sink::try_new(&stream_handle).map_err(|e| {
            AudioError::AudioDeviceError(format!("Failed to create audio sink: {e}"))
        })?;

        let finished = Arc::new(AtomicBool::new(false));
        let source = RingBufferSource::new(ring_buffer, sample_rate, Arc::clone(&finished));
        sink.append(source);

        tracing::debug!(sample_rate, "audio device started");

        Ok(AudioDevice {
            _stream: stream,
            sink,
            finished,
        })
    }

    /// Pause playback
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume playback
    pub fn play(&self) {
        self.sink.play();
    }

    /// Whether the device is still pulling from the FIFO (false after [`finish`](Self::finish))
    pub fn is_running(&self) -> bool {
        !self.finished.load(Ordering::Relaxed)
    }

    /// Signal that no more samples will be produced
    /// Ends the source instead of playing silence forever
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.pause();
        self.finish();
    }
}
