//! Rate conversion between the emulation core and the audio device
//!
//! [`AudioResampler`] sits on the emulation thread. The core announces its rate
//! through [`AudioComponent::set_rate`] and hands over each frame's worth of
//! audio through [`AudioComponent::mix`]; the resampler converts it to the device
//! rate and pushes the bytes into the shared [`RingBuffer`].

pub mod converter;

pub use converter::{Quality, RateConverter, MAX_RATE_HZ};

use crate::logger::Logger;
use crate::streaming::{RingBuffer, BYTES_PER_FRAME};
use crate::{AudioError, Result};
use std::sync::Arc;

/// Input frames the output scratch is sized for up front
///
/// A 50 Hz core at 96 kHz produces 1920 frames per video frame; chunks larger
/// than this make `mix` grow the scratch once.
pub const RESERVED_INPUT_FRAMES: usize = 4096;

/// Audio sink seen by an emulation core
pub trait AudioComponent {
    /// Declare the rate of the audio that subsequent `mix` calls deliver
    ///
    /// Returns `false` if the rate cannot be handled.
    fn set_rate(&mut self, rate: f64) -> bool;

    /// Deliver interleaved stereo 16-bit frames at the declared rate
    fn mix(&mut self, samples: &[i16]);
}

/// Converts core audio to the device rate and feeds the shared FIFO
///
/// The FIFO is shared with the device callback through an `Arc`; the resampler
/// only ever writes to it. The conversion engine is owned exclusively and
/// touched only from the thread that calls `set_rate`/`mix`, so it needs no lock.
pub struct AudioResampler {
    logger: Box<dyn Logger>,
    target_rate: u32,
    quality: Quality,
    converter: Option<RateConverter>,
    /// Converted interleaved samples for the current `mix`
    scratch: Vec<i16>,
    sink: Arc<RingBuffer>,
}

impl std::fmt::Debug for AudioResampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioResampler")
            .field("target_rate", &self.target_rate)
            .field("quality", &self.quality)
            .field("converter", &self.converter)
            .field("sink_capacity", &self.sink.capacity())
            .finish_non_exhaustive()
    }
}

impl AudioResampler {
    /// Create a resampler targeting `target_rate` Hz with the default quality
    ///
    /// No conversion happens until the core's rate is known through `set_rate`.
    ///
    /// # Errors
    ///
    /// [`AudioError::ConfigError`] if `target_rate` is 0 or above [`MAX_RATE_HZ`].
    pub fn new(logger: Box<dyn Logger>, target_rate: u32, sink: Arc<RingBuffer>) -> Result<Self> {
        Self::with_quality(logger, target_rate, sink, Quality::default())
    }

    /// Create a resampler with an explicit interpolation quality
    ///
    /// The FIFO should hold a whole number of frames; see
    /// [`StreamConfig::validate`](crate::StreamConfig::validate).
    pub fn with_quality(
        logger: Box<dyn Logger>,
        target_rate: u32,
        sink: Arc<RingBuffer>,
        quality: Quality,
    ) -> Result<Self> {
        if target_rate == 0 || target_rate as f64 > MAX_RATE_HZ {
            return Err(AudioError::ConfigError(format!(
                "Invalid output sample rate: {target_rate} Hz"
            )));
        }

        if sink.capacity() % BYTES_PER_FRAME != 0 {
            tracing::warn!(
                capacity = sink.capacity(),
                "FIFO size is not a whole number of frames, overflow can split a frame"
            );
        }

        Ok(AudioResampler {
            logger,
            target_rate,
            quality,
            converter: None,
            scratch: Vec::new(),
            sink,
        })
    }

    /// Device rate in Hz
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Core rate of the current engine, if one is configured
    pub fn source_rate(&self) -> Option<f64> {
        self.converter.as_ref().map(RateConverter::source_rate)
    }

    /// Interpolation quality fixed at construction
    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Whether `mix` currently converts audio (false until a successful `set_rate`)
    pub fn is_ready(&self) -> bool {
        self.converter.is_some()
    }

    /// The FIFO this resampler writes into
    pub fn sink(&self) -> &Arc<RingBuffer> {
        &self.sink
    }

    /// Drop the engine's history and phase without changing the rate pair
    pub fn reset(&mut self) {
        if let Some(converter) = self.converter.as_mut() {
            converter.reset();
        }
    }
}

impl AudioComponent for AudioResampler {
    /// Rebuild the conversion engine for `rate` → target rate
    ///
    /// The old engine is only replaced once the new one has been built. If the
    /// rate is rejected the error goes to the logger and the resampler is left
    /// without an engine: `mix` drops audio until a later call succeeds.
    fn set_rate(&mut self, rate: f64) -> bool {
        match RateConverter::new(rate, self.target_rate, self.quality) {
            Ok(converter) => {
                let samples = converter.max_output_frames(RESERVED_INPUT_FRAMES) * 2;
                self.scratch.clear();
                self.scratch.reserve(samples);

                tracing::debug!(
                    source_rate = rate,
                    target_rate = self.target_rate,
                    quality = ?self.quality,
                    "resampler configured"
                );
                self.converter = Some(converter);
                true
            }
            Err(e) => {
                self.converter = None;
                self.logger
                    .error(&format!("Error initializing resampler: {e}"));
                false
            }
        }
    }

    /// Convert `samples` and push the result into the FIFO with a single write
    fn mix(&mut self, samples: &[i16]) {
        let Some(converter) = self.converter.as_mut() else {
            tracing::trace!(
                samples = samples.len(),
                "no resampler configured, dropping audio"
            );
            return;
        };

        self.scratch.clear();
        if let Err(e) = converter.process(samples, &mut self.scratch) {
            tracing::warn!(error = %e, "resampling failed, dropping the rest of the chunk");
        }
        if !self.scratch.is_empty() {
            self.sink.write(bytemuck::cast_slice(&self.scratch[..]));
        }
    }
}
