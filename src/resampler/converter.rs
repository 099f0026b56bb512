//! Rate-pair-specific conversion engine
//!
//! Wraps a fixed-input [`rubato`] resampler. Interleaved frames are split into
//! per-channel buffers and handed to the engine one chunk at a time; a chunk
//! that is only partly filled when a call ends is carried into the next call.
//! The fractional position between input frames lives inside the engine, so
//! chunk sizes coming from the core never need to divide evenly into the ratio.
//!
//! A new engine is fed a run of silence before it sees real audio. That fills
//! its look-ahead, so from the first real call on `n` input frames yield
//! `n × ratio` output frames, give or take one.

use crate::streaming::CHANNELS;
use crate::{AudioError, Result};
use rubato::{
    FastFixedIn, PolynomialDegree, ResampleResult, Resampler, ResamplerConstructionError,
    SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use serde::{Deserialize, Serialize};

/// Highest source or target rate accepted (Hz)
pub const MAX_RATE_HZ: f64 = 2_000_000.0;

/// Input frames per engine call
///
/// One frame keeps the output of every `process` call within a frame of its
/// input duration.
const CHUNK_FRAMES: usize = 1;

/// Silent frames fed beyond the engine's reported delay when priming
const PRIME_SLACK_FRAMES: usize = 32;

/// The ratio is fixed for the engine's lifetime
const MAX_RELATIVE_RATIO: f64 = 1.0;

const SAMPLE_SCALE: f32 = 32_768.0;

/// Interpolation used between input frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Two-point linear interpolation
    Linear,
    /// Cubic polynomial interpolation
    #[default]
    Cubic,
    /// Band-limited windowed sinc interpolation
    Sinc,
}

/// The rubato engine behind a [`Quality`]
enum Engine {
    Polynomial(FastFixedIn<f32>),
    Sinc(SincFixedIn<f32>),
}

impl Engine {
    fn build(ratio: f64, quality: Quality) -> std::result::Result<Self, ResamplerConstructionError> {
        let channels = CHANNELS as usize;
        match quality {
            Quality::Linear => FastFixedIn::new(
                ratio,
                MAX_RELATIVE_RATIO,
                PolynomialDegree::Linear,
                CHUNK_FRAMES,
                channels,
            )
            .map(Engine::Polynomial),
            Quality::Cubic => FastFixedIn::new(
                ratio,
                MAX_RELATIVE_RATIO,
                PolynomialDegree::Cubic,
                CHUNK_FRAMES,
                channels,
            )
            .map(Engine::Polynomial),
            Quality::Sinc => {
                let params = SincInterpolationParameters {
                    sinc_len: 64,
                    f_cutoff: 0.925,
                    interpolation: SincInterpolationType::Linear,
                    oversampling_factor: 128,
                    window: WindowFunction::Blackman,
                };
                SincFixedIn::new(ratio, MAX_RELATIVE_RATIO, params, CHUNK_FRAMES, channels)
                    .or_else(|_| {
                        let simple_params = SincInterpolationParameters {
                            sinc_len: 32,
                            f_cutoff: 0.9,
                            interpolation: SincInterpolationType::Nearest,
                            oversampling_factor: 64,
                            window: WindowFunction::Hann,
                        };
                        SincFixedIn::new(
                            ratio,
                            MAX_RELATIVE_RATIO,
                            simple_params,
                            CHUNK_FRAMES,
                            channels,
                        )
                    })
                    .map(Engine::Sinc)
            }
        }
    }

    fn process(
        &mut self,
        input: &[Vec<f32>],
        output: &mut [Vec<f32>],
    ) -> ResampleResult<(usize, usize)> {
        match self {
            Engine::Polynomial(r) => r.process_into_buffer(input, output, None),
            Engine::Sinc(r) => r.process_into_buffer(input, output, None),
        }
    }

    fn input_frames_next(&self) -> usize {
        match self {
            Engine::Polynomial(r) => r.input_frames_next(),
            Engine::Sinc(r) => r.input_frames_next(),
        }
    }

    fn output_frames_max(&self) -> usize {
        match self {
            Engine::Polynomial(r) => r.output_frames_max(),
            Engine::Sinc(r) => r.output_frames_max(),
        }
    }

    fn output_delay(&self) -> usize {
        match self {
            Engine::Polynomial(r) => r.output_delay(),
            Engine::Sinc(r) => r.output_delay(),
        }
    }

    fn reset(&mut self) {
        match self {
            Engine::Polynomial(r) => r.reset(),
            Engine::Sinc(r) => r.reset(),
        }
    }
}

/// Streaming converter for interleaved stereo i16 frames
pub struct RateConverter {
    source_rate: f64,
    target_rate: u32,
    quality: Quality,
    engine: Engine,
    /// Deinterleaved input for the next engine call, one buffer per channel
    input: Vec<Vec<f32>>,
    /// Frames of `input` already filled
    pending: usize,
    /// Engine output, one buffer per channel
    output: Vec<Vec<f32>>,
}

impl std::fmt::Debug for RateConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateConverter")
            .field("source_rate", &self.source_rate)
            .field("target_rate", &self.target_rate)
            .field("quality", &self.quality)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

fn validate_rate(name: &str, rate: f64) -> Result<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(AudioError::UnsupportedRateConfiguration(format!(
            "{name} rate must be a positive number of Hz, got {rate}"
        )));
    }
    if rate > MAX_RATE_HZ {
        return Err(AudioError::UnsupportedRateConfiguration(format!(
            "{name} rate {rate} Hz exceeds the supported maximum of {MAX_RATE_HZ} Hz"
        )));
    }
    Ok(())
}

fn from_i16(sample: i16) -> f32 {
    sample as f32 / SAMPLE_SCALE
}

fn to_i16(sample: f32) -> i16 {
    (sample * SAMPLE_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

impl RateConverter {
    /// Build a converter for `source_rate` → `target_rate`
    ///
    /// # Errors
    ///
    /// [`AudioError::UnsupportedRateConfiguration`] if either rate is not finite,
    /// not positive, above [`MAX_RATE_HZ`], or the engine cannot be built for
    /// the pair.
    pub fn new(source_rate: f64, target_rate: u32, quality: Quality) -> Result<Self> {
        validate_rate("Source", source_rate)?;
        validate_rate("Target", target_rate as f64)?;

        let ratio = target_rate as f64 / source_rate;
        let engine = Engine::build(ratio, quality).map_err(|e| {
            AudioError::UnsupportedRateConfiguration(format!(
                "Cannot convert {source_rate} Hz to {target_rate} Hz: {e}"
            ))
        })?;

        let channels = CHANNELS as usize;
        let output_frames = engine.output_frames_max();
        let mut converter = RateConverter {
            source_rate,
            target_rate,
            quality,
            engine,
            input: vec![vec![0.0; CHUNK_FRAMES]; channels],
            pending: 0,
            output: vec![vec![0.0; output_frames]; channels],
        };
        converter.prime()?;
        Ok(converter)
    }

    /// Source rate in Hz
    pub fn source_rate(&self) -> f64 {
        self.source_rate
    }

    /// Target rate in Hz
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Interpolation in use
    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Output frames per input frame
    pub fn ratio(&self) -> f64 {
        self.target_rate as f64 / self.source_rate
    }

    /// Upper bound on the frames one call to [`process`](Self::process) produces
    /// for `input_frames` frames
    pub fn max_output_frames(&self, input_frames: usize) -> usize {
        (input_frames as f64 * self.ratio()).ceil() as usize + 2
    }

    /// Forget history and phase, as if freshly built
    pub fn reset(&mut self) {
        self.engine.reset();
        self.pending = 0;
        if let Err(e) = self.prime() {
            tracing::warn!(error = %e, "resampler priming failed after reset");
        }
    }

    /// Run silence through a fresh engine until its look-ahead is full
    fn prime(&mut self) -> Result<()> {
        let frames = (self.engine.output_delay() as f64 / self.ratio()).ceil() as usize
            + PRIME_SLACK_FRAMES;
        let mut discard = Vec::with_capacity(self.output[0].len() * 2);
        for _ in 0..frames {
            self.push_frame([0.0; 2], &mut discard).map_err(|e| {
                AudioError::UnsupportedRateConfiguration(format!("Resampler warm-up failed: {e}"))
            })?;
            discard.clear();
        }
        Ok(())
    }

    /// Queue one frame, running the engine once a chunk is complete
    fn push_frame(&mut self, frame: [f32; 2], out: &mut Vec<i16>) -> ResampleResult<usize> {
        for (channel, sample) in self.input.iter_mut().zip(frame) {
            channel[self.pending] = sample;
        }
        self.pending += 1;
        if self.pending < self.engine.input_frames_next() {
            return Ok(0);
        }
        self.pending = 0;

        let (_, produced) = self.engine.process(&self.input, &mut self.output)?;
        let [left, right] = [&self.output[0], &self.output[1]];
        for (&l, &r) in left[..produced].iter().zip(&right[..produced]) {
            out.push(to_i16(l));
            out.push(to_i16(r));
        }
        Ok(produced)
    }

    /// Convert one chunk of interleaved stereo frames, appending to `out`
    ///
    /// `input.len() / 2` frames are consumed; a trailing odd sample is ignored.
    /// Returns the number of frames appended. `out` only reallocates if it has
    /// less spare capacity than [`max_output_frames`](Self::max_output_frames)
    /// samples × 2.
    ///
    /// # Errors
    ///
    /// [`AudioError::Other`] if the engine rejects a chunk. Frames converted
    /// before the failure stay in `out`.
    pub fn process(&mut self, input: &[i16], out: &mut Vec<i16>) -> Result<usize> {
        let mut produced = 0;
        for frame in input.chunks_exact(2) {
            produced += self
                .push_frame([from_i16(frame[0]), from_i16(frame[1])], out)
                .map_err(|e| AudioError::Other(format!("Resampler failed: {e}")))?;
        }
        Ok(produced)
    }
}
