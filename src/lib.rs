//! Audio FIFO and streaming resampler for emulator frontends
//!
//! An emulation core produces interleaved stereo 16-bit PCM at whatever rate its
//! emulated hardware runs (32040.5 Hz, 44100 Hz, 48000 Hz, ...). The host audio
//! device plays at one fixed rate. This crate bridges the two:
//!
//! - [`RingBuffer`]: a fixed-capacity, mutex-guarded byte FIFO shared between the
//!   emulation thread (producer) and the device callback thread (consumer).
//!   Reads never block and zero-fill on underrun; writes never block and resolve
//!   overflow through an [`OverflowPolicy`].
//! - [`AudioResampler`]: converts each chunk of core audio from the core's rate to
//!   the device rate and writes the result into the shared [`RingBuffer`].
//!
//! # Crate feature flags
//! - `streaming` (opt-in): rodio-backed [`streaming::AudioDevice`] that drains the
//!   FIFO, plus the `emu-audio` demo binary
//!
//! # Quick start
//! ```no_run
//! use std::sync::Arc;
//! use emu_audio::{AudioComponent, AudioResampler, RingBuffer, TracingLogger};
//!
//! let fifo = Arc::new(RingBuffer::new(16 * 1024).unwrap());
//! let mut audio = AudioResampler::new(Box::new(TracingLogger), 48_000, Arc::clone(&fifo)).unwrap();
//! assert!(audio.set_rate(44_100.0));
//!
//! // Emulation thread, once per frame
//! let frame_audio = [0i16; 735 * 2];
//! audio.mix(&frame_audio);
//!
//! // Device callback thread
//! let mut device_buffer = [0u8; 4096];
//! fifo.read(&mut device_buffer);
//! ```

#![warn(missing_docs)]

pub mod export; // WAV capture
pub mod logger; // Logging collaborator
pub mod resampler; // Rate conversion
pub mod streaming; // FIFO & device plumbing

/// Error types for audio path operations
#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    /// Ring buffer storage could not be obtained
    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    /// The rate-conversion engine rejected the (source, target) rate pair
    #[error("Unsupported rate configuration: {0}")]
    UnsupportedRateConfiguration(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// IO error from filesystem or device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error writing a WAV capture
    #[error("WAV write error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for AudioError {
    /// Converts a String into `AudioError::Other`.
    ///
    /// Prefer the specific variants where the failure kind is known; this
    /// conversion exists for `?` on ad-hoc formatted messages.
    fn from(msg: String) -> Self {
        AudioError::Other(msg)
    }
}

impl From<&str> for AudioError {
    fn from(msg: &str) -> Self {
        AudioError::Other(msg.to_string())
    }
}

/// Result type for audio path operations
pub type Result<T> = std::result::Result<T, AudioError>;

// Public API exports
pub use logger::{Logger, TracingLogger};
pub use resampler::{AudioComponent, AudioResampler, Quality, RateConverter};
#[cfg(feature = "streaming")]
pub use streaming::AudioDevice;
pub use streaming::{
    OverflowPolicy, PlaybackStats, RealtimeStream, RingBuffer, RingBufferStats, StreamConfig,
};
