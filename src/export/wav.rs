//! WAV file export functionality

use crate::streaming::{RingBuffer, BYTES_PER_FRAME, CHANNELS};
use crate::Result;
use std::path::Path;

/// Write interleaved 16-bit samples to a WAV file
pub fn write_wav_file<P: AsRef<Path>>(
    path: P,
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(())
}

/// Empty `buffer` into a stereo WAV file at `sample_rate`
///
/// Only whole frames are taken; a trailing partial frame stays in the buffer.
/// Returns the number of frames written.
///
/// # Examples
///
/// ```no_run
/// use emu_audio::export::drain_to_wav;
/// use emu_audio::RingBuffer;
///
/// # fn main() -> emu_audio::Result<()> {
/// let fifo = RingBuffer::new(48_000 * 4)?;
/// // ... feed it through an AudioResampler ...
/// let frames = drain_to_wav(&fifo, "capture.wav", 48_000)?;
/// println!("captured {frames} frames");
/// # Ok(())
/// # }
/// ```
pub fn drain_to_wav<P: AsRef<Path>>(
    buffer: &RingBuffer,
    path: P,
    sample_rate: u32,
) -> Result<usize> {
    let frames = buffer.occupied() / BYTES_PER_FRAME;
    let mut bytes = vec![0u8; frames * BYTES_PER_FRAME];
    buffer.read(&mut bytes);

    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|b| i16::from_ne_bytes([b[0], b[1]]))
        .collect();

    tracing::info!(
        path = %path.as_ref().display(),
        frames,
        "writing WAV capture"
    );
    write_wav_file(path, &samples, sample_rate, CHANNELS)?;

    Ok(frames)
}
