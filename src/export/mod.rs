//! Capture of converted audio to disk
//!
//! Lets a frontend (or a test) record exactly what the device would have played:
//! the bytes coming out of the FIFO, at the device rate.

pub mod wav;

pub use wav::{drain_to_wav, write_wav_file};
