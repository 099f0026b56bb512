//! Byte FIFO shared between the emulation thread and the device callback
//!
//! A ring buffer (circular buffer) allows two threads to operate concurrently:
//! - Producer thread: the emulation loop writes resampled PCM bytes
//! - Consumer thread: the audio device callback reads bytes to fill its period
//!
//! Memory consumption is fixed at `capacity` bytes for the lifetime of the buffer.
//! Every operation takes one internal lock for the duration of a bounded copy, so
//! neither side ever waits on the other's I/O.
//!
//! Neither direction blocks or fails in steady state:
//! - a read larger than the buffered data is padded with silence (zero bytes)
//! - a write larger than the free space is resolved by the [`OverflowPolicy`]

use crate::{AudioError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Largest buffer we agree to allocate (64 MB is minutes of 48 kHz stereo)
pub const MAX_CAPACITY: usize = 64 * 1024 * 1024;

/// What a write does when it does not fit in the free space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the oldest unread bytes to make room for the new ones
    #[default]
    OverwriteOldest,
    /// Keep the buffered bytes and discard the part of the write that does not fit
    DropNewest,
}

/// Buffer health counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingBufferStats {
    /// Reads that found fewer bytes than requested
    pub underrun_count: u64,
    /// Writes that did not fit in the free space
    pub overflow_count: u64,
    /// Bytes lost to overflow (overwritten or rejected)
    pub bytes_dropped: u64,
    /// Zero bytes handed out in place of missing data
    pub bytes_padded: u64,
}

#[derive(Debug)]
struct Inner {
    storage: Vec<u8>,
    /// Valid unread bytes
    occupied: usize,
    /// Read cursor
    first: usize,
    /// Write cursor
    last: usize,
    stats: RingBufferStats,
}

impl Inner {
    fn discard_oldest(&mut self, count: usize, capacity: usize) {
        self.first = (self.first + count) % capacity;
        self.occupied -= count;
    }

    fn copy_in(&mut self, data: &[u8], capacity: usize) {
        let len = data.len();
        let start = self.last;

        // Check if we can write in one contiguous chunk
        if start + len <= capacity {
            self.storage[start..start + len].copy_from_slice(data);
        } else {
            // Wrap-around write
            let first_part = capacity - start;
            self.storage[start..].copy_from_slice(&data[..first_part]);
            self.storage[..len - first_part].copy_from_slice(&data[first_part..]);
        }

        self.last = (start + len) % capacity;
        self.occupied += len;
    }

    fn copy_out(&mut self, dest: &mut [u8], capacity: usize) {
        let len = dest.len();
        let start = self.first;

        if start + len <= capacity {
            dest.copy_from_slice(&self.storage[start..start + len]);
        } else {
            let first_part = capacity - start;
            dest[..first_part].copy_from_slice(&self.storage[start..]);
            dest[first_part..].copy_from_slice(&self.storage[..len - first_part]);
        }

        self.first = (start + len) % capacity;
        self.occupied -= len;
    }
}

/// Fixed-capacity byte FIFO for streaming PCM
///
/// # Thread Safety
/// - One producer thread (emulation loop, via `write`)
/// - One consumer thread (device callback, via `read`)
/// - A single `parking_lot::Mutex` guards the storage, cursors and counters
///
/// [`occupied`](Self::occupied) and [`free`](Self::free) are point-in-time
/// snapshots. The other thread may move the counters before a follow-up call
/// that was sized from them executes; there is no compare-and-act across calls.
#[derive(Debug)]
pub struct RingBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl RingBuffer {
    /// Create a ring buffer of `capacity` bytes that overwrites the oldest data on overflow
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::AllocationFailure`] if:
    /// - Requested capacity is 0
    /// - Requested capacity exceeds [`MAX_CAPACITY`]
    /// - The allocator cannot provide the storage
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_policy(capacity, OverflowPolicy::default())
    }

    /// Create a ring buffer with an explicit overflow policy
    pub fn with_policy(capacity: usize, policy: OverflowPolicy) -> Result<Self> {
        if capacity == 0 {
            return Err(AudioError::AllocationFailure(
                "Ring buffer capacity must be greater than 0".into(),
            ));
        }

        if capacity > MAX_CAPACITY {
            return Err(AudioError::AllocationFailure(format!(
                "Ring buffer capacity {capacity} exceeds maximum safe size {MAX_CAPACITY}"
            )));
        }

        let mut storage = Vec::new();
        storage.try_reserve_exact(capacity).map_err(|e| {
            AudioError::AllocationFailure(format!("Cannot allocate {capacity} bytes: {e}"))
        })?;
        storage.resize(capacity, 0);

        Ok(RingBuffer {
            inner: Mutex::new(Inner {
                storage,
                occupied: 0,
                first: 0,
                last: 0,
                stats: RingBufferStats::default(),
            }),
            capacity,
            policy,
        })
    }

    /// Release the storage
    ///
    /// Dropping the buffer does the same; this exists for call sites that want the
    /// teardown to read explicitly. It cannot race a reader or writer because it
    /// needs sole ownership.
    pub fn destroy(self) {
        drop(self);
    }

    /// Total size in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overflow policy chosen at construction
    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Forget all buffered data
    ///
    /// Stored bytes are left in place; they are never handed out because reads
    /// only copy within the occupied window.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.occupied = 0;
        inner.first = 0;
        inner.last = 0;
    }

    /// Bytes available to read
    pub fn occupied(&self) -> usize {
        self.inner.lock().occupied
    }

    /// Bytes that can be written without triggering the overflow policy
    pub fn free(&self) -> usize {
        self.capacity - self.inner.lock().occupied
    }

    /// Check if the buffer has nothing to read
    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    /// Get fill percentage (0.0 to 1.0)
    pub fn fill_percentage(&self) -> f32 {
        (self.occupied() as f32) / (self.capacity as f32)
    }

    /// Snapshot of the health counters
    pub fn stats(&self) -> RingBufferStats {
        self.inner.lock().stats
    }

    /// Append `data` (producer)
    ///
    /// Never blocks. When `data` does not fit, the overflow policy decides which
    /// bytes are lost. Returns the number of bytes from `data` that were stored.
    pub fn write(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }

        let capacity = self.capacity;
        let mut inner = self.inner.lock();
        let free = capacity - inner.occupied;

        let accepted = match self.policy {
            OverflowPolicy::OverwriteOldest => {
                let mut dropped = 0;

                // Only the newest `capacity` bytes of an oversized write can survive
                let data = if data.len() > capacity {
                    dropped += data.len() - capacity;
                    &data[data.len() - capacity..]
                } else {
                    data
                };

                if data.len() > free {
                    let discard = data.len() - free;
                    inner.discard_oldest(discard, capacity);
                    dropped += discard;
                }

                if dropped > 0 {
                    inner.stats.overflow_count += 1;
                    inner.stats.bytes_dropped += dropped as u64;
                    tracing::trace!(dropped, "audio fifo overflow, oldest bytes overwritten");
                }

                data
            }
            OverflowPolicy::DropNewest => {
                let to_write = data.len().min(free);
                if to_write < data.len() {
                    let dropped = data.len() - to_write;
                    inner.stats.overflow_count += 1;
                    inner.stats.bytes_dropped += dropped as u64;
                    tracing::trace!(dropped, "audio fifo overflow, newest bytes rejected");
                }
                &data[..to_write]
            }
        };

        if !accepted.is_empty() {
            inner.copy_in(accepted, capacity);
        }

        accepted.len()
    }

    /// Fill `dest` from the buffer (consumer)
    ///
    /// Never blocks. If fewer than `dest.len()` bytes are buffered, the buffered
    /// bytes come first and the rest of `dest` is zeroed. Returns the number of
    /// real bytes copied.
    pub fn read(&self, dest: &mut [u8]) -> usize {
        if dest.is_empty() {
            return 0;
        }

        let capacity = self.capacity;
        let mut inner = self.inner.lock();
        let to_read = dest.len().min(inner.occupied);

        if to_read > 0 {
            inner.copy_out(&mut dest[..to_read], capacity);
        }

        if to_read < dest.len() {
            let padded = dest.len() - to_read;
            dest[to_read..].fill(0);
            inner.stats.underrun_count += 1;
            inner.stats.bytes_padded += padded as u64;
        }

        to_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(range: std::ops::Range<u8>) -> Vec<u8> {
        range.collect()
    }

    #[test]
    fn test_ring_buffer_creation() {
        let rb = RingBuffer::new(1024).unwrap();
        assert_eq!(rb.capacity(), 1024);
        assert_eq!(rb.occupied(), 0);
        assert_eq!(rb.free(), 1024);
        assert!(rb.is_empty());
        assert_eq!(rb.overflow_policy(), OverflowPolicy::OverwriteOldest);
    }

    #[test]
    fn test_capacity_is_exact() {
        // No power-of-two rounding: the byte count is what the caller asked for
        let rb = RingBuffer::new(1000).unwrap();
        assert_eq!(rb.capacity(), 1000);
    }

    #[test]
    fn test_zero_capacity_error() {
        let result = RingBuffer::new(0);
        assert!(matches!(result, Err(AudioError::AllocationFailure(_))));
        assert!(result.unwrap_err().to_string().contains("greater than 0"));
    }

    #[test]
    fn test_max_capacity_exceeded() {
        let result = RingBuffer::new(MAX_CAPACITY + 1);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_write_and_read() {
        let rb = RingBuffer::new(16).unwrap();
        let data = bytes(1..5);

        assert_eq!(rb.write(&data), 4);
        assert_eq!(rb.occupied(), 4);
        assert_eq!(rb.free(), 12);

        let mut dest = vec![0u8; 4];
        assert_eq!(rb.read(&mut dest), 4);
        assert_eq!(dest, data);
        assert!(rb.is_empty());
    }

    #[test]
    fn test_ring_buffer_wrap() {
        let rb = RingBuffer::new(16).unwrap();

        assert_eq!(rb.write(&[1u8; 10]), 10);

        let mut buf = vec![0u8; 8];
        assert_eq!(rb.read(&mut buf), 8);
        assert_eq!(buf, vec![1u8; 8]);

        // Write cursor at 10; 12 bytes wraps past the end of storage
        let data = bytes(20..32);
        assert_eq!(rb.write(&data), 12);
        assert_eq!(rb.occupied(), 14);

        let mut buf = vec![0u8; 14];
        assert_eq!(rb.read(&mut buf), 14);
        assert_eq!(&buf[..2], &[1, 1]);
        assert_eq!(&buf[2..], &data[..]);
    }

    #[test]
    fn test_underrun_pads_with_silence() {
        let rb = RingBuffer::new(16).unwrap();
        rb.write(&[7u8; 3]);

        let mut dest = vec![0xAAu8; 8];
        assert_eq!(rb.read(&mut dest), 3);
        assert_eq!(dest, vec![7, 7, 7, 0, 0, 0, 0, 0]);
        assert_eq!(rb.occupied(), 0);

        let stats = rb.stats();
        assert_eq!(stats.underrun_count, 1);
        assert_eq!(stats.bytes_padded, 5);
    }

    #[test]
    fn test_overflow_overwrites_oldest() {
        let rb = RingBuffer::new(8).unwrap();
        rb.write(&bytes(0..6));

        // free == 2, writing 5 discards the 3 oldest bytes
        assert_eq!(rb.write(&bytes(100..105)), 5);
        assert_eq!(rb.occupied(), 8);
        assert_eq!(rb.free(), 0);

        let mut dest = vec![0u8; 8];
        rb.read(&mut dest);
        assert_eq!(dest, vec![3, 4, 5, 100, 101, 102, 103, 104]);

        let stats = rb.stats();
        assert_eq!(stats.overflow_count, 1);
        assert_eq!(stats.bytes_dropped, 3);
    }

    #[test]
    fn test_oversized_write_keeps_newest_capacity_bytes() {
        let rb = RingBuffer::new(4).unwrap();
        rb.write(&[9u8; 2]);

        assert_eq!(rb.write(&bytes(0..10)), 4);
        assert_eq!(rb.occupied(), 4);

        let mut dest = vec![0u8; 4];
        rb.read(&mut dest);
        assert_eq!(dest, vec![6, 7, 8, 9]);
        assert_eq!(rb.stats().bytes_dropped, 2 + 6);
    }

    #[test]
    fn test_overflow_drop_newest() {
        let rb = RingBuffer::with_policy(8, OverflowPolicy::DropNewest).unwrap();
        rb.write(&bytes(0..6));

        assert_eq!(rb.write(&bytes(100..105)), 2);
        assert_eq!(rb.occupied(), 8);

        let mut dest = vec![0u8; 8];
        rb.read(&mut dest);
        assert_eq!(dest, vec![0, 1, 2, 3, 4, 5, 100, 101]);
        assert_eq!(rb.stats().bytes_dropped, 3);
    }

    #[test]
    fn test_reset_discards_content() {
        let rb = RingBuffer::new(16).unwrap();
        rb.write(&[5u8; 12]);
        rb.reset();

        assert_eq!(rb.occupied(), 0);
        assert_eq!(rb.free(), 16);

        let mut dest = vec![0xFFu8; 16];
        assert_eq!(rb.read(&mut dest), 0);
        assert!(dest.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_occupied_plus_free_is_capacity() {
        let rb = RingBuffer::new(13).unwrap();
        let mut scratch = [0u8; 7];

        for step in 0..200usize {
            let len = (step * 5) % 11;
            if step % 3 == 0 {
                rb.read(&mut scratch[..len.min(7)]);
            } else {
                rb.write(&vec![step as u8; len]);
            }
            assert_eq!(rb.occupied() + rb.free(), 13, "step {step}");
        }
    }

    #[test]
    fn test_fill_percentage() {
        let rb = RingBuffer::new(128).unwrap();
        assert_eq!(rb.fill_percentage(), 0.0);

        rb.write(&[1u8; 64]);
        approx::assert_relative_eq!(rb.fill_percentage(), 0.5);

        rb.write(&[1u8; 64]);
        approx::assert_relative_eq!(rb.fill_percentage(), 1.0);
    }

    #[test]
    fn test_empty_calls_are_noops() {
        let rb = RingBuffer::new(4).unwrap();
        assert_eq!(rb.write(&[]), 0);
        assert_eq!(rb.read(&mut []), 0);
        assert_eq!(rb.stats(), RingBufferStats::default());
    }
}
