//! Bounded per-connection audio accumulator.
//!
//! Raw PCM bytes are appended as they arrive. A watermark separates the
//! bytes already handed to a recognition pass from the ones still
//! waiting. When an append would exceed the capacity the oldest bytes are
//! dropped and the watermark moves back by the same amount; sessions that
//! stay idle longer than the buffer window lose their oldest audio.

use tracing::debug;

pub const MB: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AudioBuffer {
    data: Vec<u8>,
    capacity: usize,
    watermark: usize,
}

impl AudioBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
            watermark: 0,
        }
    }

    pub fn with_capacity_mb(capacity_mb: usize) -> Self {
        Self::new(capacity_mb * MB)
    }

    /// Append a chunk, evicting the oldest bytes when over capacity
    pub fn append(&mut self, chunk: &[u8]) {
        // A chunk larger than the whole window only keeps its newest bytes
        let chunk = if chunk.len() > self.capacity {
            &chunk[chunk.len() - self.capacity..]
        } else {
            chunk
        };

        let new_len = self.data.len() + chunk.len();
        if new_len > self.capacity {
            let overflow = new_len - self.capacity;
            self.data.drain(..overflow);
            self.watermark = self.watermark.saturating_sub(overflow);
            debug!(
                "Audio buffer over capacity, evicted {} bytes (watermark now {})",
                overflow, self.watermark
            );
        }

        self.data.extend_from_slice(chunk);
    }

    /// Bytes from the watermark to the end
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.watermark..]
    }

    pub fn unconsumed_len(&self) -> usize {
        self.data.len() - self.watermark
    }

    /// Advance the watermark, clamped to the buffer length
    pub fn mark_consumed(&mut self, n: usize) {
        self.watermark = (self.watermark + n).min(self.data.len());
    }

    pub fn reset(&mut self) {
        self.data.clear();
        self.data.shrink_to_fit();
        self.watermark = 0;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }
}
