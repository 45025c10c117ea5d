//! Thread-safe append/drain sample queue fed by the audio capture callback.
//!
//! A single mutex protects the backing store. Append and drain are each a
//! single short critical section so the audio callback never blocks for
//! longer than a memmove.

use std::sync::Mutex;

/// Unbounded growable queue of samples at whatever rate the caller is
/// feeding it (the hardware rate, not necessarily 16 kHz; see the
/// AudioCapture invariant that resampling happens at drain time).
pub struct RingBuffer {
    inner: Mutex<Vec<f32>>,
}

impl RingBuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Atomically append samples to the end of the buffer.
    pub fn append(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let mut guard = self.inner.lock().unwrap();
        guard.extend_from_slice(samples);
    }

    /// Atomically take and clear the buffer contents. Capacity is retained.
    pub fn drain(&self) -> Vec<f32> {
        let mut guard = self.inner.lock().unwrap();
        std::mem::take(&mut *guard)
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Diagnostic only: reports duration as if the buffer held 16 kHz
    /// samples regardless of the rate it was actually fed at. Not used for
    /// any audio math; callers needing the true rate use the one passed
    /// explicitly to the resampler.
    pub fn duration_seconds(&self) -> f64 {
        self.count() as f64 / 16000.0
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_drain_returns_in_order() {
        let rb = RingBuffer::new();
        rb.append(&[1.0, 2.0, 3.0]);
        rb.append(&[4.0, 5.0]);
        assert_eq!(rb.count(), 5);
        let drained = rb.drain();
        assert_eq!(drained, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(rb.count(), 0);
    }

    #[test]
    fn drain_clears_the_buffer() {
        let rb = RingBuffer::new();
        rb.append(&[1.0, 2.0]);
        let _ = rb.drain();
        assert!(rb.is_empty());
        assert!(rb.drain().is_empty());
    }

    #[test]
    fn duration_seconds_uses_fixed_16khz_divisor() {
        let rb = RingBuffer::new();
        rb.append(&vec![0.0f32; 32000]);
        assert_eq!(rb.duration_seconds(), 2.0);
    }
}
