//! Lock-free sample bridge between the input and output streams
//!
//! The hardware subsystem exposes separate input and output streams, so the
//! pass-through copy of the processed input buffer travels through a
//! single-producer single-consumer sample queue: the input callback pushes,
//! the output callback pops and fills underruns with silence. Both sides are
//! allocation-free and never block.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

/// SPSC sample queue with overflow/underrun telemetry
pub struct MonitorBuffer {
    queue: ArrayQueue<f32>,
    overflow_count: AtomicUsize,
    underrun_count: AtomicUsize,
}

impl MonitorBuffer {
    /// Create a bridge holding up to `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
        }
    }

    /// Push a processed block; samples that do not fit are dropped
    /// and counted as overflow.
    pub fn push_block(&self, samples: &[f32]) {
        let mut dropped = 0;
        for &s in samples {
            if self.queue.push(s).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.overflow_count.fetch_add(dropped, Ordering::Relaxed);
        }
    }

    /// Fill `out` from the queue; missing samples become silence
    /// and are counted as underrun.
    pub fn pop_into(&self, out: &mut [f32]) {
        let mut missing = 0;
        for slot in out.iter_mut() {
            match self.queue.pop() {
                Some(s) => *slot = s,
                None => {
                    *slot = 0.0;
                    missing += 1;
                }
            }
        }
        if missing > 0 {
            self.underrun_count.fetch_add(missing, Ordering::Relaxed);
        }
    }

    /// Discard any queued samples (called across stream restarts)
    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Samples dropped because the output side fell behind
    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Samples substituted with silence because the input side fell behind
    pub fn underrun_count(&self) -> usize {
        self.underrun_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through_preserves_order() {
        let bridge = MonitorBuffer::new(8);
        bridge.push_block(&[0.1, 0.2, 0.3]);

        let mut out = [0.0f32; 3];
        bridge.pop_into(&mut out);
        assert_eq!(out, [0.1, 0.2, 0.3]);
        assert!(bridge.is_empty());
        assert_eq!(bridge.underrun_count(), 0);
    }

    #[test]
    fn test_underrun_fills_silence() {
        let bridge = MonitorBuffer::new(8);
        bridge.push_block(&[0.5]);

        let mut out = [1.0f32; 4];
        bridge.pop_into(&mut out);
        assert_eq!(out, [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(bridge.underrun_count(), 3);
    }

    #[test]
    fn test_overflow_drops_and_counts() {
        let bridge = MonitorBuffer::new(2);
        bridge.push_block(&[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(bridge.len(), 2);
        assert_eq!(bridge.overflow_count(), 2);
    }

    #[test]
    fn test_clear_empties_queue() {
        let bridge = MonitorBuffer::new(4);
        bridge.push_block(&[0.1, 0.2]);
        bridge.clear();
        assert!(bridge.is_empty());
    }
}
