//! Lock-free peak level meter

use std::sync::atomic::{AtomicU32, Ordering};

/// Peak magnitude of the last processed buffer
///
/// One f32 stored as raw bits in an `AtomicU32`. The audio thread overwrites
/// it once per buffer; the control thread reads it at most one buffer period
/// stale. Overwrite semantics, not accumulation.
#[derive(Debug, Default)]
pub struct PeakMeter {
    peak: AtomicU32,
}

impl PeakMeter {
    pub fn new() -> Self {
        Self {
            peak: AtomicU32::new(0.0f32.to_bits()),
        }
    }

    /// Scans the buffer for maximum absolute magnitude and stores it
    /// with a single atomic write.
    pub fn update(&self, samples: &[f32]) {
        let mut peak = 0.0f32;
        for &s in samples {
            let v = s.abs();
            if v > peak {
                peak = v;
            }
        }
        self.peak.store(peak.to_bits(), Ordering::Relaxed);
    }

    /// Last stored peak value
    pub fn read(&self) -> f32 {
        f32::from_bits(self.peak.load(Ordering::Relaxed))
    }
}
