use ndarray::Array1;

use super::RoiSample;

/// Accumulated colour history for one scan.
///
/// Append-only while a scan runs; only usable samples are stored and the
/// length never exceeds `capacity`.
#[derive(Debug, Clone)]
pub struct PulseBuffer {
    samples: Vec<[f32; 3]>,
    sampling_rate: f32,
    capacity: usize,
    dropped: usize,
}

impl PulseBuffer {
    pub fn new(sampling_rate: f32, capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity.min(8192)),
            sampling_rate,
            capacity,
            dropped: 0,
        }
    }

    /// Buffer sized for `duration_sec` of capture at `sampling_rate`.
    pub fn for_duration(sampling_rate: f32, duration_sec: f32) -> Self {
        let capacity = (sampling_rate * duration_sec).ceil().max(1.0) as usize;
        Self::new(sampling_rate, capacity)
    }

    /// Append a sample. Returns `true` when it was stored; samples without a
    /// face and samples arriving after the buffer is full are not.
    pub fn push(&mut self, sample: &RoiSample) -> bool {
        if !sample.is_usable() {
            return false;
        }
        if self.samples.len() >= self.capacity {
            self.dropped += 1;
            if self.dropped == 1 {
                log::warn!(
                    "Pulse buffer full ({} samples), dropping further samples",
                    self.capacity
                );
            }
            return false;
        }
        self.samples.push(sample.rgb);
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sampling_rate(&self) -> f32 {
        self.sampling_rate
    }

    /// Samples rejected because the buffer was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.dropped = 0;
    }

    /// Per-channel colour trajectories `(r, g, b)`.
    pub fn channels(&self) -> (Array1<f32>, Array1<f32>, Array1<f32>) {
        let r = self.samples.iter().map(|s| s[0]).collect();
        let g = self.samples.iter().map(|s| s[1]).collect();
        let b = self.samples.iter().map(|s| s[2]).collect();
        (r, g, b)
    }
}
