//! Zero-phase Butterworth bandpass for rPPG signals
//!
//! The band is built from a second-order Butterworth high-pass at the lower
//! edge cascaded with a second-order Butterworth low-pass at the upper edge
//! (bilinear transform with frequency pre-warping). `filtfilt` runs the
//! cascade forward and backward so the output has no group delay.

use ndarray::Array1;
use std::f32::consts::{FRAC_1_SQRT_2, PI};

use crate::error::SignalError;

/// One second-order section in transposed direct form II.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Biquad {
    /// Second-order Butterworth low-pass with cutoff `fc` (Hz).
    pub fn lowpass(fc: f32, fs: f32) -> Self {
        let w0 = 2.0 * PI * fc / fs;
        let (sin_w, cos_w) = w0.sin_cos();
        let alpha = sin_w / (2.0 * FRAC_1_SQRT_2);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_w) / 2.0 / a0,
            b1: (1.0 - cos_w) / a0,
            b2: (1.0 - cos_w) / 2.0 / a0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Second-order Butterworth high-pass with cutoff `fc` (Hz).
    pub fn highpass(fc: f32, fs: f32) -> Self {
        let w0 = 2.0 * PI * fc / fs;
        let (sin_w, cos_w) = w0.sin_cos();
        let alpha = sin_w / (2.0 * FRAC_1_SQRT_2);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos_w) / 2.0 / a0,
            b1: -(1.0 + cos_w) / a0,
            b2: (1.0 + cos_w) / 2.0 / a0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// DC gain of the section.
    pub fn dc_gain(&self) -> f32 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < 1e-12 {
            0.0
        } else {
            (self.b0 + self.b1 + self.b2) / den
        }
    }

    /// Filter state that makes the section start in steady state for a
    /// constant input `x0`.
    fn steady_state(&self, x0: f32) -> [f32; 2] {
        let y0 = self.dc_gain() * x0;
        let z2 = self.b2 * x0 - self.a2 * y0;
        let z1 = self.b1 * x0 - self.a1 * y0 + z2;
        [z1, z2]
    }

    /// Filter `signal` in place starting from state `z`.
    fn run(&self, signal: &mut [f32], mut z: [f32; 2]) {
        for x in signal.iter_mut() {
            let input = *x;
            let y = self.b0 * input + z[0];
            z[0] = self.b1 * input - self.a1 * y + z[1];
            z[1] = self.b2 * input - self.a2 * y;
            *x = y;
        }
    }
}

/// Cardiac-band bandpass with zero-phase application.
#[derive(Debug, Clone)]
pub struct ButterworthBandpass {
    sections: [Biquad; 2],
    low_hz: f32,
    sample_rate: f32,
}

impl ButterworthBandpass {
    /// Design a bandpass for `[low_hz, high_hz]` at `sample_rate`.
    pub fn new(low_hz: f32, high_hz: f32, sample_rate: f32) -> Result<Self, SignalError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(SignalError::InvalidSamplingRate(sample_rate));
        }
        if !(low_hz > 0.0 && low_hz < high_hz && high_hz < sample_rate / 2.0) {
            return Err(SignalError::InvalidBand {
                low: low_hz,
                high: high_hz,
                fs: sample_rate,
            });
        }

        Ok(Self {
            sections: [
                Biquad::highpass(low_hz, sample_rate),
                Biquad::lowpass(high_hz, sample_rate),
            ],
            low_hz,
            sample_rate,
        })
    }

    /// Edge padding used by `filtfilt`: three periods of the lowest
    /// passband frequency, bounded by the signal length.
    fn pad_len(&self, n: usize) -> usize {
        let period = (self.sample_rate / self.low_hz).ceil() as usize;
        (3 * period).min(n.saturating_sub(1))
    }

    /// Single forward pass through the cascade.
    pub fn filter(&self, signal: &[f32]) -> Vec<f32> {
        let mut out = signal.to_vec();
        if out.is_empty() {
            return out;
        }
        for section in &self.sections {
            let z = section.steady_state(out[0]);
            section.run(&mut out, z);
        }
        out
    }

    /// Zero-phase forward-backward filtering with odd-extension padding.
    pub fn filtfilt(&self, signal: &Array1<f32>) -> Array1<f32> {
        let n = signal.len();
        if n < 3 {
            return signal.clone();
        }

        let x = signal.to_vec();
        let pad = self.pad_len(n);

        // Odd extension around both end points
        let mut extended = Vec::with_capacity(n + 2 * pad);
        for i in (1..=pad).rev() {
            extended.push(2.0 * x[0] - x[i]);
        }
        extended.extend_from_slice(&x);
        for i in 1..=pad {
            extended.push(2.0 * x[n - 1] - x[n - 1 - i]);
        }

        let mut forward = self.filter(&extended);
        forward.reverse();
        let mut backward = self.filter(&forward);
        backward.reverse();

        Array1::from(backward[pad..pad + n].to_vec())
    }
}
