//! DSP (Digital Signal Processing) module
//!
//! Provides the numeric building blocks of the rPPG pipeline.
//!
//! - `ButterworthBandpass` - second-order sections with zero-phase `filtfilt`
//! - `normalize_by_local_mean` - sliding-window illumination detrending
//! - `power_spectrum` - zero-padded real FFT power
//! - `find_peaks` - prominence/distance peak picking

mod filters;
mod peaks;
mod spectrum;
mod temporal_norm;

pub use filters::{Biquad, ButterworthBandpass};
pub use peaks::{find_peaks, peak_prominences, PeakParams};
pub use spectrum::{next_fft_len, power_spectrum, Spectrum};
pub use temporal_norm::{normalize_by_local_mean, sliding_mean};

use ndarray::Array1;

/// Population standard deviation.
pub fn std(arr: &Array1<f32>) -> f32 {
    let mean = arr.mean().unwrap_or(0.0);
    let variance = arr.mapv(|x| (x - mean).powi(2)).mean().unwrap_or(0.0);
    variance.sqrt()
}

/// Median of a slice, `None` when empty.
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_std() {
        let signal = Array1::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        // Known population std for [1,2,3,4,5] is sqrt(2)
        assert_relative_eq!(std(&signal), std::f32::consts::SQRT_2, epsilon = 0.001);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }
}
