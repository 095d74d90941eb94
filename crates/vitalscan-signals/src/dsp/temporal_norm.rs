//! Sliding-window detrending
//!
//! Camera colour traces ride on a slowly varying illumination level. Dividing
//! each sample by the mean of a centred window around it turns the trace into
//! a relative (AC/DC) signal centred on 1.0, which removes the drift while
//! keeping the pulsatile component.

use ndarray::Array1;

const EPSILON: f32 = 1e-6;

/// Centred moving average with a window of `window_size` samples.
///
/// The window shrinks at the edges so every output sample is the mean of the
/// samples actually available around it.
pub fn sliding_mean(signal: &Array1<f32>, window_size: usize) -> Array1<f32> {
    let n = signal.len();
    if n == 0 {
        return Array1::zeros(0);
    }

    let half_win = window_size.max(1) / 2;

    // Prefix sums in f64 keep long traces numerically stable
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    for &x in signal.iter() {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + x as f64);
    }

    let mut result = Array1::zeros(n);
    for i in 0..n {
        let start = i.saturating_sub(half_win);
        let end = (i + half_win + 1).min(n);
        result[i] = ((prefix[end] - prefix[start]) / (end - start) as f64) as f32;
    }
    result
}

/// Divide each sample by its local mean.
///
/// Samples whose local mean is numerically zero map to 1.0 (no relative
/// change) instead of blowing up.
pub fn normalize_by_local_mean(signal: &Array1<f32>, window_size: usize) -> Array1<f32> {
    let local = sliding_mean(signal, window_size);
    let mut result = Array1::zeros(signal.len());
    for i in 0..signal.len() {
        result[i] = if local[i].abs() < EPSILON {
            1.0
        } else {
            signal[i] / local[i]
        };
    }
    result
}
