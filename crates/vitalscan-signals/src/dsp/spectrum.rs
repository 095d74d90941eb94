//! Zero-padded power spectrum

use ndarray::Array1;
use num_complex::Complex32;
use rustfft::FftPlanner;

/// One-sided power spectrum of a real signal.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Power per bin, `n_fft / 2 + 1` entries
    pub power: Vec<f32>,
    /// Frequency resolution (Hz per bin)
    pub bin_hz: f32,
    /// FFT length after padding
    pub n_fft: usize,
}

impl Spectrum {
    /// Frequency of bin `idx` in Hz.
    pub fn freq(&self, idx: usize) -> f32 {
        idx as f32 * self.bin_hz
    }

    /// Bin whose centre frequency is closest to `hz`.
    pub fn nearest_bin(&self, hz: f32) -> usize {
        let idx = (hz / self.bin_hz).round().max(0.0) as usize;
        idx.min(self.power.len().saturating_sub(1))
    }

    /// Inclusive bin range covering `[low_hz, high_hz]`, `None` if the band
    /// holds no bin.
    pub fn band_bins(&self, low_hz: f32, high_hz: f32) -> Option<(usize, usize)> {
        let first = (low_hz / self.bin_hz).ceil().max(0.0) as usize;
        let last = ((high_hz / self.bin_hz).floor() as usize).min(self.power.len().saturating_sub(1));
        if first > last || first >= self.power.len() {
            None
        } else {
            Some((first, last))
        }
    }
}

/// FFT length: next power of two of `len`, never below `min_len`.
pub fn next_fft_len(len: usize, min_len: usize) -> usize {
    len.max(1).next_power_of_two().max(min_len)
}

/// Power spectrum `|X[k]|^2` of `signal` zero-padded to `n_fft` points.
pub fn power_spectrum(signal: &Array1<f32>, fs: f32, n_fft: usize) -> Spectrum {
    let n_fft = n_fft.max(signal.len()).max(2);

    let mut buffer: Vec<Complex32> = signal
        .iter()
        .map(|&s| Complex32::new(s, 0.0))
        .chain(std::iter::repeat(Complex32::new(0.0, 0.0)))
        .take(n_fft)
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    fft.process(&mut buffer);

    let power = buffer.iter().take(n_fft / 2 + 1).map(|c| c.norm_sqr()).collect();

    Spectrum {
        power,
        bin_hz: fs / n_fft as f32,
        n_fft,
    }
}
