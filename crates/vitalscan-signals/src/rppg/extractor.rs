//! Pulse extraction: colour history → filtered pulse waveform

use ndarray::Array1;

use super::projection::{chrom_projection, pos_projection, ProjectionMethod};
use super::{PulseBuffer, RoiSample};
use crate::dsp::{normalize_by_local_mean, ButterworthBandpass};
use crate::error::SignalError;
use crate::{CARDIAC_HIGH_HZ, CARDIAC_LOW_HZ};

/// Pulse extractor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// Lower edge of the cardiac band (Hz)
    pub band_low_hz: f32,
    /// Upper edge of the cardiac band (Hz)
    pub band_high_hz: f32,
    /// Sliding window used for illumination detrending (seconds)
    pub detrend_window_sec: f32,
    /// POS projection window (seconds)
    pub pos_window_sec: f32,
    /// Cycles of the lowest cardiac frequency that must be buffered
    pub min_cardiac_cycles: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            band_low_hz: CARDIAC_LOW_HZ,
            band_high_hz: CARDIAC_HIGH_HZ,
            detrend_window_sec: 1.5,
            pos_window_sec: 1.6,
            min_cardiac_cycles: 3.0,
        }
    }
}

impl ExtractorConfig {
    /// Minimum number of valid samples `finalize` accepts at `fs`.
    pub fn min_samples(&self, fs: f32) -> usize {
        (self.min_cardiac_cycles * fs / self.band_low_hz).ceil().max(3.0) as usize
    }
}

/// Finalized, filtered pulse signal
#[derive(Debug, Clone)]
pub struct PulseWaveform {
    pub samples: Array1<f32>,
    pub sampling_rate: f32,
}

impl PulseWaveform {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_sec(&self) -> f32 {
        self.samples.len() as f32 / self.sampling_rate
    }
}

/// Pulse extractor
///
/// Accumulates ROI samples for one scan and turns them into a pulse waveform
/// once the scan ends.
#[derive(Debug, Clone)]
pub struct PulseExtractor {
    method: ProjectionMethod,
    config: ExtractorConfig,
    buffer: PulseBuffer,
}

impl PulseExtractor {
    /// Create an extractor buffering at most `capacity` samples.
    pub fn new(method: ProjectionMethod, sampling_rate: f32, capacity: usize) -> Self {
        Self::with_config(method, ExtractorConfig::default(), PulseBuffer::new(sampling_rate, capacity))
    }

    /// Create an extractor around an existing buffer (e.g. a snapshot taken
    /// by a scan session).
    pub fn with_config(method: ProjectionMethod, config: ExtractorConfig, buffer: PulseBuffer) -> Self {
        Self {
            method,
            config,
            buffer,
        }
    }

    pub fn method(&self) -> ProjectionMethod {
        self.method
    }

    pub fn buffer(&self) -> &PulseBuffer {
        &self.buffer
    }

    /// Add a sample; frames without a face are skipped.
    pub fn accumulate(&mut self, sample: &RoiSample) -> bool {
        self.buffer.push(sample)
    }

    /// Produce the filtered pulse waveform from everything buffered.
    ///
    /// 1. per-channel colour trajectories
    /// 2. sliding-window detrending
    /// 3. CHROM or POS projection
    /// 4. zero-phase cardiac bandpass
    pub fn finalize(&self) -> Result<PulseWaveform, SignalError> {
        let fs = self.buffer.sampling_rate();
        if !(fs.is_finite() && fs > 0.0) {
            return Err(SignalError::InvalidSamplingRate(fs));
        }

        let required = self.config.min_samples(fs);
        if self.buffer.len() < required {
            return Err(SignalError::InsufficientData {
                valid: self.buffer.len(),
                required,
            });
        }

        let bandpass = ButterworthBandpass::new(self.config.band_low_hz, self.config.band_high_hz, fs)?;

        // 1. Extract channels
        let (r, g, b) = self.buffer.channels();

        // 2. Detrend: relative change against the local mean
        let detrend_window = Self::seconds_to_samples(self.config.detrend_window_sec, fs);
        let r_norm = normalize_by_local_mean(&r, detrend_window);
        let g_norm = normalize_by_local_mean(&g, detrend_window);
        let b_norm = normalize_by_local_mean(&b, detrend_window);

        // 3. Project onto a pulse signal
        let projected = match self.method {
            ProjectionMethod::Chrom => chrom_projection(&r_norm, &g_norm, &b_norm, &bandpass),
            ProjectionMethod::Pos => {
                let window = Self::seconds_to_samples(self.config.pos_window_sec, fs);
                pos_projection(&r_norm, &g_norm, &b_norm, window)
            }
        };

        // 4. Cardiac band, zero phase
        let samples = bandpass.filtfilt(&projected);

        Ok(PulseWaveform {
            samples,
            sampling_rate: fs,
        })
    }

    fn seconds_to_samples(seconds: f32, fs: f32) -> usize {
        (seconds * fs).round().max(2.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{power_spectrum, next_fft_len};
    use std::f32::consts::PI;

    fn synthetic_face(bpm: f32, fs: f32, n: usize) -> Vec<RoiSample> {
        let f = bpm / 60.0;
        (0..n)
            .map(|i| {
                let t = i as f32 / fs;
                let pulse = (2.0 * PI * f * t).sin();
                // Slow illumination drift on every channel
                let light = 1.0 + 0.05 * (2.0 * PI * 0.05 * t).sin();
                RoiSample::detected(
                    [
                        light * (160.0 + 0.5 * pulse),
                        light * (110.0 + 1.2 * pulse),
                        light * (90.0 + 0.8 * pulse),
                    ],
                    (t * 1000.0) as i64,
                )
            })
            .collect()
    }

    fn dominant_bpm(pulse: &PulseWaveform) -> f32 {
        let spec = power_spectrum(&pulse.samples, pulse.sampling_rate, next_fft_len(pulse.len(), 1024));
        let (lo, hi) = spec.band_bins(0.7, 4.0).unwrap();
        let peak = (lo..=hi).max_by(|&a, &b| spec.power[a].total_cmp(&spec.power[b])).unwrap();
        spec.freq(peak) * 60.0
    }

    #[test]
    fn test_min_samples() {
        let cfg = ExtractorConfig::default();
        assert_eq!(cfg.min_samples(30.0), 129);
    }

    #[test]
    fn test_insufficient_data() {
        let mut extractor = PulseExtractor::new(ProjectionMethod::Pos, 30.0, 900);
        for sample in synthetic_face(70.0, 30.0, 50) {
            extractor.accumulate(&sample);
        }

        match extractor.finalize() {
            Err(SignalError::InsufficientData { valid, required }) => {
                assert_eq!(valid, 50);
                assert_eq!(required, 129);
            }
            other => panic!("expected insufficient data, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_faces_do_not_reset_buffer() {
        let mut extractor = PulseExtractor::new(ProjectionMethod::Chrom, 30.0, 900);
        for (i, sample) in synthetic_face(70.0, 30.0, 200).into_iter().enumerate() {
            extractor.accumulate(&sample);
            if i % 10 == 0 {
                assert!(!extractor.accumulate(&RoiSample::missing(i as i64)));
            }
        }
        assert_eq!(extractor.buffer().len(), 200);
    }

    #[test]
    fn test_synthetic_heartbeat_pos() {
        let mut extractor = PulseExtractor::new(ProjectionMethod::Pos, 30.0, 900);
        for sample in synthetic_face(72.0, 30.0, 900) {
            extractor.accumulate(&sample);
        }
        let pulse = extractor.finalize().unwrap();

        assert_eq!(pulse.len(), 900);
        let bpm = dominant_bpm(&pulse);
        assert!((bpm - 72.0).abs() < 3.0, "Expected ~72 BPM, got {}", bpm);
    }

    #[test]
    fn test_synthetic_heartbeat_chrom() {
        let mut extractor = PulseExtractor::new(ProjectionMethod::Chrom, 30.0, 900);
        for sample in synthetic_face(90.0, 30.0, 900) {
            extractor.accumulate(&sample);
        }
        let pulse = extractor.finalize().unwrap();

        let bpm = dominant_bpm(&pulse);
        assert!((bpm - 90.0).abs() < 3.0, "Expected ~90 BPM, got {}", bpm);
    }
}
