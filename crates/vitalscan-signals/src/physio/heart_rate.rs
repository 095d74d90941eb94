//! Heart-rate estimation with frequency/time-domain fusion
//!
//! Two independent estimators run on the same pulse waveform:
//!
//! 1. **Spectral**: dominant frequency of the zero-padded power spectrum in
//!    the cardiac band, with a one-shot harmonic/subharmonic correction.
//!    Confidence is the peak's share of in-band power.
//! 2. **Peaks**: median inter-beat interval from prominence-gated peak
//!    detection. Confidence is `1 - CV` of the intervals.
//!
//! The fused rate is the confidence-weighted mean, clipped to [30, 200] BPM.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::dsp::{self, find_peaks, next_fft_len, power_spectrum, PeakParams};
use crate::{CARDIAC_HIGH_HZ, CARDIAC_LOW_HZ};

/// Which way a harmonic rule moves the dominant frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmonicCorrection {
    /// Dominant peak replaced by its 2x harmonic (suppressed fundamental)
    PromotedToHarmonic,
    /// Dominant peak replaced by its 1/2 subharmonic (harmonic misdetection)
    DemotedToSubharmonic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Trigger {
    Below(f32),
    Above(f32),
}

impl Trigger {
    fn matches(&self, bpm: f32) -> bool {
        match *self {
            Trigger::Below(limit) => bpm < limit,
            Trigger::Above(limit) => bpm > limit,
        }
    }
}

/// One row of the harmonic decision table.
#[derive(Debug, Clone, Copy)]
struct HarmonicRule {
    trigger: Trigger,
    factor: f32,
    /// Candidate power must exceed this fraction of the dominant peak power
    min_power_ratio: f32,
    correction: HarmonicCorrection,
}

/// Evaluated top to bottom against the uncorrected dominant rate; the first
/// matching row is the only one considered.
const HARMONIC_RULES: [HarmonicRule; 2] = [
    HarmonicRule {
        trigger: Trigger::Below(45.0),
        factor: 2.0,
        min_power_ratio: 0.15,
        correction: HarmonicCorrection::PromotedToHarmonic,
    },
    HarmonicRule {
        trigger: Trigger::Above(120.0),
        factor: 0.5,
        min_power_ratio: 0.20,
        correction: HarmonicCorrection::DemotedToSubharmonic,
    },
];

/// Heart-rate estimator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateConfig {
    pub band_low_hz: f32,
    pub band_high_hz: f32,
    pub min_bpm: f32,
    pub max_bpm: f32,
    /// Resting rate reported when no estimator produces anything usable
    pub fallback_bpm: f32,
    /// Minimum FFT length after zero padding
    pub min_fft_len: usize,
    /// Peak prominence as a fraction of the waveform's peak-to-peak range
    pub prominence_ratio: f32,
    /// Refractory distance between beats (seconds)
    pub min_peak_distance_sec: f32,
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            band_low_hz: CARDIAC_LOW_HZ,
            band_high_hz: CARDIAC_HIGH_HZ,
            min_bpm: 30.0,
            max_bpm: 200.0,
            fallback_bpm: 72.0,
            min_fft_len: 1024,
            prominence_ratio: 0.35,
            min_peak_distance_sec: 0.3,
        }
    }
}

/// Output of the spectral estimator
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralEstimate {
    pub bpm: f32,
    pub confidence: f32,
    pub correction: Option<HarmonicCorrection>,
}

/// Output of the peak estimator
#[derive(Debug, Clone, PartialEq)]
pub struct PeakEstimate {
    pub bpm: f32,
    pub confidence: f32,
    /// Inter-beat intervals in seconds
    pub intervals_sec: Vec<f32>,
}

/// Fused heart-rate result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrResult {
    /// Fused rate, always within [30, 200]
    pub bpm: f32,
    pub fft_bpm: f32,
    pub peak_bpm: f32,
    pub fft_confidence: f32,
    pub peak_confidence: f32,
    /// Inter-beat intervals (seconds) from the peak detector
    pub intervals_sec: Vec<f32>,
    pub harmonic_correction: Option<HarmonicCorrection>,
}

/// Heart-rate estimator
#[derive(Debug, Clone, Default)]
pub struct HeartRateEstimator {
    config: HeartRateConfig,
}

impl HeartRateEstimator {
    pub fn new() -> Self {
        Self::with_config(HeartRateConfig::default())
    }

    pub fn with_config(config: HeartRateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeartRateConfig {
        &self.config
    }

    /// Run both estimators and fuse them by confidence.
    pub fn estimate(&self, pulse: &Array1<f32>, fs: f32) -> HrResult {
        let spectral = self.estimate_spectral(pulse, fs);
        let peaks = self.estimate_peaks(pulse, fs);

        let total_conf = spectral.confidence + peaks.confidence;
        let fused = if total_conf > 0.0 {
            (spectral.bpm * spectral.confidence + peaks.bpm * peaks.confidence) / total_conf
        } else {
            self.config.fallback_bpm
        };
        let bpm = self.clip(fused);

        log::info!(
            "HR estimate: {:.1} BPM (FFT={:.1} [conf={:.2}], Peaks={:.1} [conf={:.2}])",
            bpm,
            spectral.bpm,
            spectral.confidence,
            peaks.bpm,
            peaks.confidence
        );

        HrResult {
            bpm,
            fft_bpm: spectral.bpm,
            peak_bpm: peaks.bpm,
            fft_confidence: spectral.confidence,
            peak_confidence: peaks.confidence,
            intervals_sec: peaks.intervals_sec,
            harmonic_correction: spectral.correction,
        }
    }

    /// Dominant in-band frequency of the zero-padded power spectrum.
    pub fn estimate_spectral(&self, pulse: &Array1<f32>, fs: f32) -> SpectralEstimate {
        let fallback = SpectralEstimate {
            bpm: self.config.fallback_bpm,
            confidence: 0.0,
            correction: None,
        };
        if pulse.len() < 2 || !(fs > 0.0) {
            return fallback;
        }

        let n_fft = next_fft_len(pulse.len(), self.config.min_fft_len);
        let spectrum = power_spectrum(pulse, fs, n_fft);

        let (low, high) = (self.config.band_low_hz, self.config.band_high_hz);
        let Some((first, last)) = spectrum.band_bins(low, high) else {
            return fallback;
        };

        let mut peak_idx = first;
        let mut total = 0.0f32;
        for idx in first..=last {
            let p = spectrum.power[idx];
            total += p;
            if p > spectrum.power[peak_idx] {
                peak_idx = idx;
            }
        }
        let peak_power = spectrum.power[peak_idx];
        if !(total > 0.0) {
            return fallback;
        }

        let mut freq = spectrum.freq(peak_idx);
        let dominant_bpm = freq * 60.0;
        let mut correction = None;

        if let Some(rule) = HARMONIC_RULES.iter().find(|r| r.trigger.matches(dominant_bpm)) {
            let candidate = freq * rule.factor;
            if (low..=high).contains(&candidate) {
                let candidate_power = spectrum.power[spectrum.nearest_bin(candidate)];
                if candidate_power > rule.min_power_ratio * peak_power {
                    log::info!(
                        "Harmonic correction ({:?}): {:.1} BPM -> {:.1} BPM",
                        rule.correction,
                        dominant_bpm,
                        candidate * 60.0
                    );
                    freq = candidate;
                    correction = Some(rule.correction);
                }
            }
        }

        let confidence = (peak_power / total).clamp(0.0, 1.0);

        SpectralEstimate {
            bpm: self.clip(freq * 60.0),
            confidence,
            correction,
        }
    }

    /// Median inter-beat interval from prominence-gated peaks.
    pub fn estimate_peaks(&self, pulse: &Array1<f32>, fs: f32) -> PeakEstimate {
        let intervals_sec = self.beat_intervals(pulse, fs);

        if intervals_sec.is_empty() {
            return PeakEstimate {
                bpm: self.config.fallback_bpm,
                confidence: 0.0,
                intervals_sec,
            };
        }

        let median_rr = dsp::median(&intervals_sec).unwrap_or(0.0);
        let bpm = self.clip(60.0 / (median_rr + 1e-8));

        let rr = Array1::from(intervals_sec.clone());
        let mean = rr.mean().unwrap_or(0.0);
        let cv = dsp::std(&rr) / (mean + 1e-8);
        let confidence = (1.0 - cv).clamp(0.0, 1.0);

        PeakEstimate {
            bpm,
            confidence,
            intervals_sec,
        }
    }

    /// Inter-beat intervals in seconds; empty when fewer than two beats.
    pub fn beat_intervals(&self, pulse: &Array1<f32>, fs: f32) -> Vec<f32> {
        if pulse.len() < 3 || !(fs > 0.0) {
            return Vec::new();
        }

        let max = pulse.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let min = pulse.fold(f32::INFINITY, |a, &b| a.min(b));
        let params = PeakParams {
            distance: ((fs * self.config.min_peak_distance_sec) as usize).max(1),
            prominence: self.config.prominence_ratio * (max - min),
        };

        let samples = pulse.to_vec();
        let peaks = find_peaks(&samples, &params);
        if peaks.len() < 2 {
            return Vec::new();
        }

        peaks.windows(2).map(|w| (w[1] - w[0]) as f32 / fs).collect()
    }

    fn clip(&self, bpm: f32) -> f32 {
        if bpm.is_finite() {
            bpm.clamp(self.config.min_bpm, self.config.max_bpm)
        } else {
            self.config.fallback_bpm
        }
    }
}
