//! Synthetic facial ROI streams for demos and tests

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f32::consts::PI;

use vitalscan_signals::RoiSample;

/// Respiratory rate driving the sinus-arrhythmia modulation (Hz)
const BREATHING_HZ: f32 = 0.25;
/// Illumination drift frequency (Hz)
const DRIFT_HZ: f32 = 0.05;

/// Infinite stream of ROI samples from a simulated subject.
///
/// Skin colour carries a pulsatile component in green-dominant ratios, the
/// beat rate is modulated by breathing, and the whole patch is scaled by a
/// slow illumination drift plus Gaussian sensor noise.
#[derive(Debug, Clone)]
pub struct SyntheticFace {
    bpm: f32,
    sampling_rate: f32,
    base_rgb: [f32; 3],
    pulse_gain: [f32; 3],
    drift_depth: f32,
    rsa_depth: f32,
    noise: Option<Normal<f32>>,
    dropout_every: Option<usize>,
    rng: StdRng,
    index: usize,
    phase: f32,
}

impl SyntheticFace {
    pub fn new(bpm: f32, sampling_rate: f32) -> Self {
        Self {
            bpm,
            sampling_rate,
            base_rgb: [160.0, 110.0, 90.0],
            pulse_gain: [0.5, 1.2, 0.8],
            drift_depth: 0.05,
            rsa_depth: 0.02,
            noise: Normal::new(0.0, 0.1).ok(),
            dropout_every: None,
            rng: StdRng::seed_from_u64(0),
            index: 0,
            phase: 0.0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Sensor noise standard deviation in pixel units; 0 disables noise.
    pub fn with_noise(mut self, std: f32) -> Self {
        self.noise = if std > 0.0 { Normal::new(0.0, std).ok() } else { None };
        self
    }

    /// Every `every`-th sample reports no face.
    pub fn with_dropout(mut self, every: usize) -> Self {
        self.dropout_every = (every > 0).then_some(every);
        self
    }

    pub fn with_drift(mut self, depth: f32) -> Self {
        self.drift_depth = depth;
        self
    }

    pub fn sampling_rate(&self) -> f32 {
        self.sampling_rate
    }

    /// Collect `seconds` worth of samples.
    pub fn take_seconds(self, seconds: f32) -> Vec<RoiSample> {
        let n = (seconds * self.sampling_rate).round().max(0.0) as usize;
        self.take(n).collect()
    }
}

impl Iterator for SyntheticFace {
    type Item = RoiSample;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.index;
        self.index += 1;
        let t = i as f32 / self.sampling_rate;
        let timestamp_ms = (t * 1000.0).round() as i64;

        // Instantaneous beat frequency, integrated into phase
        let rsa = 1.0 + self.rsa_depth * (2.0 * PI * BREATHING_HZ * t).sin();
        let f = self.bpm / 60.0 * rsa;
        let phase = self.phase;
        self.phase = (self.phase + 2.0 * PI * f / self.sampling_rate) % (2.0 * PI);

        if matches!(self.dropout_every, Some(every) if i % every == every - 1) {
            return Some(RoiSample::missing(timestamp_ms));
        }

        // Systolic upstroke plus a smaller second harmonic
        let pulse = phase.sin() + 0.3 * (2.0 * phase).sin();
        let light = 1.0 + self.drift_depth * (2.0 * PI * DRIFT_HZ * t).sin();

        let mut rgb = [0.0f32; 3];
        for (c, value) in rgb.iter_mut().enumerate() {
            let noise = self.noise.map(|n| n.sample(&mut self.rng)).unwrap_or(0.0);
            *value = light * (self.base_rgb[c] + self.pulse_gain[c] * pulse) + noise;
        }

        Some(RoiSample::detected(rgb, timestamp_ms))
    }
}
