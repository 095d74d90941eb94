//! Heuristic stress index from heart rate and HRV
//!
//! Each input is mapped to a [0, 1] load: elevated heart rate and suppressed
//! variability both push towards 1. Missing HRV components are dropped and
//! the remaining weights renormalised.

use serde::{Deserialize, Serialize};
use std::fmt;

const HR_WEIGHT: f32 = 0.4;
const RMSSD_WEIGHT: f32 = 0.4;
const SDNN_WEIGHT: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StressLevel {
    Low,
    Moderate,
    High,
}

impl StressLevel {
    fn from_score(score: f32) -> Self {
        if score < 35.0 {
            StressLevel::Low
        } else if score < 65.0 {
            StressLevel::Moderate
        } else {
            StressLevel::High
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StressLevel::Low => "Relaxed state with healthy heart rate variability.",
            StressLevel::Moderate => "Some physiological signs of stress. Consider a short break or slow breathing.",
            StressLevel::High => "Elevated heart rate and reduced variability suggest high stress.",
        }
    }
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StressLevel::Low => "Low",
            StressLevel::Moderate => "Moderate",
            StressLevel::High => "High",
        };
        f.write_str(label)
    }
}

/// How much of the input the score is based on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressConfidence {
    /// Heart rate only
    Low,
    /// Heart rate plus one HRV statistic
    Medium,
    /// Heart rate, RMSSD and SDNN
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressResult {
    /// Stress score in [0, 100]
    pub score: f32,
    pub level: StressLevel,
    pub description: String,
    pub confidence: StressConfidence,
}

/// Stress estimator (stateless)
#[derive(Debug, Clone, Copy, Default)]
pub struct StressEstimator;

impl StressEstimator {
    pub fn new() -> Self {
        Self
    }

    pub fn estimate(&self, hr_bpm: f32, rmssd_ms: Option<f32>, sdnn_ms: Option<f32>) -> StressResult {
        // 60 BPM -> 0, 120 BPM -> 1
        let hr_load = ((hr_bpm - 60.0) / 60.0).clamp(0.0, 1.0);
        // 60 ms -> 0, 15 ms -> 1
        let rmssd_load = rmssd_ms
            .filter(|v| v.is_finite())
            .map(|r| ((60.0 - r) / 45.0).clamp(0.0, 1.0));
        // 70 ms -> 0, 20 ms -> 1
        let sdnn_load = sdnn_ms
            .filter(|v| v.is_finite())
            .map(|s| ((70.0 - s) / 50.0).clamp(0.0, 1.0));

        let hr_load = if hr_load.is_finite() { hr_load } else { 0.0 };
        let mut weighted = HR_WEIGHT * hr_load;
        let mut total_weight = HR_WEIGHT;
        let mut hrv_inputs = 0;
        for (load, weight) in [(rmssd_load, RMSSD_WEIGHT), (sdnn_load, SDNN_WEIGHT)] {
            if let Some(load) = load {
                weighted += weight * load;
                total_weight += weight;
                hrv_inputs += 1;
            }
        }

        let score = (100.0 * weighted / total_weight).clamp(0.0, 100.0);
        let score = (score * 10.0).round() / 10.0;
        let level = StressLevel::from_score(score);
        let confidence = match hrv_inputs {
            0 => StressConfidence::Low,
            1 => StressConfidence::Medium,
            _ => StressConfidence::High,
        };

        StressResult {
            score,
            level,
            description: level.description().to_string(),
            confidence,
        }
    }
}
