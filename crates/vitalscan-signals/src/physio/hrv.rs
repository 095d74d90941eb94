//! Time-domain heart-rate variability from inter-beat intervals

use serde::{Deserialize, Serialize};

/// Successive differences above this count towards pNN50 (ms)
const NN50_THRESHOLD_MS: f32 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrvResult {
    /// `false` when fewer than two intervals were available
    pub valid: bool,
    pub rmssd_ms: Option<f32>,
    pub sdnn_ms: Option<f32>,
    /// Percentage of successive differences above 50 ms
    pub pnn50: Option<f32>,
    pub mean_rr_ms: Option<f32>,
    /// Number of beats behind the intervals (`intervals + 1`, or 0)
    pub num_beats: usize,
}

impl HrvResult {
    fn empty() -> Self {
        Self {
            valid: false,
            rmssd_ms: None,
            sdnn_ms: None,
            pnn50: None,
            mean_rr_ms: None,
            num_beats: 0,
        }
    }
}

/// HRV analyzer (stateless)
#[derive(Debug, Clone, Copy, Default)]
pub struct HrvAnalyzer;

impl HrvAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Compute RMSSD, SDNN and pNN50 from intervals given in seconds.
    pub fn compute(&self, intervals_sec: &[f32]) -> HrvResult {
        if intervals_sec.len() < 2 {
            return HrvResult::empty();
        }

        let rr_ms: Vec<f32> = intervals_sec.iter().map(|rr| rr * 1000.0).collect();
        let n = rr_ms.len() as f32;

        let mean = rr_ms.iter().sum::<f32>() / n;
        let var = rr_ms.iter().map(|rr| (rr - mean).powi(2)).sum::<f32>() / n;
        let sdnn = var.sqrt();

        let diffs: Vec<f32> = rr_ms.windows(2).map(|w| w[1] - w[0]).collect();
        let rmssd = (diffs.iter().map(|d| d * d).sum::<f32>() / diffs.len() as f32).sqrt();
        let nn50 = diffs.iter().filter(|d| d.abs() > NN50_THRESHOLD_MS).count();
        let pnn50 = 100.0 * nn50 as f32 / diffs.len() as f32;

        log::debug!(
            "HRV: RMSSD={:.1}ms SDNN={:.1}ms pNN50={:.1}% over {} intervals",
            rmssd,
            sdnn,
            pnn50,
            rr_ms.len()
        );

        HrvResult {
            valid: true,
            rmssd_ms: Some(rmssd),
            sdnn_ms: Some(sdnn),
            pnn50: Some(pnn50),
            mean_rr_ms: Some(mean),
            num_beats: rr_ms.len() + 1,
        }
    }
}
