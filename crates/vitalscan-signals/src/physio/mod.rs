//! Physiological estimators fed by the pulse waveform

mod heart_rate;
mod hrv;
mod stress;

pub use heart_rate::{
    HarmonicCorrection, HeartRateConfig, HeartRateEstimator, HrResult, PeakEstimate, SpectralEstimate,
};
pub use hrv::{HrvAnalyzer, HrvResult};
pub use stress::{StressConfidence, StressEstimator, StressLevel, StressResult};
