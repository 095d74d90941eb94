//! # vitalscan-signals
//!
//! Signal processing for camera-based vital-sign scans.
//!
//! This crate provides:
//! - **rPPG extraction**: CHROM and POS projections that turn facial ROI
//!   colour samples into a single pulse waveform
//! - **DSP functions**: zero-phase bandpass, sliding-window detrending,
//!   power spectrum and peak detection
//! - **Physiological estimators**: fused heart rate, HRV statistics and a
//!   stress heuristic
//!
//! ## Example
//!
//! ```ignore
//! use vitalscan_signals::{HeartRateEstimator, HrvAnalyzer, ProjectionMethod, PulseExtractor, RoiSample};
//!
//! let mut extractor = PulseExtractor::new(ProjectionMethod::Pos, 30.0, 900);
//! for roi in rois {
//!     extractor.accumulate(&roi);
//! }
//!
//! let pulse = extractor.finalize()?;
//! let hr = HeartRateEstimator::new().estimate(&pulse.samples, pulse.sampling_rate);
//! let hrv = HrvAnalyzer::new().compute(&hr.intervals_sec);
//! println!("HR {:.1} BPM, RMSSD {:?} ms", hr.bpm, hrv.rmssd_ms);
//! ```

pub mod dsp;
mod error;
pub mod physio;
pub mod rppg;

pub use error::SignalError;
pub use physio::{
    HarmonicCorrection, HeartRateConfig, HeartRateEstimator, HrResult, HrvAnalyzer, HrvResult,
    StressConfidence, StressEstimator, StressLevel, StressResult,
};
pub use rppg::{
    ExtractorConfig, ProjectionMethod, PulseBuffer, PulseExtractor, PulseWaveform, RoiSample,
};

/// Lower edge of the cardiac band (Hz), 42 BPM.
pub const CARDIAC_LOW_HZ: f32 = 0.7;
/// Upper edge of the cardiac band (Hz), 240 BPM.
pub const CARDIAC_HIGH_HZ: f32 = 4.0;
