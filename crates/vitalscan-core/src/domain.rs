//! Session-level data model: demographics, scan parameters, state and report

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::bp_model::BpResult;
use crate::config::ScanConfig;
use crate::error::ScanError;
use vitalscan_signals::{HarmonicCorrection, HrvResult, ProjectionMethod, StressResult};

/// Wellness disclaimer attached to every report
pub const DISCLAIMER: &str = "This is a WELLNESS ESTIMATION tool, NOT a medical device. \
Heart rate, HRV, blood pressure and stress values are ESTIMATES derived from remote \
photoplethysmography (rPPG) and a lightweight regression model. They have NOT been \
validated for clinical use. Do NOT make medical decisions based on these readings. \
Consult a qualified healthcare professional for diagnosis or treatment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

/// User demographics required by the blood-pressure model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    /// Years, 10..=120
    pub age: u32,
    pub gender: Gender,
    /// 100..=250
    pub height_cm: f32,
    /// 20..=300
    pub weight_kg: f32,
}

impl Demographics {
    pub fn validate(&self) -> Result<(), ScanError> {
        if !(10..=120).contains(&self.age) {
            return Err(ScanError::InvalidParameters(format!(
                "age must be in [10, 120], got {}",
                self.age
            )));
        }
        if !(100.0..=250.0).contains(&self.height_cm) {
            return Err(ScanError::InvalidParameters(format!(
                "height_cm must be in [100, 250], got {}",
                self.height_cm
            )));
        }
        if !(20.0..=300.0).contains(&self.weight_kg) {
            return Err(ScanError::InvalidParameters(format!(
                "weight_kg must be in [20, 300], got {}",
                self.weight_kg
            )));
        }
        Ok(())
    }

    /// Body-mass index, kg / m²
    pub fn bmi(&self) -> f32 {
        let height_m = self.height_cm / 100.0;
        self.weight_kg / (height_m * height_m)
    }

    /// 1.0 for male, 0.0 otherwise
    pub fn gender_flag(&self) -> f32 {
        if self.gender == Gender::Male {
            1.0
        } else {
            0.0
        }
    }
}

/// Parameters fixed at scan start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    pub method: ProjectionMethod,
    pub duration_sec: u32,
}

impl ScanParams {
    pub fn new(method: ProjectionMethod, duration_sec: u32) -> Self {
        Self {
            method,
            duration_sec,
        }
    }

    /// Defaults taken from the `[scan]` config section
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.default_method, config.default_duration_sec)
    }

    pub fn validate(&self, config: &ScanConfig) -> Result<(), ScanError> {
        if !(config.min_duration_sec..=config.max_duration_sec).contains(&self.duration_sec) {
            return Err(ScanError::InvalidParameters(format!(
                "duration must be in [{}, {}] seconds, got {}",
                config.min_duration_sec, config.max_duration_sec, self.duration_sec
            )));
        }
        Ok(())
    }
}

impl Default for ScanParams {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Scanning,
    Complete,
    Error,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Complete => "complete",
            ScanState::Error => "error",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where samples come from during a scan; fixed for the scan's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Session-owned capture loop, wall-clock progress
    Camera,
    /// Caller pushes frames/ROIs together with a progress value
    External,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Camera => "camera",
            ScanMode::External => "external",
        }
    }
}

/// Snapshot returned by status polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStatus {
    pub state: ScanState,
    /// Present only while scanning
    pub progress_percent: Option<f32>,
    pub message: String,
    /// Failure description while in `error`
    pub error: Option<String>,
}

impl ScanStatus {
    pub(crate) fn new(state: ScanState, progress: f32, error: Option<String>) -> Self {
        let message = match state {
            ScanState::Idle => "No scan in progress. Start a scan to begin.".to_string(),
            ScanState::Scanning => format!(
                "Scan in progress - {:.0}% complete. Keep your face visible.",
                progress
            ),
            ScanState::Complete => "Scan complete! Results are ready.".to_string(),
            ScanState::Error => "Scan encountered an error. Check logs or restart.".to_string(),
        };
        Self {
            state,
            progress_percent: (state == ScanState::Scanning).then_some(progress),
            message,
            error: if state == ScanState::Error { error } else { None },
        }
    }
}

/// Liveness summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: String,
    pub scan_state: ScanState,
    pub progress_percent: Option<f32>,
}

/// Heart-rate block of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrReport {
    pub hr_bpm: f32,
    pub hr_fft: f32,
    pub hr_peaks: f32,
    pub confidence_fft: f32,
    pub confidence_peaks: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harmonic_correction: Option<HarmonicCorrection>,
}

/// Complete scan result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub disclaimer: String,
    pub hr: HrReport,
    pub hrv: HrvResult,
    pub blood_pressure: BpResult,
    pub stress: StressResult,
    pub scan_duration_seconds: f32,
    pub algorithm_used: ProjectionMethod,
    pub valid_samples: usize,
    pub sampling_rate_hz: f32,
}

impl ScanReport {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn round_to(value: f32, decimals: i32) -> f32 {
    let scale = 10f32.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn adult() -> Demographics {
        Demographics {
            age: 40,
            gender: Gender::Male,
            height_cm: 180.0,
            weight_kg: 81.0,
        }
    }

    #[test]
    fn test_bmi_and_gender_flag() {
        let d = adult();
        assert_relative_eq!(d.bmi(), 25.0, epsilon = 1e-4);
        assert_eq!(d.gender_flag(), 1.0);

        let d = Demographics { gender: Gender::Other, ..adult() };
        assert_eq!(d.gender_flag(), 0.0);
    }

    #[test]
    fn test_demographics_validation() {
        assert!(adult().validate().is_ok());
        assert!(Demographics { age: 5, ..adult() }.validate().is_err());
        assert!(Demographics { height_cm: 80.0, ..adult() }.validate().is_err());
        assert!(Demographics { weight_kg: 400.0, ..adult() }.validate().is_err());
    }

    #[test]
    fn test_duration_bounds() {
        let cfg = ScanConfig::default();
        assert!(ScanParams::new(ProjectionMethod::Pos, 20).validate(&cfg).is_ok());
        assert!(ScanParams::new(ProjectionMethod::Pos, 120).validate(&cfg).is_ok());
        assert!(ScanParams::new(ProjectionMethod::Chrom, 19).validate(&cfg).is_err());
        assert!(ScanParams::new(ProjectionMethod::Chrom, 121).validate(&cfg).is_err());
        assert_eq!(ScanParams::default().duration_sec, 45);
    }

    #[test]
    fn test_status_messages() {
        let status = ScanStatus::new(ScanState::Scanning, 42.4, None);
        assert_eq!(status.progress_percent, Some(42.4));
        assert!(status.message.contains("42%"));

        let status = ScanStatus::new(ScanState::Error, 10.0, Some("no face".into()));
        assert_eq!(status.progress_percent, None);
        assert_eq!(status.error.as_deref(), Some("no face"));

        let status = ScanStatus::new(ScanState::Idle, 0.0, Some("stale".into()));
        assert_eq!(status.error, None);
    }

    #[test]
    fn test_gender_parsing() {
        assert_eq!("Male".parse::<Gender>(), Ok(Gender::Male));
        assert_eq!("f".parse::<Gender>(), Ok(Gender::Female));
        assert!("x".parse::<Gender>().is_err());
    }

    #[test]
    fn test_round_to() {
        assert_relative_eq!(round_to(71.96, 1), 72.0);
        assert_relative_eq!(round_to(0.12345, 3), 0.123);
    }
}
