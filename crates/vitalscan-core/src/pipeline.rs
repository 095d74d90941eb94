//! Finalize-and-estimate: buffered ROI colours to a complete report

use crate::bp_model::{BloodPressureEstimator, BpFeatures};
use crate::config::VitalScanConfig;
use crate::domain::{round_to, Demographics, HrReport, ScanReport, DISCLAIMER};
use crate::error::ScanError;
use vitalscan_signals::{
    HeartRateEstimator, HrvAnalyzer, HrvResult, ProjectionMethod, PulseBuffer, PulseExtractor, StressEstimator,
};

/// Substituted for missing (or zero) HRV statistics before BP inference
pub const FALLBACK_RMSSD_MS: f32 = 30.0;
pub const FALLBACK_SDNN_MS: f32 = 20.0;
pub const FALLBACK_PNN50: f32 = 10.0;

/// Everything one pipeline run needs, captured when processing is triggered
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub buffer: PulseBuffer,
    pub method: ProjectionMethod,
    pub demographics: Demographics,
    pub scan_duration_sec: f32,
}

/// Stateless chain PulseExtractor -> HR -> HRV -> {BP, stress}
pub struct VitalsPipeline<'a> {
    config: &'a VitalScanConfig,
    bp_model: &'a BloodPressureEstimator,
}

impl<'a> VitalsPipeline<'a> {
    pub fn new(config: &'a VitalScanConfig, bp_model: &'a BloodPressureEstimator) -> Self {
        Self { config, bp_model }
    }

    pub fn run(&self, input: PipelineInput) -> Result<ScanReport, ScanError> {
        let valid_samples = input.buffer.len();
        let extractor = PulseExtractor::with_config(input.method, self.config.signal.extractor_config(), input.buffer);

        // Pulse waveform; insufficient data surfaces as a signal error
        let pulse = extractor.finalize()?;

        // Heart rate
        let hr = HeartRateEstimator::with_config(self.config.signal.heart_rate_config())
            .estimate(&pulse.samples, pulse.sampling_rate);

        // HRV
        let hrv = HrvAnalyzer::new().compute(&hr.intervals_sec);

        // Blood pressure
        let demographics = &input.demographics;
        let features = BpFeatures {
            hr_bpm: hr.bpm,
            rmssd_ms: or_fallback(hrv.rmssd_ms, FALLBACK_RMSSD_MS),
            sdnn_ms: or_fallback(hrv.sdnn_ms, FALLBACK_SDNN_MS),
            pnn50: or_fallback(hrv.pnn50, FALLBACK_PNN50),
            age: demographics.age as f32,
            gender_male: demographics.gender_flag(),
            bmi: demographics.bmi(),
        };
        let blood_pressure = self.bp_model.predict(&features);

        // Stress
        let stress = StressEstimator::new().estimate(hr.bpm, hrv.rmssd_ms, hrv.sdnn_ms);

        log::info!(
            "Scan processed. HR={:.1} BPM, BP={}/{} mmHg, stress={}",
            hr.bpm,
            blood_pressure.systolic,
            blood_pressure.diastolic,
            stress.level
        );

        Ok(ScanReport {
            disclaimer: DISCLAIMER.to_string(),
            hr: HrReport {
                hr_bpm: round_to(hr.bpm, 1),
                hr_fft: round_to(hr.fft_bpm, 1),
                hr_peaks: round_to(hr.peak_bpm, 1),
                confidence_fft: round_to(hr.fft_confidence, 3),
                confidence_peaks: round_to(hr.peak_confidence, 3),
                harmonic_correction: hr.harmonic_correction,
            },
            hrv: rounded_hrv(hrv),
            blood_pressure,
            stress,
            scan_duration_seconds: round_to(input.scan_duration_sec, 1),
            algorithm_used: input.method,
            valid_samples,
            sampling_rate_hz: pulse.sampling_rate,
        })
    }
}

/// Zero counts as missing, matching the truthiness check of the fallback rule.
fn or_fallback(value: Option<f32>, fallback: f32) -> f32 {
    value.filter(|v| v.is_finite() && *v != 0.0).unwrap_or(fallback)
}

fn rounded_hrv(hrv: HrvResult) -> HrvResult {
    HrvResult {
        rmssd_ms: hrv.rmssd_ms.map(|v| round_to(v, 1)),
        sdnn_ms: hrv.sdnn_ms.map(|v| round_to(v, 1)),
        pnn50: hrv.pnn50.map(|v| round_to(v, 1)),
        mean_rr_ms: hrv.mean_rr_ms.map(|v| round_to(v, 1)),
        ..hrv
    }
}
