use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use vitalscan_signals::{ExtractorConfig, HeartRateConfig, ProjectionMethod};

/// Prefix for environment overrides, e.g. `VITALSCAN_SCAN_DEFAULT_DURATION_SEC=30`
pub const ENV_PREFIX: &str = "VITALSCAN_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable error: {0}")]
    EnvVar(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalScanConfig {
    pub capture: CaptureConfig,
    pub scan: ScanConfig,
    pub signal: SignalConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Frame/ROI rate the pipeline assumes (Hz)
    pub sampling_rate_hz: f32,
    /// Bound on the wait for the first camera frame
    pub camera_ready_timeout_ms: u64,
    /// Sleep between capture-loop iterations when no new frame is available
    pub capture_poll_interval_ms: u64,
    /// Progress at which the one-shot finalize is triggered (%)
    pub completion_threshold_pct: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub default_duration_sec: u32,
    pub min_duration_sec: u32,
    pub max_duration_sec: u32,
    pub default_method: ProjectionMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub band_low_hz: f32,
    pub band_high_hz: f32,
    pub detrend_window_sec: f32,
    pub pos_window_sec: f32,
    pub min_cardiac_cycles: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Size of the synthetic training cohort for the BP regression
    pub training_samples: usize,
    pub seed: u64,
    /// L2 penalty of the ridge fit
    pub ridge_lambda: f64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 30.0,
            camera_ready_timeout_ms: 3000,
            capture_poll_interval_ms: 10,
            completion_threshold_pct: 99.9,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            default_duration_sec: 45,
            min_duration_sec: 20,
            max_duration_sec: 120,
            default_method: ProjectionMethod::Pos,
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        let extractor = ExtractorConfig::default();
        Self {
            band_low_hz: extractor.band_low_hz,
            band_high_hz: extractor.band_high_hz,
            detrend_window_sec: extractor.detrend_window_sec,
            pos_window_sec: extractor.pos_window_sec,
            min_cardiac_cycles: extractor.min_cardiac_cycles,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            training_samples: 2000,
            seed: 42,
            ridge_lambda: 1.0,
        }
    }
}

impl SignalConfig {
    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            band_low_hz: self.band_low_hz,
            band_high_hz: self.band_high_hz,
            detrend_window_sec: self.detrend_window_sec,
            pos_window_sec: self.pos_window_sec,
            min_cardiac_cycles: self.min_cardiac_cycles,
        }
    }

    pub fn heart_rate_config(&self) -> HeartRateConfig {
        HeartRateConfig {
            band_low_hz: self.band_low_hz,
            band_high_hz: self.band_high_hz,
            ..HeartRateConfig::default()
        }
    }
}

impl VitalScanConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: VitalScanConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if given and present)
    /// 3. Built-in defaults (lowest priority)
    pub fn load_layered(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = VitalScanConfig::default();

        if let Some(path) = path {
            if path.exists() {
                config = Self::from_file(path)?;
            } else {
                log::warn!("Config file {} not found, using defaults", path.display());
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply `VITALSCAN_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (keys without prefix
    /// handling; the lookup receives full `VITALSCAN_*` names).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Capture overrides
        override_from(&lookup, "CAPTURE_SAMPLING_RATE_HZ", &mut self.capture.sampling_rate_hz)?;
        override_from(&lookup, "CAPTURE_CAMERA_READY_TIMEOUT_MS", &mut self.capture.camera_ready_timeout_ms)?;
        override_from(&lookup, "CAPTURE_POLL_INTERVAL_MS", &mut self.capture.capture_poll_interval_ms)?;
        override_from(&lookup, "CAPTURE_COMPLETION_THRESHOLD_PCT", &mut self.capture.completion_threshold_pct)?;

        // Scan overrides
        override_from(&lookup, "SCAN_DEFAULT_DURATION_SEC", &mut self.scan.default_duration_sec)?;
        override_from(&lookup, "SCAN_MIN_DURATION_SEC", &mut self.scan.min_duration_sec)?;
        override_from(&lookup, "SCAN_MAX_DURATION_SEC", &mut self.scan.max_duration_sec)?;
        override_from(&lookup, "SCAN_DEFAULT_METHOD", &mut self.scan.default_method)?;

        // Signal overrides
        override_from(&lookup, "SIGNAL_BAND_LOW_HZ", &mut self.signal.band_low_hz)?;
        override_from(&lookup, "SIGNAL_BAND_HIGH_HZ", &mut self.signal.band_high_hz)?;
        override_from(&lookup, "SIGNAL_DETREND_WINDOW_SEC", &mut self.signal.detrend_window_sec)?;
        override_from(&lookup, "SIGNAL_POS_WINDOW_SEC", &mut self.signal.pos_window_sec)?;
        override_from(&lookup, "SIGNAL_MIN_CARDIAC_CYCLES", &mut self.signal.min_cardiac_cycles)?;

        // Model overrides
        override_from(&lookup, "MODEL_TRAINING_SAMPLES", &mut self.model.training_samples)?;
        override_from(&lookup, "MODEL_SEED", &mut self.model.seed)?;
        override_from(&lookup, "MODEL_RIDGE_LAMBDA", &mut self.model.ridge_lambda)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Capture validation
        let fs = self.capture.sampling_rate_hz;
        if !(fs.is_finite() && fs > 0.0) {
            return Err(ConfigError::Validation(
                "capture.sampling_rate_hz must be positive".to_string(),
            ));
        }
        let threshold = self.capture.completion_threshold_pct;
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(ConfigError::Validation(
                "capture.completion_threshold_pct must be in (0, 100]".to_string(),
            ));
        }
        if self.capture.camera_ready_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "capture.camera_ready_timeout_ms must be > 0".to_string(),
            ));
        }

        // Scan validation
        let scan = &self.scan;
        if scan.min_duration_sec < 20 || scan.max_duration_sec > 120 || scan.min_duration_sec > scan.max_duration_sec {
            return Err(ConfigError::Validation(
                "scan duration bounds must satisfy 20 <= min_duration_sec <= max_duration_sec <= 120".to_string(),
            ));
        }
        if !(scan.min_duration_sec..=scan.max_duration_sec).contains(&scan.default_duration_sec) {
            return Err(ConfigError::Validation(
                "scan.default_duration_sec must be within [min_duration_sec, max_duration_sec]".to_string(),
            ));
        }

        // Signal validation
        let signal = &self.signal;
        if !(signal.band_low_hz > 0.0 && signal.band_low_hz < signal.band_high_hz) {
            return Err(ConfigError::Validation(
                "signal.band_low_hz must be in (0, band_high_hz)".to_string(),
            ));
        }
        if signal.band_high_hz >= fs / 2.0 {
            return Err(ConfigError::Validation(
                "signal.band_high_hz must be below the Nyquist frequency".to_string(),
            ));
        }
        if signal.detrend_window_sec <= 0.0 || signal.pos_window_sec <= 0.0 {
            return Err(ConfigError::Validation(
                "signal windows must be positive".to_string(),
            ));
        }
        if signal.min_cardiac_cycles <= 0.0 {
            return Err(ConfigError::Validation(
                "signal.min_cardiac_cycles must be positive".to_string(),
            ));
        }

        // Model validation
        if self.model.training_samples < 50 {
            return Err(ConfigError::Validation(
                "model.training_samples must be >= 50".to_string(),
            ));
        }
        if self.model.ridge_lambda < 0.0 {
            return Err(ConfigError::Validation(
                "model.ridge_lambda must be non-negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self
            .to_toml_string()
            .map_err(|e| ConfigError::Validation(format!("TOML serialization error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn override_from<T, F>(lookup: &F, key: &str, field: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let name = format!("{}{}", ENV_PREFIX, key);
    if let Some(val) = lookup(&name) {
        *field = val
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVar(format!("Invalid {}", name)))?;
    }
    Ok(())
}
