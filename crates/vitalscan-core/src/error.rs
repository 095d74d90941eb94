use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use vitalscan_signals::SignalError;

/// Coarse failure class, used by transports to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rejected before any state change (missing demographics, scan active,
    /// bad parameters)
    Configuration,
    /// No usable frames from the camera/detector
    Acquisition,
    /// Not enough signal to estimate anything
    Signal,
    /// Anything else that went wrong inside the pipeline
    Unexpected,
    /// Result/status queries that cannot be answered in the current state
    Query,
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Demographics must be set before starting a scan")]
    MissingDemographics,

    #[error("A scan is already in progress")]
    AlreadyScanning,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("No scan in progress")]
    NotScanning,

    #[error("Scan is running in {active} mode, {requested} input rejected")]
    WrongMode { active: &'static str, requested: &'static str },

    #[error("Acquisition error: {0}")]
    Acquisition(String),

    #[error("Face detector error: {0}")]
    Detector(String),

    #[error("Signal processing error: {0}")]
    Signal(#[from] SignalError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Scan still in progress")]
    NotReady,

    #[error("No scan results available")]
    NotFound,

    #[error("Scan failed: {0}")]
    Failed(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ScanError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScanError::MissingDemographics
            | ScanError::AlreadyScanning
            | ScanError::InvalidParameters(_)
            | ScanError::WrongMode { .. }
            | ScanError::Config(_) => ErrorCategory::Configuration,
            ScanError::Acquisition(_) | ScanError::Detector(_) => ErrorCategory::Acquisition,
            ScanError::Signal(_) => ErrorCategory::Signal,
            ScanError::Model(_) | ScanError::Unexpected(_) => ErrorCategory::Unexpected,
            ScanError::NotScanning | ScanError::NotReady | ScanError::NotFound | ScanError::Failed(_) => {
                ErrorCategory::Query
            }
        }
    }

    /// Start rejected because another scan is active
    pub fn is_conflict(&self) -> bool {
        matches!(self, ScanError::AlreadyScanning)
    }

    /// Start rejected because a prerequisite is missing
    pub fn is_precondition(&self) -> bool {
        matches!(self, ScanError::MissingDemographics)
    }
}
