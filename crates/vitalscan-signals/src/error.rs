use thiserror::Error;

/// Failures raised by the signal-processing stages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("insufficient data: {valid} valid samples, at least {required} required")]
    InsufficientData { valid: usize, required: usize },

    #[error("invalid sampling rate: {0} Hz")]
    InvalidSamplingRate(f32),

    #[error("invalid band: {low} Hz .. {high} Hz at fs = {fs} Hz")]
    InvalidBand { low: f32, high: f32, fs: f32 },
}
