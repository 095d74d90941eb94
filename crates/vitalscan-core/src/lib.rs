//! # vitalscan-core
//!
//! Scan sessions on top of `vitalscan-signals`: demographics and scan
//! parameters, layered configuration, the blood-pressure regression, the
//! vitals pipeline and the thread-safe [`ScanOrchestrator`].
//!
//! ```ignore
//! use vitalscan_core::{Demographics, Gender, ScanOrchestrator, ScanParams, SyntheticFace, VitalScanConfig};
//!
//! let session = ScanOrchestrator::new(VitalScanConfig::default())?;
//! session.set_demographics(Demographics { age: 35, gender: Gender::Female, height_cm: 165.0, weight_kg: 60.0 })?;
//! session.start_scan(ScanParams::default())?;
//!
//! let samples = SyntheticFace::new(72.0, 30.0).take_seconds(45.0);
//! let n = samples.len();
//! for (i, roi) in samples.into_iter().enumerate() {
//!     session.push_roi(roi, 100.0 * (i + 1) as f32 / n as f32)?;
//! }
//! // poll session.status() until complete, then session.result()
//! ```

pub mod bp_model;
pub mod config;
pub mod detector;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod simulate;

pub use bp_model::{BloodPressureEstimator, BpCategory, BpFeatures, BpResult};
pub use config::{ConfigError, VitalScanConfig};
pub use detector::{CenterPatchDetector, DetectorFactory, FaceDetector, Frame, FrameSource};
pub use domain::{
    Demographics, Gender, HealthSummary, HrReport, ScanMode, ScanParams, ScanReport, ScanState, ScanStatus,
    DISCLAIMER,
};
pub use error::{ErrorCategory, ScanError};
pub use pipeline::{PipelineInput, VitalsPipeline};
pub use session::{Preview, ScanOrchestrator};
pub use simulate::SyntheticFace;
