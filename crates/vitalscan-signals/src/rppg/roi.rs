use serde::{Deserialize, Serialize};

/// One frame's facial skin-region colour measurement.
///
/// `rgb` holds the mean red, green and blue values over the skin ROIs. When
/// `detected` is false the colour is meaningless and downstream stages ignore
/// the sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiSample {
    pub rgb: [f32; 3],
    pub detected: bool,
    /// Facial landmark points in pixel coordinates (may be empty)
    #[serde(default)]
    pub landmarks: Vec<(f32, f32)>,
    /// Capture time in milliseconds
    pub timestamp_ms: i64,
}

impl RoiSample {
    /// Sample from a frame where a face was found.
    pub fn detected(rgb: [f32; 3], timestamp_ms: i64) -> Self {
        Self {
            rgb,
            detected: true,
            landmarks: Vec::new(),
            timestamp_ms,
        }
    }

    /// "No face" marker for a frame.
    pub fn missing(timestamp_ms: i64) -> Self {
        Self {
            rgb: [0.0; 3],
            detected: false,
            landmarks: Vec::new(),
            timestamp_ms,
        }
    }

    pub fn with_landmarks(mut self, landmarks: Vec<(f32, f32)>) -> Self {
        self.landmarks = landmarks;
        self
    }

    /// Detected and every channel finite.
    pub fn is_usable(&self) -> bool {
        self.detected && self.rgb.iter().all(|c| c.is_finite())
    }
}
