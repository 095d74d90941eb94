//! Boundaries to the camera and the face/landmark detector
//!
//! The session never decodes images or finds faces itself: a [`FrameSource`]
//! delivers frames and a [`FaceDetector`] turns each frame into an
//! [`RoiSample`]. Detectors are opened per scan through a
//! [`DetectorFactory`] and always closed when the scan ends, whichever way
//! it ends.

use ndarray::{s, Array3};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ScanError;
use vitalscan_signals::RoiSample;

/// One RGB frame, `(height, width, 3)`
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub pixels: Array3<u8>,
    pub timestamp_ms: i64,
}

impl Frame {
    pub fn new(pixels: Array3<u8>, timestamp_ms: i64) -> Self {
        Self {
            pixels,
            timestamp_ms,
        }
    }

    /// Uniformly coloured frame
    pub fn filled(height: usize, width: usize, rgb: [u8; 3], timestamp_ms: i64) -> Self {
        let pixels = Array3::from_shape_fn((height, width, 3), |(_, _, c)| rgb[c]);
        Self::new(pixels, timestamp_ms)
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }
}

/// Face/landmark detector for a single scan
pub trait FaceDetector: Send {
    /// ROI sample for `frame`; `detected == false` when no face was found.
    fn detect(&mut self, frame: &Frame) -> RoiSample;

    /// Release detector resources. Called exactly once per opened detector.
    fn close(&mut self) {}
}

/// Opens a fresh detector for every scan
pub trait DetectorFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn FaceDetector>, ScanError>;
}

impl<F> DetectorFactory for F
where
    F: Fn() -> Result<Box<dyn FaceDetector>, ScanError> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn FaceDetector>, ScanError> {
        self()
    }
}

/// Camera-like frame producer used by capture mode
pub trait FrameSource: Send {
    /// Block until a frame is available or `timeout` expires.
    fn wait_for_frame(&mut self, timeout: Duration) -> Option<Frame>;

    /// Most recent frame not yet consumed, without blocking.
    fn latest_frame(&mut self) -> Option<Frame>;

    fn release(&mut self) {}
}

/// Closes the wrapped detector on drop
pub struct DetectorGuard {
    detector: Option<Box<dyn FaceDetector>>,
}

impl DetectorGuard {
    pub fn open(factory: &Arc<dyn DetectorFactory>) -> Result<Self, ScanError> {
        Ok(Self {
            detector: Some(factory.open()?),
        })
    }

    pub fn detect(&mut self, frame: &Frame) -> Option<RoiSample> {
        self.detector.as_mut().map(|d| d.detect(frame))
    }
}

impl Drop for DetectorGuard {
    fn drop(&mut self) {
        if let Some(mut detector) = self.detector.take() {
            detector.close();
            log::debug!("Face detector closed");
        }
    }
}

/// Releases the wrapped frame source on drop, unwinding included
pub struct SourceGuard {
    source: Option<Box<dyn FrameSource>>,
}

impl SourceGuard {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self { source: Some(source) }
    }

    pub fn wait_for_frame(&mut self, timeout: Duration) -> Option<Frame> {
        self.source.as_mut().and_then(|s| s.wait_for_frame(timeout))
    }

    pub fn latest_frame(&mut self) -> Option<Frame> {
        self.source.as_mut().and_then(|s| s.latest_frame())
    }

    /// Release now; later calls and the drop are no-ops.
    pub fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.release();
            log::debug!("Frame source released");
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Averages a fixed central skin patch of every frame.
///
/// Stands in for a landmark detector when the subject is known to be
/// centred (kiosk setups, synthetic streams). A frame counts as "no face"
/// when the patch is too dark or saturated to carry a pulse.
#[derive(Debug, Clone)]
pub struct CenterPatchDetector {
    /// Patch size as a fraction of the frame's height and width
    pub patch_fraction: f32,
    pub min_brightness: f32,
    pub max_brightness: f32,
}

impl Default for CenterPatchDetector {
    fn default() -> Self {
        Self {
            patch_fraction: 0.4,
            min_brightness: 20.0,
            max_brightness: 250.0,
        }
    }
}

impl CenterPatchDetector {
    pub fn factory() -> Arc<dyn DetectorFactory> {
        Arc::new(|| Ok::<_, ScanError>(Box::new(CenterPatchDetector::default()) as Box<dyn FaceDetector>))
    }
}

impl FaceDetector for CenterPatchDetector {
    fn detect(&mut self, frame: &Frame) -> RoiSample {
        let (h, w, c) = frame.pixels.dim();
        if h == 0 || w == 0 || c < 3 {
            return RoiSample::missing(frame.timestamp_ms);
        }

        let ph = ((h as f32 * self.patch_fraction) as usize).clamp(1, h);
        let pw = ((w as f32 * self.patch_fraction) as usize).clamp(1, w);
        let top = (h - ph) / 2;
        let left = (w - pw) / 2;
        let patch = frame.pixels.slice(s![top..top + ph, left..left + pw, ..]);

        let count = (ph * pw) as f32;
        let mut rgb = [0.0f32; 3];
        for (ch, value) in rgb.iter_mut().enumerate() {
            *value = patch.slice(s![.., .., ch]).iter().map(|&p| p as f32).sum::<f32>() / count;
        }

        let brightness = (rgb[0] + rgb[1] + rgb[2]) / 3.0;
        if brightness < self.min_brightness || brightness > self.max_brightness {
            return RoiSample::missing(frame.timestamp_ms);
        }

        let corners = vec![
            (left as f32, top as f32),
            ((left + pw) as f32, top as f32),
            ((left + pw) as f32, (top + ph) as f32),
            (left as f32, (top + ph) as f32),
        ];
        RoiSample::detected(rgb, frame.timestamp_ms).with_landmarks(corners)
    }
}
