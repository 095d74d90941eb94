//! Scan session orchestration
//!
//! One [`ScanOrchestrator`] owns the whole scan lifecycle:
//!
//! ```text
//! idle --start--> scanning --(progress >= threshold)--> processing --> complete | error
//!   ^                                                                        |
//!   +----------------------------------- reset ------------------------------+
//! ```
//!
//! All mutable session state sits behind one `parking_lot::Mutex` that is
//! held only while state is read or mutated. Signal processing runs on a
//! snapshot of the buffer in a background thread, started at most once per
//! scan. Every scan gets a fresh epoch; background work publishes only if
//! its epoch is still current, so a reset or restart silently invalidates
//! in-flight results.

use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crate::bp_model::BloodPressureEstimator;
use crate::config::VitalScanConfig;
use crate::detector::{CenterPatchDetector, DetectorFactory, DetectorGuard, Frame, FrameSource, SourceGuard};
use crate::domain::{round_to, Demographics, HealthSummary, ScanMode, ScanParams, ScanReport, ScanState, ScanStatus};
use crate::error::ScanError;
use crate::pipeline::{PipelineInput, VitalsPipeline};
use vitalscan_signals::{PulseBuffer, RoiSample};

/// Latest sample/frame seen by the session, for overlay rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preview {
    pub roi: Option<RoiSample>,
    pub frame: Option<Frame>,
}

struct ActiveScan {
    params: ScanParams,
    mode: ScanMode,
    demographics: Demographics,
    buffer: PulseBuffer,
    processing_started: bool,
}

struct SessionState {
    state: ScanState,
    epoch: u64,
    progress: f32,
    error: Option<String>,
    report: Option<ScanReport>,
    demographics: Option<Demographics>,
    active: Option<ActiveScan>,
    preview: Preview,
}

impl SessionState {
    fn new() -> Self {
        Self {
            state: ScanState::Idle,
            epoch: 0,
            progress: 0.0,
            error: None,
            report: None,
            demographics: None,
            active: None,
            preview: Preview::default(),
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.state == ScanState::Scanning
    }
}

struct Inner {
    config: VitalScanConfig,
    state: Mutex<SessionState>,
    /// Detector used by `push_frame`, tagged with the scan epoch that opened it
    frame_detector: Mutex<Option<(u64, DetectorGuard)>>,
    detectors: Arc<dyn DetectorFactory>,
    bp_model: OnceLock<Result<BloodPressureEstimator, String>>,
    finalize_runs: AtomicUsize,
}

/// Single-tenant scan session.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct ScanOrchestrator {
    inner: Arc<Inner>,
}

impl ScanOrchestrator {
    /// Session using the built-in centre-patch detector for `push_frame`.
    pub fn new(config: VitalScanConfig) -> Result<Self, ScanError> {
        Self::with_detector_factory(config, CenterPatchDetector::factory())
    }

    pub fn with_detector_factory(
        config: VitalScanConfig,
        detectors: Arc<dyn DetectorFactory>,
    ) -> Result<Self, ScanError> {
        config.validate()?;
        log::info!("Scan session initialised (fs={} Hz)", config.capture.sampling_rate_hz);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(SessionState::new()),
                frame_detector: Mutex::new(None),
                detectors,
                bp_model: OnceLock::new(),
                finalize_runs: AtomicUsize::new(0),
            }),
        })
    }

    pub fn config(&self) -> &VitalScanConfig {
        &self.inner.config
    }

    /// Train the blood-pressure model now instead of on first use.
    pub fn warm_up(&self) -> Result<(), ScanError> {
        self.inner.bp_model().map(|_| ())
    }

    pub fn set_demographics(&self, demographics: Demographics) -> Result<(), ScanError> {
        demographics.validate()?;
        log::info!(
            "Demographics set: age={}, gender={:?}",
            demographics.age,
            demographics.gender
        );
        self.inner.state.lock().demographics = Some(demographics);
        Ok(())
    }

    /// Start an externally-fed scan; samples arrive through
    /// [`push_roi`](Self::push_roi) or [`push_frame`](Self::push_frame).
    pub fn start_scan(&self, params: ScanParams) -> Result<(), ScanError> {
        self.inner.begin(params, ScanMode::External).map(|_| ())
    }

    /// Start a camera-driven scan.
    ///
    /// Blocks until the source delivers its first frame (bounded by
    /// `capture.camera_ready_timeout_ms`), then captures on a dedicated
    /// thread for the scan duration and processes the result. The source
    /// is released on every exit path, including a rejected start.
    pub fn start_capture(&self, params: ScanParams, source: Box<dyn FrameSource>) -> Result<(), ScanError> {
        let mut source = SourceGuard::new(source);
        let epoch = self.inner.begin(params, ScanMode::Camera)?;

        let detector = match DetectorGuard::open(&self.inner.detectors) {
            Ok(detector) => detector,
            Err(e) => {
                source.release();
                self.inner.fail(epoch, e.to_string());
                return Err(e);
            }
        };

        let timeout = Duration::from_millis(self.inner.config.capture.camera_ready_timeout_ms);
        let Some(first) = source.wait_for_frame(timeout) else {
            source.release();
            drop(detector);
            let err = ScanError::Acquisition("No frame received from camera".to_string());
            self.inner.fail(epoch, err.to_string());
            return Err(err);
        };

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("vitalscan-capture".to_string())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    Inner::capture_loop(&inner, epoch, params, source, detector, first)
                }));
                if let Err(payload) = outcome {
                    inner.fail(epoch, ScanError::Unexpected(panic_message(payload)).to_string());
                }
            });

        if let Err(e) = spawned {
            let err = ScanError::Unexpected(format!("failed to spawn capture thread: {}", e));
            self.inner.fail(epoch, err.to_string());
            return Err(err);
        }
        Ok(())
    }

    /// Append one externally detected ROI sample.
    ///
    /// Returns whether the sample was buffered. Samples without a face,
    /// samples beyond the buffer capacity and samples arriving after
    /// processing has started are not.
    pub fn push_roi(&self, sample: RoiSample, progress: f32) -> Result<bool, ScanError> {
        let epoch = self.inner.state.lock().epoch;
        self.inner.ingest(epoch, sample, None, progress)
    }

    /// Run the session's detector on `frame` and append the result.
    pub fn push_frame(&self, frame: Frame, progress: f32) -> Result<bool, ScanError> {
        let epoch = {
            let state = self.inner.state.lock();
            Inner::check_external(&state)?;
            state.epoch
        };

        // Closed outside the slot lock
        let mut retired = None;
        let roi = {
            let mut slot = self.inner.frame_detector.lock();
            // Finalize may have started while this call waited for the slot
            if !self.inner.accepts_frames(epoch)? {
                return Ok(false);
            }
            let stale = !matches!(slot.as_ref(), Some((e, _)) if *e == epoch);
            if stale {
                retired = slot.take();
                *slot = Some((epoch, DetectorGuard::open(&self.inner.detectors)?));
            }
            slot.as_mut()
                .and_then(|(_, guard)| guard.detect(&frame))
                .unwrap_or_else(|| RoiSample::missing(frame.timestamp_ms))
        };
        drop(retired);

        self.inner.ingest(epoch, roi, Some(frame), progress)
    }

    pub fn status(&self) -> ScanStatus {
        let state = self.inner.state.lock();
        ScanStatus::new(state.state, state.progress, state.error.clone())
    }

    pub fn health(&self) -> HealthSummary {
        let state = self.inner.state.lock();
        HealthSummary {
            status: "ok".to_string(),
            scan_state: state.state,
            progress_percent: (state.state == ScanState::Scanning).then_some(state.progress),
        }
    }

    /// Stored report, or the reason there is none.
    pub fn result(&self) -> Result<ScanReport, ScanError> {
        let state = self.inner.state.lock();
        match state.state {
            ScanState::Scanning => Err(ScanError::NotReady),
            ScanState::Idle => Err(ScanError::NotFound),
            ScanState::Error => Err(ScanError::Failed(
                state.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            )),
            ScanState::Complete => state
                .report
                .clone()
                .ok_or_else(|| ScanError::Failed("Result unavailable".to_string())),
        }
    }

    /// Return to `idle`, dropping buffers, preview and result.
    ///
    /// In-flight processing is not interrupted; its result is discarded.
    pub fn reset(&self) {
        {
            let mut state = self.inner.state.lock();
            let demographics = state.demographics.take();
            let epoch = state.epoch + 1;
            *state = SessionState::new();
            state.epoch = epoch;
            state.demographics = demographics;
        }
        let retired = self.inner.frame_detector.lock().take();
        drop(retired);
        log::info!("Session reset");
    }

    pub fn preview(&self) -> Preview {
        self.inner.state.lock().preview.clone()
    }

    /// Number of samples buffered for the current scan
    pub fn buffered_len(&self) -> usize {
        self.inner
            .state
            .lock()
            .active
            .as_ref()
            .map_or(0, |scan| scan.buffer.len())
    }

    /// How many times the finalize stage has run since the session was created
    pub fn finalize_count(&self) -> usize {
        self.inner.finalize_runs.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn bp_model(&self) -> Result<&BloodPressureEstimator, ScanError> {
        self.bp_model
            .get_or_init(|| BloodPressureEstimator::train(&self.config.model).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|msg| ScanError::Model(msg.clone()))
    }

    /// Transition to `scanning`; returns the new scan's epoch.
    fn begin(&self, params: ScanParams, mode: ScanMode) -> Result<u64, ScanError> {
        let mut state = self.state.lock();

        if state.state == ScanState::Scanning {
            log::warn!("Scan already in progress");
            return Err(ScanError::AlreadyScanning);
        }
        let Some(demographics) = state.demographics.clone() else {
            log::error!("Demographics not set, cannot start scan");
            return Err(ScanError::MissingDemographics);
        };
        params.validate(&self.config.scan)?;

        let fs = self.config.capture.sampling_rate_hz;
        state.epoch += 1;
        state.state = ScanState::Scanning;
        state.progress = 0.0;
        state.error = None;
        state.report = None;
        state.preview = Preview::default();
        state.active = Some(ActiveScan {
            params,
            mode,
            demographics,
            buffer: PulseBuffer::for_duration(fs, params.duration_sec as f32),
            processing_started: false,
        });

        log::info!(
            "Scan started (method={}, duration={}s, mode={})",
            params.method,
            params.duration_sec,
            mode.as_str()
        );
        Ok(state.epoch)
    }

    /// Whether a frame for `epoch` can still reach the buffer.
    fn accepts_frames(&self, epoch: u64) -> Result<bool, ScanError> {
        let state = self.state.lock();
        Self::check_external(&state)?;
        Ok(state.epoch == epoch && state.active.as_ref().is_some_and(|scan| !scan.processing_started))
    }

    fn check_external(state: &SessionState) -> Result<(), ScanError> {
        if state.state != ScanState::Scanning {
            return Err(ScanError::NotScanning);
        }
        match state.active.as_ref().map(|scan| scan.mode) {
            Some(ScanMode::External) => Ok(()),
            Some(ScanMode::Camera) => Err(ScanError::WrongMode {
                active: ScanMode::Camera.as_str(),
                requested: ScanMode::External.as_str(),
            }),
            None => Err(ScanError::NotScanning),
        }
    }

    /// Externally-fed ingestion: buffer, preview, progress and trigger.
    fn ingest(
        self: &Arc<Self>,
        epoch: u64,
        sample: RoiSample,
        frame: Option<Frame>,
        progress: f32,
    ) -> Result<bool, ScanError> {
        let threshold = self.config.capture.completion_threshold_pct;

        let (stored, trigger) = {
            let mut state = self.state.lock();
            Self::check_external(&state)?;
            if state.epoch != epoch {
                // A new scan started while the frame was in detection
                return Ok(false);
            }

            let SessionState {
                active,
                preview,
                progress: current,
                ..
            } = &mut *state;
            let Some(scan) = active.as_mut() else {
                return Err(ScanError::NotScanning);
            };
            if scan.processing_started {
                return Ok(false);
            }

            let stored = scan.buffer.push(&sample);
            preview.roi = Some(sample);
            if frame.is_some() {
                preview.frame = frame;
            }

            if progress.is_finite() {
                *current = current.max(progress.clamp(0.0, 100.0));
            }

            let trigger = if *current >= threshold {
                scan.processing_started = true;
                log::info!("Triggering processing of {} buffered samples", scan.buffer.len());
                Some(PipelineInput {
                    buffer: scan.buffer.clone(),
                    method: scan.params.method,
                    demographics: scan.demographics.clone(),
                    scan_duration_sec: scan.params.duration_sec as f32,
                })
            } else {
                None
            };
            (stored, trigger)
        };

        if let Some(input) = trigger {
            self.spawn_finalize(epoch, input);
        }
        Ok(stored)
    }

    fn spawn_finalize(self: &Arc<Self>, epoch: u64, input: PipelineInput) {
        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("vitalscan-finalize".to_string())
            .spawn(move || inner.process(epoch, input));

        if let Err(e) = spawned {
            self.fail(epoch, ScanError::Unexpected(format!("failed to spawn worker: {}", e)).to_string());
        }
    }

    /// Finalize-and-estimate on a private snapshot, then publish.
    fn process(&self, epoch: u64, input: PipelineInput) {
        self.run_guarded(epoch, || {
            let model = self.bp_model()?;
            VitalsPipeline::new(&self.config, model).run(input)
        });
    }

    /// Run `work` for scan `epoch`, contain panics, close the scan's frame
    /// detector and publish the outcome.
    fn run_guarded<F>(&self, epoch: u64, work: F)
    where
        F: FnOnce() -> Result<ScanReport, ScanError>,
    {
        self.finalize_runs.fetch_add(1, Ordering::SeqCst);

        let outcome = panic::catch_unwind(AssertUnwindSafe(work))
            .unwrap_or_else(|payload| Err(ScanError::Unexpected(panic_message(payload))));

        // The scan is over either way; close its frame detector without
        // holding the slot lock
        let retired = {
            let mut slot = self.frame_detector.lock();
            if matches!(slot.as_ref(), Some((e, _)) if *e == epoch) {
                slot.take()
            } else {
                None
            }
        };
        drop(retired);

        match outcome {
            Ok(report) => self.publish(epoch, report),
            Err(e) => {
                if matches!(e, ScanError::Unexpected(_)) {
                    log::error!("Scan failed with unexpected error: {:?}", e);
                }
                self.fail(epoch, e.to_string());
            }
        }
    }

    fn publish(&self, epoch: u64, report: ScanReport) {
        let mut state = self.state.lock();
        if !state.is_current(epoch) {
            log::warn!(
                "Discarding result of superseded scan (epoch {} != {})",
                epoch,
                state.epoch
            );
            return;
        }
        log::info!(
            "Scan complete. HR={:.1} BPM, BP={}/{} mmHg",
            report.hr.hr_bpm,
            report.blood_pressure.systolic,
            report.blood_pressure.diastolic
        );
        state.state = ScanState::Complete;
        state.progress = 100.0;
        state.report = Some(report);
    }

    fn fail(&self, epoch: u64, message: String) {
        let mut state = self.state.lock();
        if !state.is_current(epoch) {
            log::warn!("Discarding error of superseded scan (epoch {}): {}", epoch, message);
            return;
        }
        log::error!("Scan error: {}", message);
        state.state = ScanState::Error;
        state.error = Some(message);
    }

    /// Camera-mode ingestion; `false` once the scan has been superseded.
    fn record_capture(&self, epoch: u64, roi: RoiSample, frame: Frame, progress: f32) -> bool {
        let mut state = self.state.lock();
        if !state.is_current(epoch) {
            return false;
        }
        let SessionState {
            active,
            preview,
            progress: current,
            ..
        } = &mut *state;
        if let Some(scan) = active.as_mut() {
            scan.buffer.push(&roi);
        }
        preview.roi = Some(roi);
        preview.frame = Some(frame);
        *current = current.max(progress.min(100.0));
        true
    }

    fn capture_loop(
        self: &Arc<Self>,
        epoch: u64,
        params: ScanParams,
        mut source: SourceGuard,
        mut detector: DetectorGuard,
        first: Frame,
    ) {
        let duration = Duration::from_secs(params.duration_sec as u64);
        let poll = Duration::from_millis(self.config.capture.capture_poll_interval_ms);
        let started = Instant::now();
        let mut pending = Some(first);

        log::info!("Capturing for {} seconds", params.duration_sec);

        loop {
            let elapsed = started.elapsed();
            if elapsed >= duration {
                break;
            }

            let Some(frame) = pending.take().or_else(|| source.latest_frame()) else {
                thread::sleep(poll);
                continue;
            };

            let roi = detector
                .detect(&frame)
                .unwrap_or_else(|| RoiSample::missing(frame.timestamp_ms));
            let pct = round_to(100.0 * elapsed.as_secs_f32() / duration.as_secs_f32(), 1);

            if !self.record_capture(epoch, roi, frame, pct) {
                log::info!("Capture stopped, scan was reset or replaced");
                source.release();
                return;
            }
            thread::sleep(poll);
        }

        source.release();
        drop(detector);
        log::info!("Capture complete, running signal processing");

        let elapsed = started.elapsed().as_secs_f32();
        let input = {
            let mut state = self.state.lock();
            if !state.is_current(epoch) {
                return;
            }
            state.progress = 100.0;
            match state.active.as_mut() {
                Some(scan) if !scan.processing_started => {
                    scan.processing_started = true;
                    log::info!("Triggering processing of {} buffered samples", scan.buffer.len());
                    PipelineInput {
                        buffer: scan.buffer.clone(),
                        method: scan.params.method,
                        demographics: scan.demographics.clone(),
                        scan_duration_sec: elapsed,
                    }
                }
                _ => return,
            }
        };

        self.process(epoch, input);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic in scan worker".to_string()
    }
}
