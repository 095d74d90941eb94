use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use vitalscan_core::{
    Demographics, DetectorFactory, FaceDetector, Frame, FrameSource, Gender, ScanError, ScanOrchestrator, ScanParams,
    ScanState, SyntheticFace, VitalScanConfig,
};
use vitalscan_signals::{ProjectionMethod, RoiSample};

fn demographics() -> Demographics {
    Demographics {
        age: 42,
        gender: Gender::Male,
        height_cm: 178.0,
        weight_kg: 76.0,
    }
}

fn ready_session() -> ScanOrchestrator {
    let session = ScanOrchestrator::new(VitalScanConfig::default()).unwrap();
    session.set_demographics(demographics()).unwrap();
    session
}

/// Poll until the session leaves `scanning` or the deadline passes.
fn wait_until_settled(session: &ScanOrchestrator, timeout: Duration) -> ScanState {
    let deadline = Instant::now() + timeout;
    loop {
        let state = session.status().state;
        if state != ScanState::Scanning || Instant::now() >= deadline {
            return state;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Push `samples` with progress spread evenly up to 100 %.
fn feed(session: &ScanOrchestrator, samples: Vec<RoiSample>) {
    let n = samples.len();
    for (i, roi) in samples.into_iter().enumerate() {
        let progress = 100.0 * (i + 1) as f32 / n as f32;
        session.push_roi(roi, progress).unwrap();
    }
}

#[test]
fn test_second_start_is_a_conflict() {
    let session = ready_session();
    session.start_scan(ScanParams::default()).unwrap();

    let err = session.start_scan(ScanParams::new(ProjectionMethod::Chrom, 30)).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(session.status().state, ScanState::Scanning);
}

#[test]
fn test_start_without_demographics_never_scans() {
    let session = ScanOrchestrator::new(VitalScanConfig::default()).unwrap();
    for _ in 0..3 {
        let err = session.start_scan(ScanParams::default()).unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(session.status().state, ScanState::Idle);
    }

    let err = session
        .start_capture(ScanParams::default(), Box::new(SilentCamera::default()))
        .unwrap_err();
    assert!(matches!(err, ScanError::MissingDemographics));
    assert_eq!(session.status().state, ScanState::Idle);
}

#[test]
fn test_reset_is_idempotent() {
    let session = ready_session();
    session.start_scan(ScanParams::default()).unwrap();
    session.push_roi(RoiSample::detected([150.0, 100.0, 80.0], 0), 10.0).unwrap();

    session.reset();
    let first = session.status();
    session.reset();
    let second = session.status();

    assert_eq!(first, second);
    assert_eq!(second.state, ScanState::Idle);
    assert!(matches!(session.result(), Err(ScanError::NotFound)));
    assert_eq!(session.buffered_len(), 0);

    // Demographics survive a reset
    session.start_scan(ScanParams::default()).unwrap();
}

#[test]
fn test_end_to_end_70_bpm() {
    let session = ready_session();
    session.start_scan(ScanParams::new(ProjectionMethod::Pos, 30)).unwrap();

    feed(&session, SyntheticFace::new(70.0, 30.0).with_seed(11).take_seconds(30.0));

    let state = wait_until_settled(&session, Duration::from_secs(30));
    assert_eq!(state, ScanState::Complete, "status: {:?}", session.status());

    let report = session.result().unwrap();
    assert!((report.hr.hr_bpm - 70.0).abs() <= 3.0, "HR {}", report.hr.hr_bpm);
    assert_eq!(report.valid_samples, 900);
    assert_eq!(report.algorithm_used, ProjectionMethod::Pos);
    assert!(report.blood_pressure.diastolic < report.blood_pressure.systolic);
    assert!(report.hrv.valid);
    assert_eq!(session.finalize_count(), 1);

    let status = session.status();
    assert_eq!(status.progress_percent, None);
    assert!(status.message.contains("complete"));
}

#[test]
fn test_chrom_scan_with_dropouts() {
    let session = ready_session();
    session.start_scan(ScanParams::new(ProjectionMethod::Chrom, 30)).unwrap();

    // Every 15th frame has no face; those never reach the buffer
    feed(
        &session,
        SyntheticFace::new(84.0, 30.0).with_seed(5).with_dropout(15).take_seconds(30.0),
    );

    assert_eq!(wait_until_settled(&session, Duration::from_secs(30)), ScanState::Complete);
    let report = session.result().unwrap();
    assert_eq!(report.valid_samples, 840);
    assert_eq!(report.algorithm_used, ProjectionMethod::Chrom);
    assert!((30.0..=200.0).contains(&report.hr.hr_bpm));
}

#[test]
fn test_insufficient_data_becomes_error_state() {
    let session = ready_session();
    session.start_scan(ScanParams::new(ProjectionMethod::Pos, 20)).unwrap();

    let samples = SyntheticFace::new(70.0, 30.0).take_seconds(2.0);
    feed(&session, samples);

    assert_eq!(wait_until_settled(&session, Duration::from_secs(10)), ScanState::Error);
    let status = session.status();
    let message = status.error.unwrap_or_default();
    assert!(message.contains("Signal processing error"), "message: {}", message);
    assert!(matches!(session.result(), Err(ScanError::Failed(_))));

    // A failed scan can be restarted without a reset
    session.start_scan(ScanParams::default()).unwrap();
    assert_eq!(session.status().state, ScanState::Scanning);
}

#[test]
fn test_concurrent_pushes_keep_buffer_consistent() {
    let session = ready_session();
    session.start_scan(ScanParams::new(ProjectionMethod::Pos, 45)).unwrap();

    let threads = 8;
    let per_thread = 100;
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let session = session.clone();
            thread::spawn(move || {
                let mut stored = 0;
                for i in 0..per_thread {
                    let ts = (t * per_thread + i) as i64;
                    let roi = if i % 5 == 0 {
                        RoiSample::missing(ts)
                    } else {
                        RoiSample::detected([150.0 + (i % 7) as f32, 100.0, 80.0], ts)
                    };
                    if session.push_roi(roi, 50.0).unwrap() {
                        stored += 1;
                    }
                }
                stored
            })
        })
        .collect();

    let stored: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(stored, threads * per_thread * 4 / 5);
    assert_eq!(session.buffered_len(), stored);

    // Everyone crosses the completion threshold at once
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let session = session.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                session
                    .push_roi(RoiSample::detected([150.0, 100.0, 80.0], 10_000 + t as i64), 100.0)
                    .unwrap()
            })
        })
        .collect();
    let accepted = handles.into_iter().map(|h| h.join().unwrap()).filter(|&s| s).count();
    assert_eq!(accepted, 1);

    let state = wait_until_settled(&session, Duration::from_secs(30));
    assert_ne!(state, ScanState::Scanning);
    assert_eq!(session.finalize_count(), 1);
    assert_eq!(session.buffered_len(), stored + 1);
}

#[test]
fn test_stale_result_is_discarded_after_reset() {
    let session = ready_session();
    session.warm_up().unwrap();
    session.start_scan(ScanParams::new(ProjectionMethod::Pos, 30)).unwrap();
    feed(&session, SyntheticFace::new(70.0, 30.0).take_seconds(30.0));

    // Processing is in flight; cancel and start over
    session.reset();
    session.start_scan(ScanParams::new(ProjectionMethod::Chrom, 30)).unwrap();

    thread::sleep(Duration::from_millis(1500));
    assert_eq!(session.finalize_count(), 1);
    assert_eq!(session.status().state, ScanState::Scanning);
    assert!(matches!(session.result(), Err(ScanError::NotReady)));
    assert_eq!(session.buffered_len(), 0);
}

#[test]
fn test_frames_feed_the_session_detector() {
    let closed = Arc::new(AtomicUsize::new(0));
    let session = ScanOrchestrator::with_detector_factory(
        VitalScanConfig::default(),
        scripted_factory(72.0, Arc::clone(&closed)),
    )
    .unwrap();
    session.set_demographics(demographics()).unwrap();
    session.start_scan(ScanParams::new(ProjectionMethod::Pos, 20)).unwrap();

    let n = 600;
    for i in 0..n {
        let frame = Frame::filled(8, 8, [128, 128, 128], i as i64 * 33);
        session.push_frame(frame, 100.0 * (i + 1) as f32 / n as f32).unwrap();
    }

    assert_eq!(wait_until_settled(&session, Duration::from_secs(30)), ScanState::Complete);
    let report = session.result().unwrap();
    assert_eq!(report.valid_samples, 600);
    assert!((report.hr.hr_bpm - 72.0).abs() <= 3.0, "HR {}", report.hr.hr_bpm);
    assert!(session.preview().frame.is_some());
    // Detector opened once and closed when the scan finished
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_camera_timeout_is_acquisition_error() {
    let mut config = VitalScanConfig::default();
    config.capture.camera_ready_timeout_ms = 100;
    let closed = Arc::new(AtomicUsize::new(0));
    let session = ScanOrchestrator::with_detector_factory(config, scripted_factory(70.0, Arc::clone(&closed))).unwrap();
    session.set_demographics(demographics()).unwrap();

    let camera = SilentCamera::default();
    let released = Arc::clone(&camera.released);
    let err = session.start_capture(ScanParams::default(), Box::new(camera)).unwrap_err();

    assert!(matches!(err, ScanError::Acquisition(_)));
    let status = session.status();
    assert_eq!(status.state, ScanState::Error);
    assert!(status.error.unwrap_or_default().contains("No frame received"));
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_camera_scan_can_be_cancelled() {
    let closed = Arc::new(AtomicUsize::new(0));
    let session = ScanOrchestrator::with_detector_factory(
        VitalScanConfig::default(),
        scripted_factory(70.0, Arc::clone(&closed)),
    )
    .unwrap();
    session.set_demographics(demographics()).unwrap();

    let camera = PacedCamera::new(30.0);
    let released = Arc::clone(&camera.released);
    session.start_capture(ScanParams::default(), Box::new(camera)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while session.buffered_len() < 10 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(session.buffered_len() >= 10);
    assert!(session.preview().frame.is_some());
    assert!(session.status().progress_percent.is_some());

    // Camera scans do not accept pushed samples
    let err = session.push_roi(RoiSample::detected([1.0, 1.0, 1.0], 0), 50.0).unwrap_err();
    assert!(matches!(err, ScanError::WrongMode { .. }));

    session.reset();
    let deadline = Instant::now() + Duration::from_secs(5);
    while closed.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(session.status().state, ScanState::Idle);
    assert_eq!(session.finalize_count(), 0);
}

#[test]
fn test_camera_scan_runs_to_completion() {
    let closed = Arc::new(AtomicUsize::new(0));
    let session = ScanOrchestrator::with_detector_factory(
        VitalScanConfig::default(),
        scripted_factory(66.0, Arc::clone(&closed)),
    )
    .unwrap();
    session.set_demographics(demographics()).unwrap();

    let camera = PacedCamera::new(30.0);
    let released = Arc::clone(&camera.released);
    session
        .start_capture(ScanParams::new(ProjectionMethod::Pos, 20), Box::new(camera))
        .unwrap();

    assert_eq!(wait_until_settled(&session, Duration::from_secs(60)), ScanState::Complete);
    let report = session.result().unwrap();
    assert!(report.scan_duration_seconds >= 20.0);
    assert!(report.valid_samples > 129);
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(session.finalize_count(), 1);
}

#[test]
fn test_camera_detector_panic_releases_everything() {
    let closed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&closed);
    let factory: Arc<dyn DetectorFactory> = Arc::new(move || {
        Ok::<_, ScanError>(Box::new(PanickingDetector { closed: Arc::clone(&counter) }) as Box<dyn FaceDetector>)
    });
    let session = ScanOrchestrator::with_detector_factory(VitalScanConfig::default(), factory).unwrap();
    session.set_demographics(demographics()).unwrap();

    let camera = PacedCamera::new(30.0);
    let released = Arc::clone(&camera.released);
    session.start_capture(ScanParams::default(), Box::new(camera)).unwrap();

    assert_eq!(wait_until_settled(&session, Duration::from_secs(10)), ScanState::Error);
    let message = session.status().error.unwrap_or_default();
    assert!(message.contains("Unexpected error: detector blew up"), "message: {}", message);
    assert!(matches!(session.result(), Err(ScanError::Failed(_))));

    // Cleanup runs during unwinding, before the error is stored
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(session.finalize_count(), 0);
}

#[test]
fn test_late_frames_do_not_reopen_the_detector() {
    let opened = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    let (opens, closes) = (Arc::clone(&opened), Arc::clone(&closed));
    let factory: Arc<dyn DetectorFactory> = Arc::new(move || {
        opens.fetch_add(1, Ordering::SeqCst);
        Ok::<_, ScanError>(Box::new(SlowClosingDetector {
            face: SyntheticFace::new(72.0, 30.0).with_seed(2),
            closed: Arc::clone(&closes),
        }) as Box<dyn FaceDetector>)
    });
    let session = ScanOrchestrator::with_detector_factory(VitalScanConfig::default(), factory).unwrap();
    session.set_demographics(demographics()).unwrap();
    session.start_scan(ScanParams::new(ProjectionMethod::Pos, 20)).unwrap();

    let n = 600;
    for i in 0..n {
        let frame = Frame::filled(8, 8, [128, 128, 128], i as i64 * 33);
        session.push_frame(frame, 100.0 * (i + 1) as f32 / n as f32).unwrap();
    }

    // Keep pushing while finalize runs and the detector closes
    let deadline = Instant::now() + Duration::from_secs(30);
    let mut ts = n as i64 * 33;
    while session.status().state == ScanState::Scanning && Instant::now() < deadline {
        ts += 33;
        let late = session.push_frame(Frame::filled(8, 8, [128, 128, 128], ts), 100.0);
        assert!(matches!(late, Ok(false) | Err(ScanError::NotScanning)), "late push: {:?}", late);
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(session.status().state, ScanState::Complete);
    assert_eq!(session.result().unwrap().valid_samples, n);
    assert!(matches!(
        session.push_frame(Frame::filled(8, 8, [128, 128, 128], ts + 33), 100.0),
        Err(ScanError::NotScanning)
    ));
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Ignores pixels and replays a synthetic subject, one sample per frame.
struct ScriptedDetector {
    face: SyntheticFace,
    closed: Arc<AtomicUsize>,
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> RoiSample {
        match self.face.next() {
            Some(mut roi) => {
                roi.timestamp_ms = frame.timestamp_ms;
                roi
            }
            None => RoiSample::missing(frame.timestamp_ms),
        }
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn scripted_factory(bpm: f32, closed: Arc<AtomicUsize>) -> Arc<dyn DetectorFactory> {
    Arc::new(move || {
        Ok::<_, ScanError>(Box::new(ScriptedDetector {
            face: SyntheticFace::new(bpm, 30.0).with_seed(1),
            closed: Arc::clone(&closed),
        }) as Box<dyn FaceDetector>)
    })
}

/// Camera that never produces a frame.
#[derive(Default)]
struct SilentCamera {
    released: Arc<AtomicBool>,
}

impl FrameSource for SilentCamera {
    fn wait_for_frame(&mut self, timeout: Duration) -> Option<Frame> {
        thread::sleep(timeout);
        None
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        None
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Delivers frames in real time at a fixed rate.
struct PacedCamera {
    fps: f32,
    started: Option<Instant>,
    delivered: usize,
    released: Arc<AtomicBool>,
}

impl PacedCamera {
    fn new(fps: f32) -> Self {
        Self {
            fps,
            started: None,
            delivered: 0,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    fn frame(&mut self) -> Frame {
        let ts = (self.delivered as f32 * 1000.0 / self.fps) as i64;
        self.delivered += 1;
        Frame::filled(8, 8, [128, 128, 128], ts)
    }
}

impl FrameSource for PacedCamera {
    fn wait_for_frame(&mut self, _timeout: Duration) -> Option<Frame> {
        self.started = Some(Instant::now());
        Some(self.frame())
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        let started = self.started?;
        let due = (started.elapsed().as_secs_f32() * self.fps) as usize + 1;
        if due > self.delivered {
            Some(self.frame())
        } else {
            None
        }
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Fails on the first frame it sees.
struct PanickingDetector {
    closed: Arc<AtomicUsize>,
}

impl FaceDetector for PanickingDetector {
    fn detect(&mut self, _frame: &Frame) -> RoiSample {
        panic!("detector blew up");
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Replays a synthetic subject and takes a while to shut down.
struct SlowClosingDetector {
    face: SyntheticFace,
    closed: Arc<AtomicUsize>,
}

impl FaceDetector for SlowClosingDetector {
    fn detect(&mut self, frame: &Frame) -> RoiSample {
        let mut roi = self.face.next().unwrap_or_else(|| RoiSample::missing(frame.timestamp_ms));
        roi.timestamp_ms = frame.timestamp_ms;
        roi
    }

    fn close(&mut self) {
        thread::sleep(Duration::from_millis(400));
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
