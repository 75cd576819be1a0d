use crossbeam_channel::{bounded, Receiver, Sender};
use posecap_core::{CameraId, CameraIntrinsics, DevicePose, DeviceRotation, SensorKind};
use posecap_pipeline::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn settings(root: &Path, supersede_timeout_ms: u64) -> CaptureSettings {
    pretty_env_logger::try_init_timed().ok();
    CaptureSettings {
        output_directories: vec![root.join("out")],
        fallback_directory: root.join("fallback"),
        supersede_timeout_ms,
        ..Default::default()
    }
}

fn photo(timestamp: f64) -> PhotoEvent {
    PhotoEvent {
        image: CapturedImage {
            data: vec![128; 24],
            format: PixelFormat::Nv21,
            width: 4,
            height: 4,
            stride: None,
            timestamp,
        },
        pose: DevicePose::identity(),
        device_rotation: DeviceRotation::Rotation0,
    }
}

#[test]
fn photo_to_completed_bundle() {
    let root = tempfile::tempdir().unwrap();
    let session = CaptureSession::new(settings(root.path(), 2000), StaticProvider::default());
    assert_eq!(session.state(), PipelineState::Idle);

    session.on_photo(photo(3.0));
    session.on_point_cloud(PointCloudEvent {
        cloud: PointCloud {
            points: vec![],
            timestamp: 3.0,
        },
    });
    assert_eq!(session.state(), PipelineState::Capturing);
    assert!(session.sensors().is_paused());
    assert!(session.frame().point_cloud.is_none());

    let handle = session.post_process().unwrap();
    let report = handle.wait().unwrap();

    assert!(report.success);
    assert!(report.stem.ends_with("-3.000000000"));
    assert_eq!(report.files.len(), 2);
    assert_eq!(session.state(), PipelineState::Completed);
    assert!(!session.sensors().is_paused());
    assert!(session.frame().is_empty());
}

#[test]
fn empty_photo_is_ignored() {
    let root = tempfile::tempdir().unwrap();
    let session = CaptureSession::new(settings(root.path(), 2000), StaticProvider::default());
    let mut event = photo(1.0);
    event.image.data.clear();
    session.on_photo(event);
    assert_eq!(session.state(), PipelineState::Idle);
    assert!(!session.sensors().is_paused());
}

#[test]
fn capture_error_resumes_sensors() {
    let root = tempfile::tempdir().unwrap();
    let session = CaptureSession::new(settings(root.path(), 2000), StaticProvider::default());
    session.on_photo(photo(1.0));
    session.on_capture_error("camera disconnected");
    assert_eq!(session.state(), PipelineState::Failed);
    assert!(!session.sensors().is_paused());
    assert!(session.frame().is_empty());
}

#[test]
fn post_process_without_photo_fails() {
    let root = tempfile::tempdir().unwrap();
    let session = CaptureSession::new(settings(root.path(), 2000), StaticProvider::default());
    let report = session.post_process().unwrap().wait().unwrap();
    assert!(!report.success);
    assert_eq!(session.state(), PipelineState::Failed);
}

/// Blocks the first IMU pose query until released.
struct GatedProvider {
    gate: Receiver<()>,
    blocked: AtomicBool,
}

impl GatedProvider {
    fn new() -> (Self, Sender<()>) {
        let (release, gate) = bounded(1);
        (
            Self {
                gate,
                blocked: AtomicBool::new(false),
            },
            release,
        )
    }
}

impl CaptureProvider for GatedProvider {
    fn intrinsics(&self, _: CameraId) -> Option<CameraIntrinsics> {
        None
    }

    fn imu_to_camera_pose(&self, _: CameraId) -> Option<DevicePose> {
        if !self.blocked.swap(true, Ordering::SeqCst) {
            self.gate.recv().ok();
        }
        None
    }

    fn is_depth_capable(&self) -> bool {
        false
    }
}

#[test]
fn slow_run_is_superseded() {
    let root = tempfile::tempdir().unwrap();
    let (provider, release) = GatedProvider::new();
    let session = CaptureSession::new(settings(root.path(), 50), provider);

    session.on_photo(photo(1.0));
    let first = session.post_process().unwrap();
    assert!(first.wait_timeout(Duration::from_millis(20)).is_none());
    assert!(!first.is_finished());

    session.on_photo(photo(2.0));
    let second = session.post_process().unwrap();
    assert!(second.generation() > first.generation());
    let report = second.wait().unwrap();
    assert!(report.success);
    assert_eq!(session.state(), PipelineState::Completed);
    assert!(!session.sensors().is_paused());

    // A third capture starts before the abandoned run finishes.
    session.on_photo(photo(3.0));
    release.send(()).unwrap();
    assert!(matches!(first.wait(), Err(CaptureError::Cancelled)));
    assert!(session.sensors().is_paused());
    assert_eq!(session.state(), PipelineState::Capturing);

    // Abandoned runs leave their files behind.
    let out = root.path().join("out");
    let jpegs = std::fs::read_dir(&out)
        .unwrap()
        .flatten()
        .filter(|e| e.path().extension().map_or(false, |x| x == "jpg"))
        .count();
    assert_eq!(jpegs, 2);
}

#[test]
fn concurrent_post_process_is_serialized() {
    let root = tempfile::tempdir().unwrap();
    let (provider, release) = GatedProvider::new();
    let session = Arc::new(CaptureSession::new(settings(root.path(), 300), provider));

    session.on_photo(photo(1.0));
    let first = session.post_process().unwrap();
    session.on_photo(photo(2.0));

    let other = {
        let session = session.clone();
        std::thread::spawn(move || session.post_process().unwrap())
    };
    std::thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    let second = session.post_process().unwrap();
    let elapsed = start.elapsed();
    let other = other.join().unwrap();

    // Whichever call ran first waited out the gated run before the other could start.
    assert!(elapsed >= Duration::from_millis(200), "{:?}", elapsed);
    assert!(!first.is_finished());
    assert_ne!(second.generation(), other.generation());
    assert!(second.generation() > first.generation());
    assert!(other.generation() > first.generation());

    second.wait().unwrap();
    other.wait().unwrap();
    assert!(session.state().is_terminal());
    assert!(!session.sensors().is_paused());

    release.send(()).unwrap();
    assert!(matches!(first.wait(), Err(CaptureError::Cancelled)));
    assert!(!session.sensors().is_paused());
}

#[test]
fn sensor_samples_flow_into_metadata() {
    let root = tempfile::tempdir().unwrap();
    let session = CaptureSession::new(settings(root.path(), 2000), StaticProvider::default());
    let (sender, ingest) = session.sensors().spawn_ingest(16).unwrap();
    for i in 0..5 {
        assert!(sender.send(SensorEvent {
            kind: SensorKind::Acceleration,
            values: [i as f32, 0.0, 9.8],
            source_timestamp: i as f64,
            wall_timestamp_ns: i * 1_000_000_000,
        }));
    }
    drop(sender);
    ingest.join().unwrap();

    session.on_photo(photo(3.2));
    let report = session.post_process().unwrap().wait().unwrap();
    let yaml = std::fs::read_to_string(&report.files[1]).unwrap();
    assert!(yaml.contains("rawAcceleration: [3.000000000, 0.000000000, 9.800000"));
    assert!(!yaml.contains("rawGravity"));
}
