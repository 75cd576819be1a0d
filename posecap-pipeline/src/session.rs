use crate::{
    bundle_stem, CachedProvider, CaptureError, CaptureFrame, CapturePipeline, CaptureProvider,
    CaptureReport, CaptureSettings, PhotoEvent, PointCloudEvent, Result, SensorHub,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use log::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Where a session is in its capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    /// A photo event arrived and sensor ingestion is paused.
    Capturing,
    /// A pipeline run is writing the bundle.
    PostProcessing,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }
}

/// The caller's end of a pipeline run started by [`CaptureSession::post_process`].
#[derive(Debug)]
pub struct PipelineHandle {
    generation: u64,
    report: Receiver<CaptureReport>,
    done: Receiver<()>,
    abandoned: Arc<AtomicBool>,
}

impl PipelineHandle {
    /// The capture this run belongs to. Later captures have larger generations.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Blocks until the run finishes.
    ///
    /// Returns [`CaptureError::Cancelled`] if the run was abandoned.
    pub fn wait(self) -> Result<CaptureReport> {
        let report = self.report.recv().map_err(|_| CaptureError::Cancelled)?;
        self.accept(report)
    }

    /// Waits at most `timeout` for the run to finish. Returns `None` if it is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<CaptureReport>> {
        match self.report.recv_timeout(timeout) {
            Ok(report) => Some(self.accept(report)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(CaptureError::Cancelled)),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Discards the result of the run.
    ///
    /// The run is not interrupted: it finishes its current stage and any files it writes stay on
    /// disk. Its cleanup no longer resumes sensor ingestion once a newer capture has started.
    pub fn abandon(self) {
        self.abandoned.store(true, Ordering::SeqCst);
    }

    fn accept(&self, report: CaptureReport) -> Result<CaptureReport> {
        if self.abandoned.load(Ordering::SeqCst) {
            Err(CaptureError::Cancelled)
        } else {
            Ok(report)
        }
    }
}

/// The session's view of the run in flight.
struct ActiveRun {
    generation: u64,
    done: Receiver<()>,
    abandoned: Arc<AtomicBool>,
}

struct SessionState {
    frame: CaptureFrame,
    phase: PipelineState,
    /// Incremented for every photo event and every run, so that cleanup of an older run can tell
    /// it is stale.
    generation: u64,
    active: Option<ActiveRun>,
}

struct Shared {
    pipeline: CapturePipeline,
    state: Mutex<SessionState>,
}

impl Shared {
    fn finish(&self, generation: u64, success: bool) {
        let mut state = self.state.lock();
        if state.generation == generation {
            state.phase = if success {
                PipelineState::Completed
            } else {
                PipelineState::Failed
            };
            self.pipeline.sensors().pause(false);
        } else {
            debug!(
                "capture {} finished after capture {} started",
                generation, state.generation
            );
        }
    }
}

/// Connects the provider's capture events, sensor ingestion and the capture pipeline.
///
/// At most one pipeline run is active. Starting a new one waits a bounded time for the previous
/// run and then abandons it.
pub struct CaptureSession {
    shared: Arc<Shared>,
    /// Held from the supersede wait until the new run is installed.
    single_flight: Mutex<()>,
}

impl CaptureSession {
    pub fn new(settings: CaptureSettings, provider: impl CaptureProvider + 'static) -> Self {
        let sensors = Arc::new(SensorHub::new(&settings));
        let provider: Arc<dyn CaptureProvider> = Arc::new(CachedProvider::new(provider));
        Self {
            shared: Arc::new(Shared {
                pipeline: CapturePipeline::new(settings, provider, sensors),
                state: Mutex::new(SessionState {
                    frame: CaptureFrame::default(),
                    phase: PipelineState::Idle,
                    generation: 0,
                    active: None,
                }),
            }),
            single_flight: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        self.shared.pipeline.settings()
    }

    pub fn sensors(&self) -> &Arc<SensorHub> {
        self.shared.pipeline.sensors()
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state.lock().phase
    }

    /// A copy of the frame assembled so far.
    pub fn frame(&self) -> CaptureFrame {
        self.shared.state.lock().frame.clone()
    }

    /// Stores the image and pose of a new capture and pauses sensor ingestion.
    pub fn on_photo(&self, event: PhotoEvent) {
        if event.image.data.is_empty() {
            warn!("ignoring photo event without image data");
            return;
        }
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.phase = PipelineState::Capturing;
        state.frame.image = Some(event.image);
        state.frame.pose = event.pose;
        state.frame.device_rotation = event.device_rotation;
        self.sensors().pause(true);
        debug!("photo event for capture {}", state.generation);
    }

    pub fn on_point_cloud(&self, event: PointCloudEvent) {
        if event.cloud.points.is_empty() {
            debug!("ignoring empty point cloud");
            return;
        }
        self.shared.state.lock().frame.point_cloud = Some(event.cloud);
    }

    /// Abandons the capture in progress after the provider failed to deliver it.
    pub fn on_capture_error(&self, message: &str) {
        error!("capture failed: {}", message);
        let mut state = self.shared.state.lock();
        state.frame.clear();
        state.phase = PipelineState::Failed;
        self.sensors().pause(false);
    }

    /// Starts writing the current frame on a worker thread.
    ///
    /// If the previous run has not finished, this waits up to the configured supersede timeout and
    /// then abandons it. An abandoned run keeps running until its current stage completes, and
    /// the files it has written are left on disk. Concurrent calls are serialized, so each one
    /// supersedes the run installed by the call before it.
    pub fn post_process(&self) -> Result<PipelineHandle> {
        let _single_flight = self.single_flight.lock();
        let previous = self.shared.state.lock().active.take();
        if let Some(previous) = previous {
            match previous.done.recv_timeout(self.settings().supersede_timeout()) {
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "capture {} did not finish in time, abandoning it",
                        previous.generation
                    );
                    previous.abandoned.store(true, Ordering::SeqCst);
                }
                _ => trace!("capture {} already finished", previous.generation),
            }
        }

        let (report_tx, report_rx) = bounded(1);
        let (done_tx, done_rx) = bounded::<()>(0);
        let abandoned = Arc::new(AtomicBool::new(false));
        let (mut frame, generation) = {
            let mut state = self.shared.state.lock();
            let frame = std::mem::take(&mut state.frame);
            state.generation += 1;
            state.phase = PipelineState::PostProcessing;
            state.active = Some(ActiveRun {
                generation: state.generation,
                done: done_rx.clone(),
                abandoned: abandoned.clone(),
            });
            (frame, state.generation)
        };

        let shared = self.shared.clone();
        let run_abandoned = abandoned.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("posecap-capture-{}", generation))
            .spawn(move || {
                let stem = bundle_stem(chrono::Local::now(), frame.timestamp().unwrap_or_default());
                let report = shared.pipeline.execute(&mut frame, &stem);
                shared.finish(generation, report.success);
                if run_abandoned.load(Ordering::SeqCst) {
                    info!("discarding result of abandoned capture {}", generation);
                } else {
                    report_tx.send(report).ok();
                }
                drop(done_tx);
            });
        if let Err(e) = spawned {
            self.shared.finish(generation, false);
            return Err(CaptureError::Worker(e));
        }

        Ok(PipelineHandle {
            generation,
            report: report_rx,
            done: done_rx,
            abandoned,
        })
    }
}
