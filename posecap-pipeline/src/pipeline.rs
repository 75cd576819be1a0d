use crate::{
    bundle_stem, decode, CaptureError, CaptureFrame, CaptureProvider, CaptureSettings,
    OutputDirectory, PointCloud, Result, SensorHub,
};
use log::*;
use posecap_core::{
    correlate, CameraId, CorrectedPose, CorrectedVector3, OrientationCorrection, SensorKind,
};
use posecap_export::{
    embed_user_comment, encode_jpeg, filter_points, write_ply, CaptureMetadata, ExportError,
};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Whether the image was written. Warnings do not affect this.
    pub success: bool,
    /// The name shared by the bundle's files.
    pub stem: String,
    /// Every file written, in the order it was written.
    pub files: Vec<PathBuf>,
    /// Human-readable descriptions of every stage that failed.
    pub warnings: Vec<String>,
}

impl CaptureReport {
    /// All warnings joined into one message.
    pub fn warning_text(&self) -> String {
        self.warnings.join(", ")
    }

    fn warn(&mut self, stage: &str, error: impl std::fmt::Display) {
        warn!("{} failed: {}", stage, error);
        self.warnings.push(format!("{} failed: {}", stage, error));
    }

    fn wrote(&mut self, path: PathBuf) {
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }
}

/// Runs the capture stages for one [`CaptureFrame`].
pub struct CapturePipeline {
    settings: CaptureSettings,
    provider: Arc<dyn CaptureProvider>,
    sensors: Arc<SensorHub>,
}

impl CapturePipeline {
    pub fn new(
        settings: CaptureSettings,
        provider: Arc<dyn CaptureProvider>,
        sensors: Arc<SensorHub>,
    ) -> Self {
        Self {
            settings,
            provider,
            sensors,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn sensors(&self) -> &Arc<SensorHub> {
        &self.sensors
    }

    /// Runs every stage, naming the bundle after the current local time, then clears `frame` and
    /// resumes sensor ingestion.
    pub fn run(&self, frame: &mut CaptureFrame) -> CaptureReport {
        let stem = bundle_stem(chrono::Local::now(), frame.timestamp().unwrap_or_default());
        self.run_named(frame, &stem)
    }

    /// Same as [`CapturePipeline::run`] with an explicit bundle name.
    pub fn run_named(&self, frame: &mut CaptureFrame, stem: &str) -> CaptureReport {
        let report = self.execute(frame, stem);
        self.sensors.pause(false);
        report
    }

    /// Runs every stage and clears `frame`, but leaves resuming the sensors to the caller.
    ///
    /// A panic in any stage is caught and reported as a failure. The frame is cleared on every
    /// path.
    pub fn execute(&self, frame: &mut CaptureFrame, stem: &str) -> CaptureReport {
        let mut report = CaptureReport {
            stem: stem.to_owned(),
            ..Default::default()
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| self.stages(frame, stem, &mut report)));
        match outcome {
            Ok(Ok(())) => {
                report.success = true;
                info!("Save Complete");
            }
            Ok(Err(e)) => {
                error!("capture failed: {}", e);
                report.warnings.push(e.to_string());
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("capture stage panicked: {}", message);
                report.warnings.push(format!("unexpected error: {}", message));
            }
        }
        frame.clear();
        report
    }

    /// Stages 1 to 5. Only an error from the image stages is returned; later stages record their
    /// errors as warnings.
    fn stages(&self, frame: &CaptureFrame, stem: &str, report: &mut CaptureReport) -> Result<()> {
        info!("Converting Image");
        let image = frame
            .image
            .as_ref()
            .ok_or(crate::DecodeError::MissingImage)?;
        let rgb = decode(image)?;

        info!("Saving Image");
        let jpeg = encode_jpeg(&rgb, self.settings.jpeg_quality).map_err(CaptureError::Encode)?;
        let directory = OutputDirectory::resolve(
            &self.settings.output_directories,
            &self.settings.fallback_directory,
        )?;
        let image_path = directory.file(stem, "jpg");
        directory.write_atomic(&image_path, &jpeg)?;
        report.wrote(image_path.clone());

        info!("Saving Details");
        let metadata = self.metadata(frame, image.timestamp);
        let document = metadata.document().to_string();
        let metadata_path = directory.file(stem, "yaml");
        match directory.write_atomic(&metadata_path, document.as_bytes()) {
            Ok(()) => report.wrote(metadata_path),
            Err(e) => report.warn("writing metadata", e),
        }

        info!("Saving EXIF");
        let (width, height) = metadata
            .color_intrinsics
            .map(|intrinsics| (intrinsics.width, intrinsics.height))
            .unwrap_or_else(|| rgb.dimensions());
        if let Err(e) = self.tag(&directory, &image_path, &jpeg, &document, width, height) {
            report.warn("embedding metadata", e);
        }

        if let Some(cloud) = &frame.point_cloud {
            if !self.settings.point_clouds {
                debug!("point cloud export is disabled");
            } else if !self.provider.is_depth_capable() {
                debug!("provider is not depth capable, point cloud ignored");
            } else {
                info!("Saving PointCloud");
                let cloud_path = directory.file(stem, "ply");
                match self.export_cloud(&directory, &cloud_path, cloud) {
                    Ok(count) => {
                        debug!("wrote {} points to {}", count, cloud_path.display());
                        report.wrote(cloud_path);
                    }
                    Err(e) => report.warn("writing point cloud", e),
                }
            }
        }
        Ok(())
    }

    /// Gathers the calibration, pose and correlated samples of a capture at `timestamp`.
    pub fn metadata(&self, frame: &CaptureFrame, timestamp: f64) -> CaptureMetadata {
        let correction = OrientationCorrection::new(frame.device_rotation);
        let imu_pose = |camera: CameraId| -> Option<CorrectedPose> {
            optional(self.provider.require_imu_to_camera_pose(camera))
                .map(|pose| pose.correct(&correction))
        };
        let sample = |kind: SensorKind, enabled: bool| -> Option<CorrectedVector3> {
            if !enabled || !self.sensors.is_enabled(kind) {
                return None;
            }
            let correlated = correlate(self.sensors.buffer(kind), timestamp, &correction);
            if correlated.is_none() {
                debug!("no {} sample to correlate", kind.name());
            }
            correlated.map(|c| c.vector)
        };
        CaptureMetadata {
            color_intrinsics: optional(self.provider.require_intrinsics(CameraId::Color)),
            color_imu_pose: imu_pose(CameraId::Color),
            depth_intrinsics: optional(self.provider.require_intrinsics(CameraId::Depth)),
            depth_imu_pose: imu_pose(CameraId::Depth),
            device_rotation: frame.device_rotation,
            timestamp,
            pose: frame.pose.correct(&correction),
            gravity: sample(SensorKind::Gravity, self.settings.gravity),
            acceleration: sample(SensorKind::Acceleration, self.settings.acceleration),
        }
    }

    fn tag(
        &self,
        directory: &OutputDirectory,
        image_path: &Path,
        jpeg: &[u8],
        document: &str,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let tagged = embed_user_comment(jpeg, document, width, height).map_err(ExportError::from)?;
        directory.write_atomic(image_path, &tagged)
    }

    fn export_cloud(
        &self,
        directory: &OutputDirectory,
        path: &Path,
        cloud: &PointCloud,
    ) -> Result<usize> {
        let points = filter_points(&cloud.points, self.settings.min_confidence);
        let mut bytes = Vec::new();
        let count = write_ply(&mut bytes, &points, self.settings.write_confidence)?;
        directory.write_atomic(path, &bytes)?;
        Ok(count)
    }
}

fn optional<T>(result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("{}, omitting block", e);
            None
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
