//! Recorded capture sessions, replayed through the pipeline as if a device delivered them.

use posecap_core::{
    nalgebra::{Quaternion, Vector3},
    CameraId, CameraIntrinsics, DevicePose,
};
use posecap_pipeline::{SensorEvent, StaticProvider};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// A rotation as `[w, x, y, z]` and a translation in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    pub rotation: [f64; 4],
    #[serde(default)]
    pub translation: [f64; 3],
}

impl PoseRecord {
    pub fn pose(&self) -> DevicePose {
        let [w, x, y, z] = self.rotation;
        let [tx, ty, tz] = self.translation;
        DevicePose::new(Quaternion::new(w, x, y, z), Vector3::new(tx, ty, tz))
    }
}

impl Default for PoseRecord {
    fn default() -> Self {
        Self {
            rotation: [1.0, 0.0, 0.0, 0.0],
            translation: [0.0; 3],
        }
    }
}

/// The calibration recorded for one camera. The field of view is derived on load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicsRecord {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub distortion: [f64; 5],
}

impl From<IntrinsicsRecord> for CameraIntrinsics {
    fn from(r: IntrinsicsRecord) -> Self {
        CameraIntrinsics::new(r.fx, r.fy, r.cx, r.cy, r.width, r.height, r.distortion)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub camera: CameraId,
    #[serde(default)]
    pub intrinsics: Option<IntrinsicsRecord>,
    #[serde(default)]
    pub imu_pose: Option<PoseRecord>,
}

/// Everything the device reported around one capture, except the image and sensor streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub cameras: Vec<CameraRecord>,
    #[serde(default)]
    pub depth_capable: bool,
    #[serde(default)]
    pub pose: PoseRecord,
    /// The pose clock at the time of the capture, in seconds.
    pub timestamp: f64,
}

impl SessionRecord {
    pub fn provider(&self) -> StaticProvider {
        let mut provider = StaticProvider {
            depth_capable: self.depth_capable,
            ..Default::default()
        };
        for record in &self.cameras {
            if let Some(intrinsics) = record.intrinsics {
                provider.intrinsics.insert(record.camera, intrinsics.into());
            }
            if let Some(imu_pose) = record.imu_pose {
                provider.imu_poses.insert(record.camera, imu_pose.pose());
            }
        }
        provider
    }
}

pub fn load_session(path: &Path) -> Result<SessionRecord, Box<dyn std::error::Error>> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

pub fn load_sensor_events(path: &Path) -> Result<Vec<SensorEvent>, Box<dyn std::error::Error>> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// Reads a point cloud stored as little-endian `f32` values, four per point.
pub fn read_point_cloud(mut reader: impl Read) -> std::io::Result<Vec<f32>> {
    let mut bytes = vec![];
    reader.read_to_end(&mut bytes)?;
    if bytes.len() % 4 != 0 {
        log::warn!(
            "point cloud has {} trailing bytes, ignoring them",
            bytes.len() % 4
        );
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
