use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The settings for the capture pipeline and sensor ingestion.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Correlate the gravity sensor with each capture.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_gravity"))]
    pub gravity: bool,
    /// Correlate the accelerometer with each capture.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_acceleration"))]
    pub acceleration: bool,
    /// Export the depth point cloud when one was captured.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_point_clouds"))]
    pub point_clouds: bool,
    /// Points with a lower confidence than this are not exported.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_min_confidence")
    )]
    pub min_confidence: f32,
    /// Write the confidence of each point as a fourth PLY property.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_write_confidence")
    )]
    pub write_confidence: bool,
    /// The JPEG quality, from 1 to 100.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_jpeg_quality"))]
    pub jpeg_quality: u8,
    /// The number of samples buffered per sensor between captures.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_buffer_capacity")
    )]
    pub buffer_capacity: usize,
    /// The number of sensor events that may be queued before new events are dropped.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_sensor_channel_capacity")
    )]
    pub sensor_channel_capacity: usize,
    /// How long a new capture waits for the previous one to finish before abandoning it.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_supersede_timeout_ms")
    )]
    pub supersede_timeout_ms: u64,
    /// Candidate output directories, tried in order.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_output_directories")
    )]
    pub output_directories: Vec<PathBuf>,
    /// The directory used when no candidate is writable.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_fallback_directory")
    )]
    pub fallback_directory: PathBuf,
}

impl CaptureSettings {
    pub fn supersede_timeout(&self) -> Duration {
        Duration::from_millis(self.supersede_timeout_ms)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            acceleration: default_acceleration(),
            point_clouds: default_point_clouds(),
            min_confidence: default_min_confidence(),
            write_confidence: default_write_confidence(),
            jpeg_quality: default_jpeg_quality(),
            buffer_capacity: default_buffer_capacity(),
            sensor_channel_capacity: default_sensor_channel_capacity(),
            supersede_timeout_ms: default_supersede_timeout_ms(),
            output_directories: default_output_directories(),
            fallback_directory: default_fallback_directory(),
        }
    }
}

fn default_gravity() -> bool {
    true
}

fn default_acceleration() -> bool {
    true
}

fn default_point_clouds() -> bool {
    true
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_write_confidence() -> bool {
    false
}

fn default_jpeg_quality() -> u8 {
    100
}

fn default_buffer_capacity() -> usize {
    posecap_core::DEFAULT_CAPACITY
}

fn default_sensor_channel_capacity() -> usize {
    256
}

fn default_supersede_timeout_ms() -> u64 {
    2000
}

fn default_output_directories() -> Vec<PathBuf> {
    vec![
        PathBuf::from("DCIM").join("PoseCapture"),
        PathBuf::from("Pictures").join("PoseCapture"),
    ]
}

fn default_fallback_directory() -> PathBuf {
    std::env::temp_dir().join("PoseCapture")
}
